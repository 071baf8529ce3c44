//! Scan entry points

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use azqr_core::config::ScanConfig;
use azqr_core::domain::ScanParams;
use azqr_core::infrastructure::ClientOptions;
use azqr_core::infrastructure::credential::SharedCredential;
use azqr_core::infrastructure::graph::GraphQuery;
use azqr_plugins::{PluginRegistry, global_registry};

use crate::application::builder::PipelineBuilder;
use crate::application::pipeline::{Pipeline, log_metrics};
use crate::domain::context::ScanContext;
use crate::domain::errors::PipelineError;
use crate::domain::report::ReportData;

/// `HH:MM:SS`, hours not capped at 24
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3_600, (secs % 3_600) / 60, secs % 60)
}

/// Runs full or plugin-only scans with shared clients and settings
#[derive(Clone)]
pub struct ScanRunner {
    client_options: ClientOptions,
    credential: Option<SharedCredential>,
    scan_config: ScanConfig,
    graph: Option<Arc<dyn GraphQuery>>,
    plugin_registry: &'static PluginRegistry,
    output_dir: PathBuf,
    cancel: CancellationToken,
}

impl ScanRunner {
    pub fn new(client_options: ClientOptions) -> Self {
        Self {
            client_options,
            credential: None,
            scan_config: ScanConfig::default(),
            graph: None,
            plugin_registry: global_registry(),
            output_dir: PathBuf::from("."),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_credential(mut self, credential: SharedCredential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn with_scan_config(mut self, scan_config: ScanConfig) -> Self {
        self.scan_config = scan_config;
        self
    }

    /// Use this graph client instead of building one per scan
    pub fn with_graph(mut self, graph: Arc<dyn GraphQuery>) -> Self {
        self.graph = Some(graph);
        self
    }

    pub fn with_plugin_registry(mut self, registry: &'static PluginRegistry) -> Self {
        self.plugin_registry = registry;
        self
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Full scan; the graph stage must be enabled
    pub async fn scan(&self, params: ScanParams) -> Result<ReportData, PipelineError> {
        params.stages.validate_graph_stage_enabled()?;
        self.run(PipelineBuilder::build_default(), params).await
    }

    /// Discovery plus the enabled internal plugins
    pub async fn scan_plugins(&self, params: ScanParams) -> Result<ReportData, PipelineError> {
        self.run(PipelineBuilder::build_plugin_only(), params).await
    }

    fn context(&self, params: ScanParams) -> ScanContext {
        let mut ctx = ScanContext::new(params, self.client_options.clone())
            .with_cancel(self.cancel.clone())
            .with_credential(self.credential.clone())
            .with_scan_config(self.scan_config.clone())
            .with_plugin_registry(self.plugin_registry)
            .with_output_dir(self.output_dir.clone());
        if let Some(graph) = &self.graph {
            ctx = ctx.with_graph(graph.clone());
        }
        ctx
    }

    async fn run(&self, mut pipeline: Pipeline, params: ScanParams) -> Result<ReportData, PipelineError> {
        let debug = params.debug;
        let mut ctx = self.context(params);

        let result = pipeline.execute(&mut ctx).await;
        if debug {
            log_metrics(pipeline.metrics());
        }
        result?;

        info!(
            "Scan completed in {}",
            format_elapsed(ctx.start_time.elapsed())
        );
        Ok(ctx.report)
    }
}
