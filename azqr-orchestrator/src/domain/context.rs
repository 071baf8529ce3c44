//! State handed from stage to stage

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use azqr_core::config::ScanConfig;
use azqr_core::domain::{Filters, ScanParams, ScannerConfig};
use azqr_core::infrastructure::ClientOptions;
use azqr_core::infrastructure::credential::SharedCredential;
use azqr_core::infrastructure::graph::GraphQuery;
use azqr_plugins::{PluginRegistry, PluginScanRequest, global_registry};

use super::errors::PipelineError;
use super::report::ReportData;

/// One scan's working state. Stages read what earlier stages stored and
/// write their own results into [`ScanContext::report`].
pub struct ScanContext {
    pub cancel: CancellationToken,
    pub credential: Option<SharedCredential>,
    pub client_options: ClientOptions,
    pub scan_config: ScanConfig,
    /// Built by the initialization stage unless supplied up front
    pub graph: Option<Arc<dyn GraphQuery>>,
    pub plugin_registry: &'static PluginRegistry,
    pub params: ScanParams,
    /// Id to display name
    pub subscriptions: BTreeMap<String, String>,
    pub filters: Arc<Filters>,
    pub report: ReportData,
    /// Lowercase subscription id, then lowercase type, then count
    pub resource_types_by_subscription: HashMap<String, HashMap<String, f64>>,
    /// Lowercase ids of resources with at least one diagnostic setting
    pub diagnostics_settings: HashSet<String>,
    pub private_endpoints: HashSet<String>,
    pub output_dir: PathBuf,
    pub start_time: Instant,
    pub profiling_started: Option<Instant>,
}

impl fmt::Debug for ScanContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanContext")
            .field("subscriptions", &self.subscriptions.len())
            .field("output_name", &self.report.output_name)
            .field("has_graph", &self.graph.is_some())
            .field("has_credential", &self.credential.is_some())
            .finish()
    }
}

impl ScanContext {
    pub fn new(params: ScanParams, client_options: ClientOptions) -> Self {
        let filters = Arc::new(params.filters.clone());
        Self {
            cancel: CancellationToken::new(),
            credential: None,
            client_options,
            scan_config: ScanConfig::default(),
            graph: None,
            plugin_registry: global_registry(),
            params,
            subscriptions: BTreeMap::new(),
            filters,
            report: ReportData::default(),
            resource_types_by_subscription: HashMap::new(),
            diagnostics_settings: HashSet::new(),
            private_endpoints: HashSet::new(),
            output_dir: PathBuf::from("."),
            start_time: Instant::now(),
            profiling_started: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_credential(mut self, credential: Option<SharedCredential>) -> Self {
        self.credential = credential;
        self
    }

    pub fn with_scan_config(mut self, scan_config: ScanConfig) -> Self {
        self.scan_config = scan_config;
        self
    }

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

    pub fn graph(&self) -> Result<Arc<dyn GraphQuery>, PipelineError> {
        self.graph
            .clone()
            .ok_or(PipelineError::NotInitialized("graph client"))
    }

    pub fn check_cancelled(&self) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }

    /// Scanner view of one subscription
    pub fn scanner_config(&self, subscription_id: &str, subscription_name: &str) -> ScannerConfig {
        ScannerConfig {
            cancel: self.cancel.clone(),
            credential: self.credential.clone(),
            client_options: self.client_options.clone(),
            subscription_id: subscription_id.to_string(),
            subscription_name: subscription_name.to_string(),
        }
    }

    pub fn plugin_request(&self) -> PluginScanRequest {
        PluginScanRequest {
            cancel: self.cancel.clone(),
            credential: self.credential.clone(),
            client_options: self.client_options.clone(),
            subscriptions: self.subscriptions.clone(),
            filters: self.filters.clone(),
        }
    }
}
