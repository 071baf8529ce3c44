//! Declarative graph recommendations

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use azqr_core::domain::Scanner;
use azqr_plugins::PluginRegistry;
use azqr_scanners::GraphScanner;
use azqr_scanners::discovery::{
    count_by_subscription, count_by_type, query_type_counts, to_report_counts,
};
use azqr_scanners::services::resource::GENERIC_RESOURCE_TYPES;

use crate::domain::context::ScanContext;
use crate::domain::errors::PipelineError;
use crate::domain::stage::{BaseStage, Stage};

/// The orphaned-resource scanner, which is kept whatever the counts say
pub fn is_generic_resource_scanner(scanner: &dyn Scanner) -> bool {
    let types = scanner.resource_types();
    types.len() == GENERIC_RESOURCE_TYPES.len()
        && GENERIC_RESOURCE_TYPES
            .iter()
            .all(|g| types.iter().any(|t| t.eq_ignore_ascii_case(g)))
}

/// Scanners with at least one resource of their types, plus the generic one
pub fn scanners_with_resources(
    scanners: &[Arc<dyn Scanner>],
    totals: &HashMap<String, f64>,
) -> Vec<Arc<dyn Scanner>> {
    scanners
        .iter()
        .filter(|s| {
            is_generic_resource_scanner(s.as_ref())
                || s.resource_types()
                    .iter()
                    .any(|t| totals.get(&t.to_lowercase()).copied().unwrap_or(0.0) > 0.0)
        })
        .cloned()
        .collect()
}

/// Add every YAML plugin query to the graph scanner
fn register_plugin_queries(scanner: &mut GraphScanner, registry: &PluginRegistry) {
    for plugin in registry.list() {
        for recommendation in &plugin.yaml_recommendations {
            scanner.register_external_query(&recommendation.resource_type, recommendation.clone());
        }
    }
}

pub struct GraphScanStage {
    base: BaseStage,
}

impl GraphScanStage {
    pub fn new() -> Self {
        Self {
            base: BaseStage::new("Graph Scan", true),
        }
    }
}

impl Default for GraphScanStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for GraphScanStage {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn skip(&self, _ctx: &ScanContext) -> bool {
        false
    }

    async fn execute(&self, ctx: &mut ScanContext) -> Result<(), PipelineError> {
        let graph = ctx.graph()?;
        let scanners = ctx.filters.scanners().to_vec();

        // Full catalog of the requested scanners, for the type count table
        let mut graph_scanner =
            GraphScanner::new(scanners.clone(), ctx.filters.clone(), ctx.subscriptions.clone());
        register_plugin_queries(&mut graph_scanner, ctx.plugin_registry);
        let (full_catalog, _) = graph_scanner.list_recommendations();

        let counts = query_type_counts(graph.as_ref(), &ctx.subscriptions, &ctx.cancel).await?;
        let totals = count_by_type(&counts);
        let active = scanners_with_resources(&scanners, &totals);
        debug!(
            requested = scanners.len(),
            active = active.len(),
            "Scanners with resources"
        );

        let mut filters = (*ctx.filters).clone();
        filters.set_scanners(active.clone());
        ctx.filters = Arc::new(filters);

        let mut graph_scanner =
            GraphScanner::new(active, ctx.filters.clone(), ctx.subscriptions.clone());
        register_plugin_queries(&mut graph_scanner, ctx.plugin_registry);
        let (catalog, _) = graph_scanner.list_recommendations();

        if ctx.params.use_aprl_recommendations {
            let results = graph_scanner.scan(graph.as_ref(), &ctx.cancel).await?;
            info!(results = results.len(), "Graph scan completed");
            ctx.report.graph.extend(results);
        } else {
            debug!("Graph recommendations disabled");
        }

        for recommendation in catalog.into_values().flat_map(|r| r.into_values()) {
            ctx.report.add_recommendation(recommendation);
        }
        ctx.report.resource_type_count =
            to_report_counts(&counts, &ctx.subscriptions, &full_catalog);
        ctx.resource_types_by_subscription = count_by_subscription(&counts);
        Ok(())
    }
}
