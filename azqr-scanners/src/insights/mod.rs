//! Tenant-wide insights collected next to the recommendation scans
//!
//! Advisor, Defender recommendations, Policy and Arc SQL read Resource Graph;
//! Defender plans, cost and diagnostic settings call Resource Manager.

pub mod advisor;
pub mod arc;
pub mod cost;
pub mod defender;
pub mod diagnostics;
pub mod policy;

pub use advisor::list_advisor_recommendations;
pub use arc::list_arc_sql;
pub use cost::{CostPeriod, CostScanner};
pub use defender::{DefenderScanner, list_defender_recommendations};
pub use diagnostics::{
    DIAGNOSTIC_SETTINGS_RECOMMENDATION_ID, DiagnosticSettingsScanner,
    diagnostic_settings_recommendation, missing_diagnostic_settings,
    supports_diagnostic_settings,
};
pub use policy::list_policy_states;

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::Value;
    use tokio_util::sync::CancellationToken;

    use azqr_core::domain::{FilterSpec, Filters, ScannerRegistry};
    use azqr_core::infrastructure::graph::{GraphQuery, GraphResult, GraphRow};
    use azqr_core::infrastructure::http::ClientError;

    use crate::base::BaseScanner;

    /// Returns the same rows for every query
    pub struct StaticGraph(pub Vec<GraphRow>);

    impl StaticGraph {
        pub fn new(rows: Vec<Value>) -> Self {
            Self(
                rows.into_iter()
                    .filter_map(|v| v.as_object().cloned())
                    .collect(),
            )
        }
    }

    #[async_trait]
    impl GraphQuery for StaticGraph {
        async fn query(
            &self,
            _query: &str,
            _subscriptions: &[String],
            _cancel: &CancellationToken,
        ) -> Result<GraphResult, ClientError> {
            Ok(GraphResult {
                data: self.0.clone(),
            })
        }
    }

    /// Filters whose active scanners cover `types`
    pub fn filters_for(types: &[&str], spec: FilterSpec) -> Filters {
        let mut registry = ScannerRegistry::new();
        registry.register(
            "test",
            Arc::new(BaseScanner::new(types.iter().copied())),
        );
        Filters::from_spec(spec, &[], &registry).unwrap()
    }
}
