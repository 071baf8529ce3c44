use std::collections::BTreeMap;
use std::sync::Arc;

use futures::{StreamExt, TryStreamExt, stream};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use azqr_core::domain::{
    AprlRecommendation, AprlResult, Filters, Scanner, resource_group_from_resource_id,
    subscription_from_resource_id,
};
use azqr_core::infrastructure::graph::GraphQuery;
use azqr_core::infrastructure::http::ClientError;

use super::catalog::{
    RecommendationCatalog, builtin_recommendations, insert_recommendation, is_unvalidatable_query,
};
use crate::rows::field;

/// Graph queries in flight at once
pub const DEFAULT_QUERY_CONCURRENCY: usize = 1;

/// Runs the graph recommendations of the active scanners' resource types
pub struct GraphScanner {
    scanners: Vec<Arc<dyn Scanner>>,
    filters: Arc<Filters>,
    subscriptions: BTreeMap<String, String>,
    catalog: RecommendationCatalog,
    concurrency: usize,
}

impl GraphScanner {
    pub fn new(
        scanners: Vec<Arc<dyn Scanner>>,
        filters: Arc<Filters>,
        subscriptions: BTreeMap<String, String>,
    ) -> Self {
        Self {
            scanners,
            filters,
            subscriptions,
            catalog: builtin_recommendations().clone(),
            concurrency: DEFAULT_QUERY_CONCURRENCY,
        }
    }

    pub fn with_catalog(mut self, catalog: RecommendationCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Add a plugin query under `resource_type`
    pub fn register_external_query(
        &mut self,
        resource_type: &str,
        mut recommendation: AprlRecommendation,
    ) {
        if recommendation.resource_type.is_empty() {
            recommendation.resource_type = resource_type.to_string();
        }
        debug!(
            resource_type = %resource_type,
            recommendation_id = %recommendation.recommendation_id,
            "Registered external graph query"
        );
        insert_recommendation(&mut self.catalog, recommendation);
    }

    /// Runnable rules for one resource type, keyed by id
    fn graph_rules(&self, resource_type: &str) -> BTreeMap<String, AprlRecommendation> {
        let Some(recommendations) = self.catalog.get(&resource_type.to_lowercase()) else {
            return BTreeMap::new();
        };

        recommendations
            .values()
            .filter(|r| {
                !self.filters.is_recommendation_excluded(&r.recommendation_id)
                    && !is_unvalidatable_query(&r.graph_query)
            })
            .map(|r| (r.recommendation_id.clone(), r.clone()))
            .collect()
    }

    /// Catalog restricted to the active scanners' types, plus the flat rule list
    pub fn list_recommendations(&self) -> (RecommendationCatalog, Vec<AprlRecommendation>) {
        let mut catalog = RecommendationCatalog::new();
        let mut rules = Vec::new();

        for scanner in &self.scanners {
            for resource_type in scanner.resource_types() {
                let graph_rules = self.graph_rules(&resource_type);
                if graph_rules.is_empty() {
                    continue;
                }
                rules.extend(graph_rules.values().cloned());
                catalog
                    .entry(resource_type.to_lowercase())
                    .or_default()
                    .extend(graph_rules);
            }
        }

        (catalog, rules)
    }

    /// Execute every rule across the subscriptions
    pub async fn scan(
        &self,
        graph: &dyn GraphQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<AprlResult>, ClientError> {
        let (_, rules) = self.list_recommendations();
        let subscriptions: Vec<String> = self.subscriptions.keys().cloned().collect();

        info!(
            rules = rules.len(),
            subscriptions = subscriptions.len(),
            "Running graph recommendations"
        );

        let runnable = rules.iter().filter(|r| !r.graph_query.is_empty());
        let queries: Vec<_> = runnable
            .map(|rule| self.run_rule(graph, rule, &subscriptions, cancel))
            .collect();
        let batches: Vec<Vec<AprlResult>> = stream::iter(queries)
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let results: Vec<AprlResult> = batches
            .into_iter()
            .flatten()
            .filter(|r| !self.filters.is_service_excluded(&r.resource_id))
            .collect();

        debug!(results = results.len(), "Graph recommendations finished");
        Ok(results)
    }

    async fn run_rule(
        &self,
        graph: &dyn GraphQuery,
        rule: &AprlRecommendation,
        subscriptions: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<AprlResult>, ClientError> {
        debug!(recommendation_id = %rule.recommendation_id, "Running graph query");
        let result = graph.query(&rule.graph_query, subscriptions, cancel).await?;
        let mut rows = Vec::with_capacity(result.len());

        for row in &result.data {
            let Some(id) = row.get("id").and_then(Value::as_str) else {
                warn!(
                    recommendation_id = %rule.recommendation_id,
                    "Skipping result: 'id' field is missing in the response"
                );
                continue;
            };

            let subscription_id = subscription_from_resource_id(id);
            rows.push(AprlResult {
                recommendation_id: rule.recommendation_id.clone(),
                resource_type: rule.resource_type.clone(),
                recommendation: rule.recommendation.clone(),
                long_description: rule.long_description.clone(),
                potential_benefits: rule.potential_benefits.clone(),
                resource_id: id.to_string(),
                subscription_name: self
                    .subscriptions
                    .get(&subscription_id)
                    .cloned()
                    .unwrap_or_default(),
                subscription_id,
                resource_group: resource_group_from_resource_id(id),
                name: field(row, "name"),
                tags: field(row, "tags"),
                category: rule.category.clone(),
                impact: rule.impact.clone(),
                learn: rule.learn_more_url().to_string(),
                param1: field(row, "param1"),
                param2: field(row, "param2"),
                param3: field(row, "param3"),
                param4: field(row, "param4"),
                param5: field(row, "param5"),
                automation_available: rule.automation_available.clone(),
                source: rule.source.clone(),
            });
        }

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{redis, resource};
    use async_trait::async_trait;
    use azqr_core::domain::{FilterSpec, ScannerRegistry};
    use azqr_core::infrastructure::graph::{GraphResult, GraphRow};
    use serde_json::json;
    use std::sync::Mutex;

    /// Answers every query with the same rows and records the query text
    struct CannedGraph {
        rows: Vec<GraphRow>,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GraphQuery for CannedGraph {
        async fn query(
            &self,
            query: &str,
            _subscriptions: &[String],
            _cancel: &CancellationToken,
        ) -> Result<GraphResult, ClientError> {
            self.seen.lock().unwrap().push(query.to_string());
            Ok(GraphResult {
                data: self.rows.clone(),
            })
        }
    }

    fn redis_only(spec: FilterSpec) -> (Vec<Arc<dyn Scanner>>, Arc<Filters>) {
        let mut registry = ScannerRegistry::new();
        registry.register("redis", Arc::new(redis::new_scanner()));
        let filters = Filters::from_spec(spec, &["redis".to_string()], &registry).unwrap();
        (filters.scanners().to_vec(), Arc::new(filters))
    }

    fn row(value: serde_json::Value) -> GraphRow {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_unvalidatable_rules_are_not_listed() {
        let (scanners, filters) = redis_only(FilterSpec::default());
        let scanner = GraphScanner::new(scanners, filters, BTreeMap::new());
        let (catalog, rules) = scanner.list_recommendations();

        assert_eq!(rules.len(), 1);
        assert_eq!(catalog["microsoft.cache/redis"].len(), 1);
        assert!(!rules[0].graph_query.contains("cannot-be-validated"));
    }

    #[test]
    fn test_excluded_recommendation_is_not_listed() {
        let mut spec = FilterSpec::default();
        spec.exclude
            .recommendations
            .push("C474FC96-4E6E-4F2A-A3D7-8A9B0C1D2E01".into());
        let (scanners, filters) = redis_only(spec);
        let scanner = GraphScanner::new(scanners, filters, BTreeMap::new());
        let (_, rules) = scanner.list_recommendations();
        assert!(rules.is_empty());
    }

    #[test]
    fn test_external_query_joins_catalog() {
        let scanners: Vec<Arc<dyn Scanner>> = vec![Arc::new(resource::resource_scanner())];
        let mut filters = Filters::default();
        filters.set_scanners(scanners.clone());
        let mut scanner = GraphScanner::new(scanners, Arc::new(filters), BTreeMap::new());

        scanner.register_external_query(
            "Microsoft.Network/publicIPAddresses",
            AprlRecommendation {
                recommendation_id: "plugin-001".into(),
                recommendation: "Basic SKU public IPs are retiring".into(),
                graph_query: "resources | where sku.name =~ 'Basic'".into(),
                source: "ip-plugin".into(),
                ..Default::default()
            },
        );

        let (catalog, rules) = scanner.list_recommendations();
        let entry = &catalog["microsoft.network/publicipaddresses"]["plugin-001"];
        assert_eq!(entry.resource_type, "Microsoft.Network/publicIPAddresses");
        assert!(rules.iter().any(|r| r.recommendation_id == "plugin-001"));
    }

    #[tokio::test]
    async fn test_scan_flattens_rows() {
        let (scanners, filters) = redis_only(FilterSpec::default());
        let subscriptions = BTreeMap::from([("s1".to_string(), "Prod".to_string())]);
        let scanner = GraphScanner::new(scanners, filters, subscriptions);

        let graph = CannedGraph {
            rows: vec![
                row(json!({
                    "id": "/subscriptions/s1/resourceGroups/rg-cache/providers/Microsoft.Cache/Redis/redis01",
                    "name": "redis01",
                    "tags": {"env": "prod"},
                    "param1": "sku: Standard"
                })),
                row(json!({"name": "no-id"})),
            ],
            seen: Mutex::new(Vec::new()),
        };

        let results = scanner.scan(&graph, &CancellationToken::new()).await.unwrap();

        assert_eq!(graph.seen.lock().unwrap().len(), 1);
        assert_eq!(results.len(), 1);
        let r = &results[0];
        assert_eq!(r.subscription_name, "Prod");
        assert_eq!(r.resource_group, "rg-cache");
        assert_eq!(r.tags, r#"{"env":"prod"}"#);
        assert_eq!(r.param1, "sku: Standard");
        assert_eq!(r.param2, "");
        assert_eq!(r.source, "APRL");
        assert_eq!(r.automation_available, "true");
        assert!(r.learn.starts_with("https://"));
    }

    #[tokio::test]
    async fn test_scan_drops_excluded_services() {
        let id = "/subscriptions/s1/resourceGroups/rg/providers/Microsoft.Cache/Redis/redis01";
        let mut spec = FilterSpec::default();
        spec.exclude.services.push(id.to_string());
        let (scanners, filters) = redis_only(spec);
        let scanner = GraphScanner::new(scanners, filters, BTreeMap::new());

        let graph = CannedGraph {
            rows: vec![row(json!({"id": id, "name": "redis01"}))],
            seen: Mutex::new(Vec::new()),
        };

        let results = scanner.scan(&graph, &CancellationToken::new()).await.unwrap();
        assert!(results.is_empty());
    }

    /// Tracks how many queries overlap
    #[derive(Default)]
    struct InFlightGraph {
        current: std::sync::atomic::AtomicUsize,
        peak: std::sync::atomic::AtomicUsize,
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl GraphQuery for InFlightGraph {
        async fn query(
            &self,
            _query: &str,
            _subscriptions: &[String],
            _cancel: &CancellationToken,
        ) -> Result<GraphResult, ClientError> {
            use std::sync::atomic::Ordering;
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(GraphResult::default())
        }
    }

    fn generic_scanner() -> GraphScanner {
        let scanners: Vec<Arc<dyn Scanner>> = vec![Arc::new(resource::resource_scanner())];
        let mut filters = Filters::default();
        filters.set_scanners(scanners.clone());
        GraphScanner::new(scanners, Arc::new(filters), BTreeMap::new())
    }

    #[tokio::test]
    async fn test_queries_run_one_at_a_time_by_default() {
        use std::sync::atomic::Ordering;
        let graph = InFlightGraph::default();

        generic_scanner()
            .scan(&graph, &CancellationToken::new())
            .await
            .unwrap();

        assert!(graph.calls.load(Ordering::SeqCst) >= 2);
        assert_eq!(graph.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrency_can_be_raised() {
        use std::sync::atomic::Ordering;
        let graph = InFlightGraph::default();

        generic_scanner()
            .with_concurrency(3)
            .scan(&graph, &CancellationToken::new())
            .await
            .unwrap();

        assert!(graph.peak.load(Ordering::SeqCst) > 1);
    }
}
