//! Common test utilities for azqr-orchestrator
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use azqr_core::config::HttpConfig;
use azqr_core::domain::{
    AzqrResult, AzqrServiceResult, RecommendationCategory, RecommendationDefinition, RecommendationImpact,
    RecommendationType, RuleContext, ScanError, Scanner, ScannerConfig,
};
use azqr_core::infrastructure::ClientOptions;
use azqr_core::infrastructure::cloud::CloudConfiguration;
use azqr_core::infrastructure::graph::{GraphQuery, GraphResult};
use azqr_core::infrastructure::http::{ClientError, RetryOptions};
use azqr_core::infrastructure::throttling::{ThrottlingPolicy, TokenBucketLimiter};

pub const SUB: &str = "00000000-0000-0000-0000-000000000001";
pub const REDIS_TYPE: &str = "Microsoft.Cache/Redis";

/// Client options pointed at a mock server, with limiters that never block
pub fn mock_client_options(server_uri: &str) -> ClientOptions {
    let cloud = CloudConfiguration::custom("http://login.invalid/", format!("{}/", server_uri), None);
    let retry = RetryOptions {
        max_retries: 1,
        retry_delay: Duration::from_millis(5),
        max_retry_delay: Duration::from_millis(50),
        try_timeout: Duration::from_secs(5),
        ..RetryOptions::default()
    };
    ClientOptions::new(cloud, &HttpConfig::default())
        .with_throttling(ThrottlingPolicy::new(
            Arc::new(TokenBucketLimiter::new("arm", 1_000.0, 1_000)),
            Arc::new(TokenBucketLimiter::new("graph", 1_000.0, 1_000)),
            Arc::new(TokenBucketLimiter::new("cost", 1_000.0, 1_000)),
        ))
        .with_retry(retry.clone())
        .with_long_running_retry(retry)
}

pub fn subscriptions_page(subscriptions: &[(&str, &str, &str)]) -> Value {
    json!({
        "value": subscriptions
            .iter()
            .map(|(id, name, state)| json!({
                "subscriptionId": id,
                "displayName": name,
                "state": state,
            }))
            .collect::<Vec<_>>()
    })
}

/// Graph stand-in answering by query substring; unmatched queries get no rows
#[derive(Default)]
pub struct CannedGraph {
    answers: Vec<(&'static str, Vec<Value>)>,
    pub queries: Mutex<Vec<String>>,
}

impl CannedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, marker: &'static str, rows: Vec<Value>) -> Self {
        self.answers.push((marker, rows));
        self
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().map(|q| q.len()).unwrap_or_default()
    }
}

#[async_trait]
impl GraphQuery for CannedGraph {
    async fn query(
        &self,
        query: &str,
        _subscriptions: &[String],
        _cancel: &CancellationToken,
    ) -> Result<GraphResult, ClientError> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.to_string());
        }
        let rows = self
            .answers
            .iter()
            .find(|(marker, _)| query.contains(marker))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default();
        Ok(GraphResult {
            data: rows
                .into_iter()
                .filter_map(|row| match row {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect(),
        })
    }
}

/// Marker of the resource inventory query
pub const RESOURCES_MARKER: &str = "skuName = tostring(sku.name)";
/// Marker of the per-type count query
pub const TYPE_COUNT_MARKER: &str = "summarize count() by subscriptionId, type";

/// Redis scanner that reports one cache per subscription
#[derive(Clone, Default)]
pub struct FakeRedisScanner {
    subscription_id: String,
    subscription_name: String,
}

#[async_trait]
impl Scanner for FakeRedisScanner {
    fn init(&mut self, config: &ScannerConfig) -> Result<(), ScanError> {
        self.subscription_id = config.subscription_id.clone();
        self.subscription_name = config.subscription_name.clone();
        Ok(())
    }

    async fn scan(&self, _ctx: &RuleContext) -> Result<Vec<AzqrServiceResult>, ScanError> {
        let recommendations = self
            .recommendations()
            .into_iter()
            .map(|(id, rule)| {
                let result = AzqrResult {
                    recommendation_id: rule.id,
                    resource_type: rule.resource_type,
                    recommendation: rule.recommendation,
                    category: rule.category,
                    impact: rule.impact,
                    recommendation_type: rule.recommendation_type,
                    learn_more_url: rule.learn_more_url,
                    not_compliant: id == "redis-fake-001",
                    result: String::new(),
                };
                (id, result)
            })
            .collect();

        Ok(vec![AzqrServiceResult {
            subscription_id: self.subscription_id.clone(),
            subscription_name: self.subscription_name.clone(),
            resource_group: "rg".into(),
            location: "westeurope".into(),
            resource_type: REDIS_TYPE.into(),
            service_name: "cache01".into(),
            recommendations,
        }])
    }

    fn resource_types(&self) -> Vec<String> {
        vec![REDIS_TYPE.to_string()]
    }

    fn recommendations(&self) -> BTreeMap<String, RecommendationDefinition> {
        let rule = |id: &str, recommendation_type: RecommendationType| RecommendationDefinition {
            id: id.to_string(),
            resource_type: REDIS_TYPE.to_string(),
            category: RecommendationCategory::HighAvailability,
            recommendation: "Redis rule".to_string(),
            impact: RecommendationImpact::High,
            recommendation_type,
            learn_more_url: String::new(),
        };
        BTreeMap::from([
            ("redis-fake-001".to_string(), rule("redis-fake-001", RecommendationType::Recommendation)),
            ("redis-fake-sla".to_string(), rule("redis-fake-sla", RecommendationType::Sla)),
        ])
    }

    fn clone_box(&self) -> Box<dyn Scanner> {
        Box::new(self.clone())
    }
}

pub fn redis_resource_row(subscription_id: &str) -> Value {
    json!({
        "id": format!("/subscriptions/{subscription_id}/resourceGroups/rg/providers/Microsoft.Cache/Redis/cache01"),
        "subscriptionId": subscription_id,
        "resourceGroup": "rg",
        "location": "westeurope",
        "type": REDIS_TYPE,
        "name": "cache01",
    })
}

pub fn type_count_row(subscription_id: &str, resource_type: &str, count: u64) -> Value {
    json!({
        "subscriptionId": subscription_id,
        "type": resource_type,
        "count_": count,
    })
}
