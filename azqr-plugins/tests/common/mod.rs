//! Common test utilities for azqr-plugins
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use azqr_core::config::HttpConfig;
use azqr_core::domain::{
    AzqrServiceResult, FilterSpec, Filters, RecommendationDefinition, RuleContext, ScanError,
    Scanner, ScannerConfig, ScannerRegistry,
};
use azqr_core::infrastructure::ClientOptions;
use azqr_core::infrastructure::cloud::CloudConfiguration;
use azqr_core::infrastructure::http::RetryOptions;
use azqr_core::infrastructure::throttling::{ThrottlingPolicy, TokenBucketLimiter};
use azqr_plugins::PluginScanRequest;

/// Scanner that only declares resource types
#[derive(Clone)]
pub struct TypesOnly(pub Vec<String>);

#[async_trait]
impl Scanner for TypesOnly {
    fn init(&mut self, _config: &ScannerConfig) -> Result<(), ScanError> {
        Ok(())
    }

    async fn scan(&self, _ctx: &RuleContext) -> Result<Vec<AzqrServiceResult>, ScanError> {
        Ok(Vec::new())
    }

    fn resource_types(&self) -> Vec<String> {
        self.0.clone()
    }

    fn recommendations(&self) -> BTreeMap<String, RecommendationDefinition> {
        BTreeMap::new()
    }

    fn clone_box(&self) -> Box<dyn Scanner> {
        Box::new(self.clone())
    }
}

/// Filters whose active types are exactly `types`
pub fn filters_for(types: &[&str]) -> Filters {
    let mut registry = ScannerRegistry::new();
    registry.register(
        "test",
        Arc::new(TypesOnly(types.iter().map(|t| t.to_string()).collect())),
    );
    Filters::from_spec(FilterSpec::default(), &[], &registry).expect("valid filters")
}

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

/// `count` subscriptions named `sub-000`, `sub-001`, ...
pub fn plugin_request(server_uri: &str, count: usize, filters: Filters) -> PluginScanRequest {
    PluginScanRequest {
        cancel: CancellationToken::new(),
        credential: None,
        client_options: mock_client_options(server_uri),
        subscriptions: (0..count)
            .map(|i| (format!("sub-{i:03}"), format!("Subscription {i}")))
            .collect(),
        filters: Arc::new(filters),
    }
}
