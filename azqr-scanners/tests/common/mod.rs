//! Common test utilities for azqr-scanners
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use azqr_core::config::HttpConfig;
use azqr_core::domain::{FilterSpec, Filters, ScannerConfig, ScannerRegistry};
use azqr_core::infrastructure::ClientOptions;
use azqr_core::infrastructure::cloud::CloudConfiguration;
use azqr_core::infrastructure::http::RetryOptions;
use azqr_core::infrastructure::throttling::{ThrottlingPolicy, TokenBucketLimiter};

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

pub fn scanner_config(server_uri: &str, subscription_id: &str) -> ScannerConfig {
    ScannerConfig {
        cancel: CancellationToken::new(),
        credential: None,
        client_options: mock_client_options(server_uri),
        subscription_id: subscription_id.to_string(),
        subscription_name: "Contoso Production".to_string(),
    }
}

/// Filters with every built-in scanner active
pub fn all_scanner_filters(spec: FilterSpec) -> Filters {
    Filters::from_spec(spec, &[], azqr_scanners::scanner_registry()).expect("valid filters")
}

pub fn empty_registry() -> ScannerRegistry {
    ScannerRegistry::new()
}
