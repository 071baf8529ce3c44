//! Common test utilities for azqr-core
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use azqr_core::config::HttpConfig;
use azqr_core::infrastructure::ClientOptions;
use azqr_core::infrastructure::cloud::CloudConfiguration;
use azqr_core::infrastructure::http::RetryOptions;
use azqr_core::infrastructure::throttling::{ThrottlingPolicy, TokenBucketLimiter};

/// Limiters generous enough to never block a test
pub fn fast_throttling() -> ThrottlingPolicy {
    ThrottlingPolicy::new(
        Arc::new(TokenBucketLimiter::new("arm", 1_000.0, 1_000)),
        Arc::new(TokenBucketLimiter::new("graph", 1_000.0, 1_000)),
        Arc::new(TokenBucketLimiter::new("cost", 1_000.0, 1_000)),
    )
}

/// Retry envelope with a short base delay
pub fn fast_retry(max_retries: u32, base: Duration) -> RetryOptions {
    RetryOptions {
        max_retries,
        retry_delay: base,
        max_retry_delay: Duration::from_secs(2),
        try_timeout: Duration::from_secs(5),
        ..RetryOptions::default()
    }
}

/// Client options pointed at a mock server
pub fn mock_client_options(server_uri: &str, retry: RetryOptions) -> ClientOptions {
    let cloud = CloudConfiguration::custom("http://login.invalid/", format!("{}/", server_uri), None);
    ClientOptions::new(cloud, &HttpConfig::default())
        .with_throttling(fast_throttling())
        .with_retry(retry.clone())
        .with_long_running_retry(retry)
}
