//! Options shared by every client built for a scan

use std::time::Duration;

use crate::config::HttpConfig;
use crate::infrastructure::cloud::CloudConfiguration;
use crate::infrastructure::http::RetryOptions;
use crate::infrastructure::throttling::ThrottlingPolicy;

/// Cloud, retry and throttling settings handed to scanners
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub cloud: CloudConfiguration,
    /// Graph queries and discovery calls
    pub retry: RetryOptions,
    /// Service scans and batch lookups
    pub long_running_retry: RetryOptions,
    pub throttling: ThrottlingPolicy,
    pub user_agent: String,
}

impl ClientOptions {
    pub fn new(cloud: CloudConfiguration, http: &HttpConfig) -> Self {
        Self {
            cloud,
            retry: RetryOptions::from_config(http, false),
            long_running_retry: RetryOptions::from_config(http, true),
            throttling: ThrottlingPolicy::global(),
            user_agent: http.user_agent.clone(),
        }
    }

    pub fn with_throttling(mut self, throttling: ThrottlingPolicy) -> Self {
        self.throttling = throttling;
        self
    }

    pub fn with_retry(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_long_running_retry(mut self, retry: RetryOptions) -> Self {
        self.long_running_retry = retry;
        self
    }

    /// Resource Manager base URL without trailing slash
    pub fn resource_manager_endpoint(&self) -> &str {
        self.cloud.resource_manager_endpoint()
    }

    /// Upper bound for a whole request including retries
    pub fn operation_timeout(&self) -> Duration {
        self.retry.try_timeout * 10
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::new(CloudConfiguration::from_env(), &HttpConfig::default())
    }
}
