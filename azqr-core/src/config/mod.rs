//! Configuration management

pub mod validation;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use validation::{Validate, ValidationError};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub http: HttpConfig,
    pub scan: ScanConfig,
    pub plugins: PluginsConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// HTTP pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-attempt timeout
    pub timeout_seconds: u64,
    /// Retries for regular requests (graph, discovery)
    pub max_retries: u32,
    /// Retries for long-running requests (service scans, batch lookups)
    pub long_running_max_retries: u32,
    pub retry_delay_ms: u64,
    pub long_running_retry_delay_ms: u64,
    pub max_retry_delay_seconds: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            max_retries: 3,
            long_running_max_retries: 5,
            retry_delay_ms: 1_000,
            long_running_retry_delay_ms: 4_000,
            max_retry_delay_seconds: 60,
            user_agent: format!("azqr/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Concurrency and batching knobs for the scan stages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Concurrent service scanners per subscription
    pub service_workers: usize,
    /// Upper bound for the cost worker pool
    pub cost_workers: usize,
    pub scanner_retry_attempts: u32,
    pub scanner_retry_delay_ms: u64,
    /// Subscriptions per Resource Graph request
    pub graph_batch_size: usize,
    /// Rows per Resource Graph page
    pub graph_page_size: u32,
    /// Resource ids per ARM batch request in the diagnostics stage
    pub diagnostics_batch_size: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            service_workers: 10,
            cost_workers: 10,
            scanner_retry_attempts: 3,
            scanner_retry_delay_ms: 10,
            graph_batch_size: 1_000,
            graph_page_size: 1_000,
            diagnostics_batch_size: 20,
        }
    }
}

/// YAML plugin discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    pub directories: Vec<PathBuf>,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        let mut directories = vec![PathBuf::from("plugins")];
        if let Some(home) = std::env::var_os("HOME") {
            directories.push(PathBuf::from(home).join(".azqr").join("plugins"));
        }
        Self { directories }
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigLoadError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false));

        if let Ok(env) = std::env::var("ENV") {
            builder = builder
                .add_source(config::File::with_name(&format!("config/{}", env)).required(false));
        }

        builder = builder
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("AZQR")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("plugins.directories")
                    .try_parsing(true),
            );

        let config: Config = builder.build()?.try_deserialize()?;

        config.validate()?;

        Ok(config)
    }
}

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Configuration file error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    Validation(#[from] ValidationError),
}
