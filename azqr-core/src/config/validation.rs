//! Configuration validation module

use crate::config::{Config, HttpConfig, LoggingConfig, ScanConfig};

/// Trait for validating configuration sections
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Logging configuration error: {message}")]
    Logging { message: String },

    #[error("HTTP configuration error: {message}")]
    Http { message: String },

    #[error("Scan configuration error: {message}")]
    Scan { message: String },
}

impl ValidationError {
    pub fn logging(message: impl Into<String>) -> Self {
        Self::Logging {
            message: message.into(),
        }
    }

    pub fn http(message: impl Into<String>) -> Self {
        Self::Http {
            message: message.into(),
        }
    }

    pub fn scan(message: impl Into<String>) -> Self {
        Self::Scan {
            message: message.into(),
        }
    }
}

impl Validate for Config {
    fn validate(&self) -> Result<(), ValidationError> {
        self.logging.validate()?;
        self.http.validate()?;
        self.scan.validate()?;
        Ok(())
    }
}

impl Validate for LoggingConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.level.trim().is_empty() {
            return Err(ValidationError::logging("level cannot be empty"));
        }
        match self.format.to_ascii_lowercase().as_str() {
            "json" | "pretty" | "compact" => Ok(()),
            other => Err(ValidationError::logging(format!(
                "unsupported format '{}', expected json, pretty or compact",
                other
            ))),
        }
    }
}

impl Validate for HttpConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.timeout_seconds == 0 {
            return Err(ValidationError::http("timeout_seconds must be greater than 0"));
        }
        if self.max_retry_delay_seconds == 0 {
            return Err(ValidationError::http(
                "max_retry_delay_seconds must be greater than 0",
            ));
        }
        if self.retry_delay_ms > self.max_retry_delay_seconds * 1_000 {
            return Err(ValidationError::http(
                "retry_delay_ms cannot exceed max_retry_delay_seconds",
            ));
        }
        Ok(())
    }
}

impl Validate for ScanConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.service_workers == 0 || self.cost_workers == 0 {
            return Err(ValidationError::scan("worker pools need at least one worker"));
        }
        if self.graph_batch_size == 0 || self.graph_batch_size > 1_000 {
            return Err(ValidationError::scan(
                "graph_batch_size must be between 1 and 1000",
            ));
        }
        if self.graph_page_size == 0 || self.graph_page_size > 1_000 {
            return Err(ValidationError::scan(
                "graph_page_size must be between 1 and 1000",
            ));
        }
        if self.diagnostics_batch_size == 0 {
            return Err(ValidationError::scan(
                "diagnostics_batch_size must be greater than 0",
            ));
        }
        if self.scanner_retry_attempts == 0 {
            return Err(ValidationError::scan(
                "scanner_retry_attempts must be greater than 0",
            ));
        }
        Ok(())
    }
}
