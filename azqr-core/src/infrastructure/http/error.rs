use serde::Deserialize;

use crate::domain::errors::{contains_skippable_error, is_skippable_error_code};
use crate::infrastructure::credential::CredentialError;
use crate::infrastructure::throttling::ThrottlingError;

/// Non-2xx response surfaced after retries
#[derive(Debug, Clone, thiserror::Error)]
#[error("HTTP {status} from {url}: {body}")]
pub struct HttpError {
    pub status: u16,
    pub body: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
}

impl HttpError {
    /// `error.code` from an ARM style error body
    pub fn error_code(&self) -> Option<String> {
        serde_json::from_str::<ErrorEnvelope>(&self.body)
            .ok()
            .map(|envelope| envelope.error.code)
    }

    pub fn is_skippable(&self) -> bool {
        if let Some(code) = self.error_code() {
            return is_skippable_error_code(&code);
        }
        contains_skippable_error(&self.body)
    }
}

/// Errors produced by [`super::HttpClient`]
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("Request to {url} timed out after {seconds}s")]
    Timeout { url: String, seconds: u64 },

    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    Build(String),

    #[error(transparent)]
    Throttling(#[from] ThrottlingError),

    #[error("Failed to acquire token: {0}")]
    Credential(#[from] CredentialError),

    #[error("Request cancelled")]
    Cancelled,
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http(e) => Some(e.status),
            _ => None,
        }
    }

    /// Subscription not registered, operation disallowed or resource not found
    pub fn is_skippable(&self) -> bool {
        match self {
            ClientError::Http(e) => e.is_skippable(),
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            ClientError::Cancelled | ClientError::Throttling(ThrottlingError::Cancelled { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_format() {
        let err = HttpError {
            status: 404,
            body: "missing".into(),
            url: "https://management.azure.com/x".into(),
        };
        assert_eq!(
            err.to_string(),
            "HTTP 404 from https://management.azure.com/x: missing"
        );
    }

    #[test]
    fn test_skippable_error_code_from_body() {
        let err = HttpError {
            status: 409,
            body: r#"{"error":{"code":"MissingSubscriptionRegistration","message":"x"}}"#.into(),
            url: "u".into(),
        };
        assert_eq!(
            err.error_code().as_deref(),
            Some("MissingSubscriptionRegistration")
        );
        assert!(ClientError::from(err).is_skippable());

        let err = HttpError {
            status: 400,
            body: r#"{"error":{"code":"BadRequest"}}"#.into(),
            url: "u".into(),
        };
        assert!(!err.is_skippable());
    }
}
