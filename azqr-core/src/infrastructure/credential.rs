//! Bearer token providers
//!
//! The scan core only needs `get_token(scopes)`. Two providers ship with the
//! workspace: a static token (tests, pre-fetched tokens) and one backed by the
//! Azure CLI. `AZURE_TOKEN_CREDENTIALS` is passed through to the CLI untouched.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::debug;

/// Access token with its expiry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_on: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_on,
        }
    }

    /// True when the token expires within `margin` of `now`
    pub fn expires_within(&self, margin: Duration, now: DateTime<Utc>) -> bool {
        self.expires_on - margin <= now
    }
}

/// Errors raised while acquiring a token
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Failed to run credential command: {0}")]
    Command(#[from] std::io::Error),

    #[error("Credential command failed: {0}")]
    CommandFailed(String),

    #[error("Failed to parse token response: {0}")]
    Parse(String),

    #[error("No scopes requested")]
    NoScopes,
}

/// Anything able to mint bearer tokens
#[async_trait]
pub trait TokenCredential: Send + Sync {
    async fn get_token(&self, scopes: &[String]) -> Result<AccessToken, CredentialError>;
}

pub type SharedCredential = Arc<dyn TokenCredential>;

/// Returns the same token for every scope
#[derive(Debug, Clone)]
pub struct StaticTokenCredential {
    token: AccessToken,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: AccessToken::new(token, Utc::now() + Duration::hours(1)),
        }
    }

    pub fn with_expiry(token: impl Into<String>, expires_on: DateTime<Utc>) -> Self {
        Self {
            token: AccessToken::new(token, expires_on),
        }
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn get_token(&self, scopes: &[String]) -> Result<AccessToken, CredentialError> {
        if scopes.is_empty() {
            return Err(CredentialError::NoScopes);
        }
        Ok(self.token.clone())
    }
}

#[derive(Debug, Deserialize)]
struct CliTokenResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
    /// Epoch seconds, present on newer CLI versions
    #[serde(default)]
    expires_on: Option<i64>,
    /// Local time string
    #[serde(rename = "expiresOn", default)]
    expires_on_str: Option<String>,
}

/// Shells out to `az account get-access-token`
#[derive(Debug, Clone, Default)]
pub struct AzureCliCredential {
    tenant_id: Option<String>,
}

impl AzureCliCredential {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    fn scope_to_resource(scope: &str) -> &str {
        scope.trim_end_matches("/.default")
    }

    fn parse_response(raw: &[u8]) -> Result<AccessToken, CredentialError> {
        let response: CliTokenResponse =
            serde_json::from_slice(raw).map_err(|e| CredentialError::Parse(e.to_string()))?;

        let expires_on = match (response.expires_on, response.expires_on_str) {
            (Some(epoch), _) => DateTime::<Utc>::from_timestamp(epoch, 0)
                .ok_or_else(|| CredentialError::Parse(format!("invalid expiry {}", epoch)))?,
            (None, Some(local)) => chrono::NaiveDateTime::parse_from_str(
                &local,
                "%Y-%m-%d %H:%M:%S%.f",
            )
            .map(|naive| naive.and_utc())
            .map_err(|e| CredentialError::Parse(e.to_string()))?,
            (None, None) => Utc::now() + Duration::minutes(30),
        };

        Ok(AccessToken::new(response.access_token, expires_on))
    }
}

#[async_trait]
impl TokenCredential for AzureCliCredential {
    async fn get_token(&self, scopes: &[String]) -> Result<AccessToken, CredentialError> {
        let scope = scopes.first().ok_or(CredentialError::NoScopes)?;
        debug!(scope = %scope, "Requesting token from Azure CLI");

        let mut command = tokio::process::Command::new("az");
        command
            .arg("account")
            .arg("get-access-token")
            .arg("--output")
            .arg("json")
            .arg("--resource")
            .arg(Self::scope_to_resource(scope));
        if let Some(tenant) = &self.tenant_id {
            command.arg("--tenant").arg(tenant);
        }

        let output = command.output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CredentialError::CommandFailed(
                stderr.lines().next().unwrap_or("unknown error").trim().to_string(),
            ));
        }

        Self::parse_response(&output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cli_response_with_epoch() {
        let raw = br#"{"accessToken":"abc","expiresOn":"2030-01-01 00:00:00.000000","expires_on":1893456000,"tokenType":"Bearer"}"#;
        let token = AzureCliCredential::parse_response(raw).unwrap();
        assert_eq!(token.token, "abc");
        assert_eq!(token.expires_on.timestamp(), 1_893_456_000);
    }

    #[test]
    fn test_expires_within_margin() {
        let now = Utc::now();
        let token = AccessToken::new("t", now + Duration::minutes(4));
        assert!(token.expires_within(Duration::minutes(5), now));
        assert!(!token.expires_within(Duration::minutes(3), now));
    }

    #[tokio::test]
    async fn test_static_credential_requires_scope() {
        let credential = StaticTokenCredential::new("token");
        assert!(matches!(
            credential.get_token(&[]).await,
            Err(CredentialError::NoScopes)
        ));
        let token = credential
            .get_token(&["https://management.azure.com/.default".to_string()])
            .await
            .unwrap();
        assert_eq!(token.token, "token");
    }
}
