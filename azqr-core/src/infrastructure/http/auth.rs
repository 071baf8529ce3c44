use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use crate::infrastructure::credential::{AccessToken, CredentialError, SharedCredential};

/// Tokens are refreshed this long before they expire
pub const REFRESH_MARGIN_MINUTES: i64 = 5;

/// Acquires and caches a bearer token for a fixed set of scopes
pub struct BearerTokenPolicy {
    credential: SharedCredential,
    scopes: Vec<String>,
    cached: Mutex<Option<AccessToken>>,
}

impl BearerTokenPolicy {
    pub fn new(credential: SharedCredential, scopes: Vec<String>) -> Self {
        Self {
            credential,
            scopes,
            cached: Mutex::new(None),
        }
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Cached token, refreshed when it is within five minutes of expiry
    pub async fn token(&self) -> Result<String, CredentialError> {
        let mut cached = self.cached.lock().await;
        let margin = Duration::minutes(REFRESH_MARGIN_MINUTES);

        if let Some(token) = cached.as_ref() {
            if !token.expires_within(margin, Utc::now()) {
                return Ok(token.token.clone());
            }
            debug!(expires_on = %token.expires_on, "Refreshing bearer token");
        }

        let fresh = self.credential.get_token(&self.scopes).await?;
        let value = fresh.token.clone();
        *cached = Some(fresh);
        Ok(value)
    }
}

impl std::fmt::Debug for BearerTokenPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerTokenPolicy")
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::credential::TokenCredential;
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingCredential {
        calls: AtomicUsize,
        lifetime: Duration,
    }

    #[async_trait]
    impl TokenCredential for CountingCredential {
        async fn get_token(&self, _scopes: &[String]) -> Result<AccessToken, CredentialError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let expires_on: DateTime<Utc> = Utc::now() + self.lifetime;
            Ok(AccessToken::new(format!("token-{}", n), expires_on))
        }
    }

    #[tokio::test]
    async fn test_token_is_cached_until_near_expiry() {
        let credential = Arc::new(CountingCredential {
            calls: AtomicUsize::new(0),
            lifetime: Duration::hours(1),
        });
        let policy = BearerTokenPolicy::new(credential.clone(), vec!["scope".into()]);

        assert_eq!(policy.token().await.unwrap(), "token-0");
        assert_eq!(policy.token().await.unwrap(), "token-0");
        assert_eq!(credential.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_short_lived_token_is_refreshed() {
        let credential = Arc::new(CountingCredential {
            calls: AtomicUsize::new(0),
            lifetime: Duration::minutes(2),
        });
        let policy = BearerTokenPolicy::new(credential.clone(), vec!["scope".into()]);

        assert_eq!(policy.token().await.unwrap(), "token-0");
        assert_eq!(policy.token().await.unwrap(), "token-1");
        assert_eq!(credential.calls.load(Ordering::SeqCst), 2);
    }
}
