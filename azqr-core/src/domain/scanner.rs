//! Scanner contract and registry
//!
//! Registered scanners are prototypes. Each scan job clones one with
//! [`Scanner::clone_box`], calls [`Scanner::init`] for a subscription and then
//! [`Scanner::scan`], so no scanner state is shared between workers.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::errors::contains_skippable_error;
use super::filters::Filters;
use super::recommendation::RecommendationDefinition;
use super::results::AzqrServiceResult;
use crate::infrastructure::client_options::ClientOptions;
use crate::infrastructure::credential::SharedCredential;
use crate::infrastructure::http::ClientError;

/// Per-subscription view handed to a scanner
#[derive(Clone)]
pub struct ScannerConfig {
    pub cancel: CancellationToken,
    pub credential: Option<SharedCredential>,
    pub client_options: ClientOptions,
    pub subscription_id: String,
    pub subscription_name: String,
}

impl fmt::Debug for ScannerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScannerConfig")
            .field("subscription_id", &self.subscription_id)
            .field("subscription_name", &self.subscription_name)
            .field("has_credential", &self.credential.is_some())
            .finish()
    }
}

/// Read-only state rules may consult while evaluating a resource
#[derive(Debug, Clone, Default)]
pub struct RuleContext {
    pub filters: Arc<Filters>,
    /// Lowercase ids of resources with a private endpoint connection
    pub private_endpoints: Arc<HashSet<String>>,
    /// Lowercase ids of resources with at least one diagnostic setting
    pub diagnostics_settings: Arc<HashSet<String>>,
}

impl RuleContext {
    pub fn new(filters: Filters) -> Self {
        Self {
            filters: Arc::new(filters),
            ..Self::default()
        }
    }

    pub fn with_diagnostics_settings(mut self, ids: HashSet<String>) -> Self {
        self.diagnostics_settings = Arc::new(ids);
        self
    }

    pub fn with_private_endpoints(mut self, ids: HashSet<String>) -> Self {
        self.private_endpoints = Arc::new(ids);
        self
    }

    pub fn has_diagnostic_settings(&self, resource_id: &str) -> bool {
        self.diagnostics_settings
            .contains(&resource_id.to_lowercase())
    }

    pub fn has_private_endpoint(&self, resource_id: &str) -> bool {
        self.private_endpoints.contains(&resource_id.to_lowercase())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("scanner for {0} used before init")]
    NotInitialized(String),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("failed to decode {what}: {message}")]
    Decode { what: String, message: String },

    #[error("scan cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl ScanError {
    /// Unregistered provider, disallowed operation or missing resource
    pub fn is_skippable(&self) -> bool {
        match self {
            ScanError::Client(e) => e.is_skippable(),
            ScanError::Other(message) => contains_skippable_error(message),
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        match self {
            ScanError::Cancelled => true,
            ScanError::Client(e) => e.is_cancelled(),
            _ => false,
        }
    }
}

/// Uniform shape of every service scanner
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Bind the scanner to one subscription
    fn init(&mut self, config: &ScannerConfig) -> Result<(), ScanError>;

    /// List resources and evaluate rules against each one
    async fn scan(&self, ctx: &RuleContext) -> Result<Vec<AzqrServiceResult>, ScanError>;

    fn resource_types(&self) -> Vec<String>;

    /// Rule metadata keyed by rule id
    fn recommendations(&self) -> BTreeMap<String, RecommendationDefinition>;

    /// Fresh, uninitialised copy for a worker
    fn clone_box(&self) -> Box<dyn Scanner>;
}

/// Service abbreviation to scanners, built once at bootstrap
#[derive(Clone, Default)]
pub struct ScannerRegistry {
    scanners: BTreeMap<String, Vec<Arc<dyn Scanner>>>,
}

impl fmt::Debug for ScannerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.scanners.iter().map(|(k, v)| (k, v.len())))
            .finish()
    }
}

impl ScannerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: impl Into<String>, scanner: Arc<dyn Scanner>) {
        self.scanners.entry(key.into()).or_default().push(scanner);
    }

    pub fn get(&self, key: &str) -> Option<&[Arc<dyn Scanner>]> {
        self.scanners.get(key).map(Vec::as_slice)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.scanners.contains_key(key)
    }

    /// Sorted keys
    pub fn keys(&self) -> Vec<String> {
        self.scanners.keys().cloned().collect()
    }

    /// Every scanner, in key order
    pub fn all(&self) -> Vec<Arc<dyn Scanner>> {
        self.scanners.values().flatten().cloned().collect()
    }

    /// Scanners for `keys` in the given order; unknown keys are ignored and an
    /// empty list returns every scanner
    pub fn get_scanners(&self, keys: &[String]) -> Vec<Arc<dyn Scanner>> {
        if keys.is_empty() {
            return self.all();
        }
        keys.iter()
            .filter_map(|key| self.scanners.get(key))
            .flatten()
            .cloned()
            .collect()
    }

    /// Key owning a resource type, compared case-insensitively
    pub fn key_for_resource_type(&self, resource_type: &str) -> Option<&str> {
        self.scanners.iter().find_map(|(key, scanners)| {
            scanners
                .iter()
                .any(|s| {
                    s.resource_types()
                        .iter()
                        .any(|t| t.eq_ignore_ascii_case(resource_type))
                })
                .then_some(key.as_str())
        })
    }

    pub fn len(&self) -> usize {
        self.scanners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scanners.is_empty()
    }
}
