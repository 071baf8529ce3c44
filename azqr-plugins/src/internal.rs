//! In-process plugin scanners

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Once};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::error;

use azqr_core::domain::Filters;
use azqr_core::infrastructure::ClientOptions;
use azqr_core::infrastructure::credential::SharedCredential;

use crate::carbon::EmissionsScanner;
use crate::errors::PluginError;
use crate::registry::{PluginRegistry, global_registry};
use crate::types::{ExternalPluginOutput, Plugin, PluginMetadata};

/// Everything an internal plugin gets from the scan
#[derive(Clone)]
pub struct PluginScanRequest {
    pub cancel: CancellationToken,
    pub credential: Option<SharedCredential>,
    pub client_options: ClientOptions,
    /// Subscription id to display name
    pub subscriptions: BTreeMap<String, String>,
    pub filters: Arc<Filters>,
}

impl fmt::Debug for PluginScanRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginScanRequest")
            .field("subscriptions", &self.subscriptions.len())
            .field("has_credential", &self.credential.is_some())
            .finish()
    }
}

#[async_trait]
pub trait InternalPluginScanner: Send + Sync {
    /// Run the plugin and return its table
    async fn scan(&self, request: &PluginScanRequest) -> Result<ExternalPluginOutput, PluginError>;

    fn metadata(&self) -> PluginMetadata;
}

/// Register an internal plugin under its metadata name
pub fn register_internal_plugin(
    registry: &PluginRegistry,
    scanner: Arc<dyn InternalPluginScanner>,
) -> Result<(), PluginError> {
    registry.register(Plugin {
        metadata: scanner.metadata(),
        internal_scanner: Some(scanner),
        yaml_recommendations: Vec::new(),
    })
}

pub fn get_internal_plugin(
    registry: &PluginRegistry,
    name: &str,
) -> Option<Arc<dyn InternalPluginScanner>> {
    registry.get(name)?.internal_scanner.clone()
}

static BUILTINS: Once = Once::new();

/// Add the built-in internal plugins to the global registry; later calls do
/// nothing
pub fn register_builtin_plugins() {
    BUILTINS.call_once(|| {
        if let Err(err) = register_internal_plugin(global_registry(), Arc::new(EmissionsScanner::new())) {
            error!(error = %err, "Failed to register internal plugin");
        }
    });
}
