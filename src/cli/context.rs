//! Configuration, logging and clients shared by the commands

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use azqr_core::Config;
use azqr_core::infrastructure::ClientOptions;
use azqr_core::infrastructure::cloud::get_cloud_configuration;
use azqr_core::infrastructure::credential::{
    AzureCliCredential, SharedCredential, StaticTokenCredential,
};
use azqr_core::logging::{init_tracing, level_for_debug};
use azqr_orchestrator::ScanRunner;
use azqr_plugins::{global_registry, register_builtin_plugins, register_yaml_plugins};

/// Pre-acquired bearer token, used instead of the Azure CLI when set
pub const ACCESS_TOKEN_ENV: &str = "AZURE_ACCESS_TOKEN";
pub const TENANT_ID_ENV: &str = "AZURE_TENANT_ID";

pub struct CliContext {
    pub config: Config,
    pub client_options: ClientOptions,
    pub credential: SharedCredential,
}

impl CliContext {
    pub fn new(debug: bool) -> anyhow::Result<Self> {
        let mut config = Config::load().context("failed to load configuration")?;
        config.logging.level = level_for_debug(debug, &config.logging.level);
        init_tracing(&config.logging).context("failed to initialize logging")?;

        register_builtin_plugins();
        let yaml_plugins = register_yaml_plugins(global_registry(), &config.plugins.directories);
        debug!(yaml_plugins, "Plugins registered");

        let client_options = ClientOptions::new(get_cloud_configuration(), &config.http);
        Ok(Self {
            config,
            client_options,
            credential: credential_from_env(),
        })
    }

    /// Runner sharing this context's clients; Ctrl+C cancels the scan
    pub fn runner(&self) -> ScanRunner {
        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Received Ctrl+C, cancelling scan");
                on_signal.cancel();
            }
        });

        ScanRunner::new(self.client_options.clone())
            .with_credential(self.credential.clone())
            .with_scan_config(self.config.scan.clone())
            .with_cancel(cancel)
    }
}

fn credential_from_env() -> SharedCredential {
    if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
        if !token.trim().is_empty() {
            debug!("Using access token from environment");
            return Arc::new(StaticTokenCredential::new(token.trim()));
        }
    }

    let credential = match std::env::var(TENANT_ID_ENV) {
        Ok(tenant) if !tenant.is_empty() => AzureCliCredential::new().with_tenant(tenant),
        _ => AzureCliCredential::new(),
    };
    Arc::new(credential)
}
