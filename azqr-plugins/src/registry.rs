//! Process-wide plugin registry
//!
//! Reads take a shared lock; registration and removal take it exclusively.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use once_cell::sync::Lazy;
use tracing::{info, warn};

use crate::errors::PluginError;
use crate::types::Plugin;

static GLOBAL: Lazy<PluginRegistry> = Lazy::new(PluginRegistry::new);

/// The registry shared by the whole process
pub fn global_registry() -> &'static PluginRegistry {
    &GLOBAL
}

#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: RwLock<BTreeMap<String, Arc<Plugin>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Arc<Plugin>>> {
        self.plugins.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Arc<Plugin>>> {
        self.plugins.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a plugin, replacing any plugin with the same name
    pub fn register(&self, plugin: impl Into<Option<Plugin>>) -> Result<(), PluginError> {
        let plugin = plugin.into().ok_or(PluginError::NilPlugin)?;
        if plugin.metadata.name.is_empty() {
            return Err(PluginError::EmptyName);
        }

        let mut plugins = self.write();
        if let Some(existing) = plugins.get(&plugin.metadata.name) {
            warn!(
                plugin = %plugin.metadata.name,
                existing_version = %existing.metadata.version,
                new_version = %plugin.metadata.version,
                "Plugin already registered, replacing with new version"
            );
        }
        plugins.insert(plugin.metadata.name.clone(), Arc::new(plugin));
        Ok(())
    }

    pub fn unregister(&self, name: &str) -> Result<(), PluginError> {
        self.write()
            .remove(name)
            .ok_or_else(|| PluginError::NotFound(name.to_string()))?;
        info!(plugin = %name, "Plugin unregistered");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<Plugin>> {
        self.read().get(name).cloned()
    }

    /// Every plugin, sorted by name
    pub fn list(&self) -> Vec<Arc<Plugin>> {
        self.read().values().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.read().len()
    }
}
