//! YAML plugins
//!
//! A YAML plugin is a named bundle of Resource Graph queries that the graph
//! stage runs alongside the built-in recommendations:
//!
//! ```yaml
//! name: contoso-standards
//! version: 1.2.0
//! queries:
//!   - aprlGuid: contoso-001
//!     description: Storage accounts must be tagged with a cost center
//!     recommendationResourceType: Microsoft.Storage/storageAccounts
//!     recommendationControl: Governance
//!     recommendationImpact: Medium
//!     queryFile: queries/untagged-storage.kql
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use azqr_core::domain::{AprlRecommendation, LearnMoreLink};

use crate::errors::PluginError;
use crate::registry::PluginRegistry;
use crate::types::{Plugin, PluginMetadata, PluginType};

pub const DEFAULT_PLUGIN_VERSION: &str = "1.0.0";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct YamlPluginConfig {
    name: String,
    version: String,
    description: String,
    author: String,
    license: String,
    queries: Vec<YamlPluginQuery>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct YamlPluginQuery {
    aprl_guid: String,
    description: String,
    recommendation_control: String,
    recommendation_impact: String,
    recommendation_resource_type: String,
    recommendation_metadata_state: String,
    long_description: String,
    potential_benefits: String,
    pg_verified: bool,
    automation_available: bool,
    tags: Vec<String>,
    learn_more_link: Vec<LearnMoreLink>,
    query: String,
    query_file: String,
}

impl YamlPluginQuery {
    fn into_recommendation(self, source: &str) -> AprlRecommendation {
        AprlRecommendation {
            recommendation_id: self.aprl_guid,
            recommendation: self.description,
            category: self.recommendation_control,
            impact: self.recommendation_impact,
            resource_type: self.recommendation_resource_type,
            metadata_state: self.recommendation_metadata_state,
            long_description: self.long_description,
            potential_benefits: self.potential_benefits,
            pg_verified: self.pg_verified,
            automation_available: self.automation_available.to_string(),
            tags: self.tags,
            graph_query: self.query,
            learn_more_link: self.learn_more_link,
            source: source.to_string(),
        }
    }
}

/// Load one YAML plugin and turn its queries into graph recommendations
pub fn load_yaml_plugin(path: &Path) -> Result<Plugin, PluginError> {
    let raw = fs::read_to_string(path).map_err(|source| PluginError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config: YamlPluginConfig = serde_yml::from_str(&raw)?;

    if config.name.is_empty() {
        return Err(PluginError::MissingName);
    }
    if config.version.is_empty() {
        config.version = DEFAULT_PLUGIN_VERSION.to_string();
    }
    if config.queries.is_empty() {
        return Err(PluginError::NoQueries);
    }

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    for query in &mut config.queries {
        if !query.query_file.is_empty() {
            query.query = fs::read_to_string(base_dir.join(&query.query_file)).map_err(|source| {
                PluginError::QueryFile {
                    file: query.query_file.clone(),
                    source,
                }
            })?;
        }
        if query.query.is_empty() {
            return Err(PluginError::EmptyQuery(query.aprl_guid.clone()));
        }
        if query.aprl_guid.is_empty() {
            return Err(PluginError::MissingGuid);
        }
        if query.description.is_empty() {
            return Err(PluginError::MissingDescription(query.aprl_guid.clone()));
        }
    }

    let recommendations = config
        .queries
        .into_iter()
        .map(|q| q.into_recommendation(&config.name))
        .collect();

    Ok(Plugin {
        metadata: PluginMetadata {
            name: config.name,
            version: config.version,
            description: config.description,
            author: config.author,
            license: config.license,
            plugin_type: PluginType::Yaml,
            command_path: Some(path.to_path_buf()),
            column_metadata: Vec::new(),
        },
        internal_scanner: None,
        yaml_recommendations: recommendations,
    })
}

fn is_yaml_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Walk `dirs` for YAML plugins. Missing directories are skipped, files that
/// are not valid plugins are skipped, and the first plugin with a given name
/// wins.
pub fn discover_yaml_plugins(dirs: &[PathBuf]) -> Vec<Plugin> {
    let mut plugins = Vec::new();
    let mut seen = HashSet::new();

    for dir in dirs {
        if !dir.is_dir() {
            continue;
        }

        let files = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!(dir = %dir.display(), error = %err, "Error walking plugin directory");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && is_yaml_file(entry.path()));

        for entry in files {
            let path = entry.path();
            let plugin = match load_yaml_plugin(path) {
                Ok(plugin) => plugin,
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "Skipping file - not a valid YAML plugin");
                    continue;
                }
            };

            if !seen.insert(plugin.metadata.name.clone()) {
                debug!(plugin = %plugin.metadata.name, path = %path.display(), "Skipping duplicate YAML plugin");
                continue;
            }

            debug!(
                plugin = %plugin.metadata.name,
                path = %path.display(),
                queries = plugin.yaml_recommendations.len(),
                "Discovered YAML plugin"
            );
            plugins.push(plugin);
        }
    }

    plugins
}

/// Discover YAML plugins and add them to `registry`; returns how many were
/// registered
pub fn register_yaml_plugins(registry: &PluginRegistry, dirs: &[PathBuf]) -> usize {
    let mut registered = 0;
    for plugin in discover_yaml_plugins(dirs) {
        let name = plugin.metadata.name.clone();
        match registry.register(plugin) {
            Ok(()) => registered += 1,
            Err(err) => warn!(plugin = %name, error = %err, "Failed to register YAML plugin"),
        }
    }
    if registered > 0 {
        info!(plugins = registered, "YAML plugins loaded");
    }
    registered
}
