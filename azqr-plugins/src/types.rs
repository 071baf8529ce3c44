//! Plugin data types

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use azqr_core::domain::AprlRecommendation;

use crate::internal::InternalPluginScanner;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginType {
    Yaml,
    Internal,
}

impl fmt::Display for PluginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PluginType::Yaml => "yaml",
            PluginType::Internal => "internal",
        })
    }
}

/// How a report column may be filtered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    None,
    Dropdown,
    Search,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMetadata {
    pub name: String,
    pub data_key: String,
    pub filter_type: FilterType,
}

impl ColumnMetadata {
    pub fn new(name: &str, data_key: &str, filter_type: FilterType) -> Self {
        Self {
            name: name.to_string(),
            data_key: data_key.to_string(),
            filter_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginMetadata {
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
    pub license: String,
    #[serde(rename = "type")]
    pub plugin_type: PluginType,
    /// Source file of a YAML plugin
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub column_metadata: Vec<ColumnMetadata>,
}

/// Tabular output of an internal plugin; the first row holds the headers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalPluginOutput {
    pub metadata: PluginMetadata,
    pub sheet_name: String,
    pub description: String,
    pub table: Vec<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExternalPluginOutput {
    /// Data rows without the header row
    pub fn rows(&self) -> &[Vec<String>] {
        self.table.get(1..).unwrap_or_default()
    }
}

/// A registered plugin: either YAML queries or an in-process scanner
#[derive(Clone)]
pub struct Plugin {
    pub metadata: PluginMetadata,
    pub internal_scanner: Option<Arc<dyn InternalPluginScanner>>,
    pub yaml_recommendations: Vec<AprlRecommendation>,
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("metadata", &self.metadata)
            .field("internal", &self.internal_scanner.is_some())
            .field("yaml_recommendations", &self.yaml_recommendations.len())
            .finish()
    }
}
