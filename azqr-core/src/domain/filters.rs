//! Scan scope: include/exclude filters
//!
//! Filter file format:
//!
//! ```yaml
//! azqr:
//!   include:
//!     subscriptions: []
//!     resourceGroups: []   # /subscriptions/{id}/resourceGroups/{name}
//!     resourceTypes: []    # service abbreviations
//!   exclude:
//!     subscriptions: []
//!     resourceGroups: []
//!     services: []         # full resource ids
//!     recommendations: []  # rule ids
//! ```
//!
//! Precedence: a resource whose type is not included is excluded; within
//! included types, subscription exclusion wins over resource group exclusion,
//! which wins over service exclusion. A non-empty include list excludes
//! everything outside it.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::resource_id::{
    resource_group_id_from_resource_id, resource_type_from_resource_id,
    subscription_from_resource_id,
};
use super::scanner::{Scanner, ScannerRegistry};

const EXPECTED_RG_FORMAT: &str =
    "Expected format: /subscriptions/{subscription-id}/resourceGroups/{resource-group-name}";

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("failed reading data from file: {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed parsing yaml from file: {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid resource group ID in {list} list: {message}")]
    InvalidResourceGroup { list: &'static str, message: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IncludeFilter {
    pub subscriptions: Vec<String>,
    pub resource_groups: Vec<String>,
    pub resource_types: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExcludeFilter {
    pub subscriptions: Vec<String>,
    pub resource_groups: Vec<String>,
    pub services: Vec<String>,
    pub recommendations: Vec<String>,
}

/// The `azqr` section of a filter file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    pub include: IncludeFilter,
    pub exclude: ExcludeFilter,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FilterDocument {
    azqr: FilterSpec,
}

/// Resolved filters with lowercase lookup sets and the active scanner set
#[derive(Clone, Default)]
pub struct Filters {
    pub include: IncludeFilter,
    pub exclude: ExcludeFilter,
    i_subscriptions: HashSet<String>,
    i_resource_groups: HashSet<String>,
    i_resource_types: HashSet<String>,
    x_subscriptions: HashSet<String>,
    x_resource_groups: HashSet<String>,
    x_services: HashSet<String>,
    x_recommendations: HashSet<String>,
    scanners: Vec<Arc<dyn Scanner>>,
}

impl fmt::Debug for Filters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filters")
            .field("include", &self.include)
            .field("exclude", &self.exclude)
            .field("scanners", &self.scanners.len())
            .finish()
    }
}

/// Check a resource group id against `/subscriptions/{sub}/resourceGroups/{name}`
pub fn validate_resource_group_id(resource_group_id: &str) -> Result<(), String> {
    let parts: Vec<&str> = resource_group_id.split('/').collect();

    if parts.len() != 5
        || !parts[0].is_empty()
        || parts[1] != "subscriptions"
        || parts[3] != "resourceGroups"
    {
        return Err(format!(
            "resource group ID '{}' has incorrect format. {}",
            resource_group_id, EXPECTED_RG_FORMAT
        ));
    }
    if parts[2].is_empty() {
        return Err(format!(
            "resource group ID '{}' has incorrect format: empty subscription ID. {}",
            resource_group_id, EXPECTED_RG_FORMAT
        ));
    }
    if parts[4].is_empty() {
        return Err(format!(
            "resource group ID '{}' has incorrect format: empty resource group name. {}",
            resource_group_id, EXPECTED_RG_FORMAT
        ));
    }
    Ok(())
}

fn lowercase_set(ids: &[String]) -> HashSet<String> {
    ids.iter().map(|id| id.to_lowercase()).collect()
}

/// Load filters from an optional YAML file and resolve the active scanners
pub fn load_filters(
    path: Option<&Path>,
    scanner_keys: &[String],
    registry: &ScannerRegistry,
) -> Result<Filters, FilterError> {
    let spec = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path).map_err(|source| FilterError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            parse_filter_spec(&raw).map_err(|message| FilterError::Parse {
                path: path.to_path_buf(),
                message,
            })?
        }
        None => FilterSpec::default(),
    };

    Filters::from_spec(spec, scanner_keys, registry)
}

/// Parse the YAML filter document; an empty document yields empty filters
pub fn parse_filter_spec(raw: &str) -> Result<FilterSpec, String> {
    if raw.trim().is_empty() {
        return Ok(FilterSpec::default());
    }
    serde_yml::from_str::<FilterDocument>(raw)
        .map(|doc| doc.azqr)
        .map_err(|e| e.to_string())
}

impl Filters {
    /// Build lookups, validate resource group ids and pick the active scanners
    pub fn from_spec(
        spec: FilterSpec,
        scanner_keys: &[String],
        registry: &ScannerRegistry,
    ) -> Result<Self, FilterError> {
        for id in &spec.include.resource_groups {
            validate_resource_group_id(id).map_err(|message| FilterError::InvalidResourceGroup {
                list: "include",
                message,
            })?;
        }
        for id in &spec.exclude.resource_groups {
            validate_resource_group_id(id).map_err(|message| FilterError::InvalidResourceGroup {
                list: "exclude",
                message,
            })?;
        }

        let mut filters = Filters {
            i_subscriptions: lowercase_set(&spec.include.subscriptions),
            i_resource_groups: lowercase_set(&spec.include.resource_groups),
            x_subscriptions: lowercase_set(&spec.exclude.subscriptions),
            x_resource_groups: lowercase_set(&spec.exclude.resource_groups),
            x_services: lowercase_set(&spec.exclude.services),
            x_recommendations: lowercase_set(&spec.exclude.recommendations),
            include: spec.include,
            exclude: spec.exclude,
            ..Filters::default()
        };

        let scanners = if scanner_keys.len() > 1 && !filters.include.resource_types.is_empty() {
            let selected = registry.get_scanners(&filters.include.resource_types);
            debug!(
                resource_types = ?filters.include.resource_types,
                scanners = selected.len(),
                "Loaded scanners by resource types"
            );
            selected
        } else if !scanner_keys.is_empty() {
            let selected = registry.get_scanners(scanner_keys);
            debug!(
                scanner_keys = ?scanner_keys,
                scanners = selected.len(),
                "Loaded scanners by keys"
            );
            selected
        } else {
            let selected = registry.all();
            debug!(scanners = selected.len(), "Loaded all scanners");
            selected
        };

        filters.set_scanners(scanners);
        Ok(filters)
    }

    /// Replace the active scanner set and rebuild the included type lookup
    pub fn set_scanners(&mut self, scanners: Vec<Arc<dyn Scanner>>) {
        self.i_resource_types = scanners
            .iter()
            .flat_map(|s| s.resource_types())
            .map(|t| t.to_lowercase())
            .collect();
        self.scanners = scanners;
    }

    pub fn scanners(&self) -> &[Arc<dyn Scanner>] {
        &self.scanners
    }

    pub fn add_subscription(&mut self, subscription_id: &str) {
        self.i_subscriptions.insert(subscription_id.to_lowercase());
        self.include.subscriptions.push(subscription_id.to_string());
    }

    pub fn add_resource_group(&mut self, resource_group_id: &str) {
        self.i_resource_groups
            .insert(resource_group_id.to_lowercase());
        self.include
            .resource_groups
            .push(resource_group_id.to_string());
    }

    pub fn exclude_recommendation(&mut self, recommendation_id: &str) {
        self.x_recommendations
            .insert(recommendation_id.to_lowercase());
        self.exclude
            .recommendations
            .push(recommendation_id.to_string());
    }

    pub fn is_subscription_excluded(&self, subscription_id: &str) -> bool {
        let id = subscription_id.to_lowercase();
        if self.i_subscriptions.contains(&id) {
            return false;
        }
        if !self.i_subscriptions.is_empty() {
            return true;
        }
        self.x_subscriptions.contains(&id)
    }

    pub fn is_resource_group_excluded(&self, resource_group_id: &str) -> bool {
        let id = resource_group_id.to_lowercase();
        if self.i_resource_groups.contains(&id) {
            return false;
        }
        if !self.i_resource_groups.is_empty() {
            return true;
        }
        self.x_resource_groups.contains(&id)
    }

    /// Type, then subscription, then resource group, then the service itself
    pub fn is_service_excluded(&self, resource_id: &str) -> bool {
        let resource_type = resource_type_from_resource_id(resource_id);
        if !self.i_resource_types.contains(&resource_type.to_lowercase()) {
            debug!(resource_type = %resource_type, "Service type is excluded");
            return true;
        }

        let excluded = self.is_resource_excluded(resource_id);
        if excluded {
            debug!(resource_id = %resource_id, "Service is excluded");
        }
        excluded
    }

    /// Subscription, resource group or explicit id exclusion, whatever the type
    pub fn is_resource_excluded(&self, resource_id: &str) -> bool {
        self.is_subscription_excluded(&subscription_from_resource_id(resource_id))
            || self.is_resource_group_excluded(&resource_group_id_from_resource_id(resource_id))
            || self.x_services.contains(&resource_id.to_lowercase())
    }

    pub fn is_recommendation_excluded(&self, recommendation_id: &str) -> bool {
        self.x_recommendations
            .contains(&recommendation_id.to_lowercase())
    }

    pub fn is_resource_type_excluded(&self, resource_type: &str) -> bool {
        !self.i_resource_types.contains(&resource_type.to_lowercase())
    }
}
