//! azqr Plugins - extension points beyond the built-in scanners
//!
//! # Modules
//!
//! - [`types`] — Plugin metadata, column metadata and plugin output tables
//! - [`registry`] — Process-wide plugin registry
//! - [`yaml`] — YAML plugins contributing graph queries
//! - [`internal`] — In-process plugin scanners
//! - [`carbon`] — Carbon emissions by resource type
//!
//! # Usage
//!
//! ```rust,ignore
//! use azqr_plugins::{global_registry, register_builtin_plugins};
//!
//! register_builtin_plugins();
//! for plugin in global_registry().list() {
//!     println!("{} {}", plugin.metadata.name, plugin.metadata.version);
//! }
//! ```

pub mod carbon;
pub mod errors;
pub mod internal;
pub mod registry;
pub mod types;
pub mod yaml;

pub use errors::PluginError;
pub use internal::{
    InternalPluginScanner, PluginScanRequest, get_internal_plugin, register_builtin_plugins,
    register_internal_plugin,
};
pub use registry::{PluginRegistry, global_registry};
pub use types::{ColumnMetadata, ExternalPluginOutput, FilterType, Plugin, PluginMetadata, PluginType};
pub use yaml::{discover_yaml_plugins, load_yaml_plugin, register_yaml_plugins};
