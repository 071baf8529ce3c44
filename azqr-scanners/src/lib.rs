//! azqr Scanners - everything that reads from Azure
//!
//! # Modules
//!
//! - [`arm`] — Paged Resource Manager client bound to one subscription
//! - [`base`] / [`generic`] — Scanner adapters (graph-only and list-then-evaluate)
//! - [`services`] — Built-in service scanners (Redis, Key Vault, Storage, graph-only types)
//! - [`graph`] — Declarative graph recommendations and the graph scanner
//! - [`discovery`] — Subscription and resource discovery
//! - [`insights`] — Advisor, Defender, Policy, Arc SQL, cost and diagnostic settings
//! - [`registry`] — Explicit bootstrap of the scanner registry
//!
//! # Usage
//!
//! ```rust,ignore
//! use azqr_scanners::registry::scanner_registry;
//!
//! let registry = scanner_registry();
//! let scanners = registry.get_scanners(&["redis".to_string()]);
//! ```

pub mod arm;
pub mod base;
pub mod discovery;
pub mod generic;
pub mod graph;
pub mod insights;
pub mod registry;
pub mod rows;
pub mod services;

pub use base::BaseScanner;
pub use generic::{GenericScanner, GenericScannerConfig};
pub use graph::{GraphScanner, builtin_recommendations};
pub use registry::{bootstrap, scanner_registry};
