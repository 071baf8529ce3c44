//! azqr Core - Foundation crate for Azure Quick Review
//!
//! This crate provides the pieces shared by every other azqr crate:
//!
//! # Modules
//!
//! - [`config`] — Strongly-typed configuration with file and environment variable support
//! - [`domain`] — Scan parameters, filters, stage configuration, recommendations and the scanner contract
//! - [`infrastructure`] — Cloud selection, credentials, rate limiters, the HTTP pipeline and the Resource Graph client
//! - [`logging`] — Structured logging with tracing
//!
//! # Architecture
//!
//! ```text
//! azqr-core/
//! ├── domain/             # Pure scan model
//! │   ├── filters         # Include/exclude scope
//! │   ├── stage_config    # Togglable pipeline stages
//! │   ├── stage_options   # Typed stage.key=value options
//! │   ├── recommendation  # Rules, results and the recommendation engine
//! │   └── scanner         # Scanner contract and registry
//! ├── infrastructure/     # External integrations
//! │   ├── cloud           # AZURE_CLOUD resolution
//! │   ├── credential      # Bearer token providers
//! │   ├── throttling      # Token buckets per API family
//! │   ├── http            # Auth + throttle + retry envelope
//! │   └── graph           # Resource Graph query client
//! └── config/             # Configuration management
//! ```
//!
//! # Configuration
//!
//! Environment variables use the `AZQR__` prefix with double underscore separators:
//!
//! ```bash
//! AZQR__HTTP__TIMEOUT_SECONDS=60
//! AZQR__LOGGING__LEVEL=debug
//! ```
//!
//! # Logging
//!
//! ```rust,ignore
//! use azqr_core::{Config, init_tracing};
//!
//! let config = Config::load()?;
//! init_tracing(&config.logging)?;
//! ```

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod logging;

pub use config::Config;
pub use logging::init_tracing;
