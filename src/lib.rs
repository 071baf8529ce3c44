//! azqr - Azure Quick Review
//!
//! Wires the workspace crates into the `azqr` command-line tool.

pub mod cli;

pub use azqr_core::{Config, init_tracing};

pub use azqr_core;
pub use azqr_orchestrator;
pub use azqr_plugins;
pub use azqr_scanners;
