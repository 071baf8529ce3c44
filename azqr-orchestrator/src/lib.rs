//! azqr Orchestrator - the scan pipeline
//!
//! A scan is an ordered list of stages run against one [`ScanContext`].
//! Each stage reads what earlier stages left in the context and adds its own
//! results to the [`ReportData`] it carries.
//!
//! # Architecture
//!
//! ```text
//! azqr-orchestrator/
//! ├── domain/           # Scan model
//! │   ├── context       # ScanContext handed from stage to stage
//! │   ├── report        # ReportData accumulated by the stages
//! │   ├── stage         # Stage contract and BaseStage
//! │   └── errors        # PipelineError
//! ├── application/      # Execution
//! │   ├── pipeline      # Sequential executor with metrics
//! │   ├── builder       # Default and plugin-only pipelines
//! │   ├── runner        # scan / scan_plugins entry points
//! │   └── stages/       # One module per stage family
//! └── infrastructure/   # Output
//!     └── renderers     # JSON file and stdout renderers
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use azqr_orchestrator::ScanRunner;
//!
//! let runner = ScanRunner::new(client_options).with_credential(credential);
//! let report = runner.scan(params).await?;
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::builder::PipelineBuilder;
pub use application::pipeline::{Pipeline, PipelineMetrics};
pub use application::runner::ScanRunner;
pub use domain::context::ScanContext;
pub use domain::errors::PipelineError;
pub use domain::report::{PluginResult, ReportData};
pub use domain::stage::{BaseStage, Stage};
pub use infrastructure::renderers::{JsonRenderer, ReportRenderer, StdoutRenderer};
