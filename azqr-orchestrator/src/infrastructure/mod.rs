//! Report output

pub mod renderers;

pub use renderers::{JsonRenderer, ReportRenderer, StdoutRenderer, report_json};
