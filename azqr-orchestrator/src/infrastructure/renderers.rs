//! Report renderers
//!
//! Only JSON output ships with the orchestrator. Spreadsheet formats are
//! declined by the rendering stage.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use azqr_core::domain::{mask_subscription_id, mask_subscription_id_in_resource_id};

use crate::domain::errors::PipelineError;
use crate::domain::report::ReportData;

#[async_trait]
pub trait ReportRenderer: Send + Sync {
    fn format(&self) -> &'static str;

    async fn render(&self, report: &ReportData) -> Result<(), PipelineError>;
}

/// Report as JSON, with subscription ids masked when the report asks for it
pub fn report_json(report: &ReportData) -> Result<Value, PipelineError> {
    let mut value = serde_json::to_value(report).map_err(|e| PipelineError::Render {
        format: "json",
        message: e.to_string(),
    })?;
    if report.mask {
        mask_value(&mut value);
    }
    Ok(value)
}

fn mask_value(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, field) in map.iter_mut() {
                let masked = match (key.as_str(), field.as_str()) {
                    ("subscription_id", Some(id)) => Some(mask_subscription_id(id)),
                    ("resource_id" | "id", Some(id)) => {
                        Some(mask_subscription_id_in_resource_id(id))
                    }
                    _ => None,
                };
                match masked {
                    Some(id) => *field = Value::String(id),
                    None => mask_value(field),
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(mask_value),
        _ => {}
    }
}

/// Writes `{output_dir}/{output_name}.json`
#[derive(Debug, Clone)]
pub struct JsonRenderer {
    output_dir: PathBuf,
}

impl JsonRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn path_for(&self, report: &ReportData) -> PathBuf {
        self.output_dir.join(format!("{}.json", report.output_name))
    }
}

#[async_trait]
impl ReportRenderer for JsonRenderer {
    fn format(&self) -> &'static str {
        "json"
    }

    async fn render(&self, report: &ReportData) -> Result<(), PipelineError> {
        let render_error = |message: String| PipelineError::Render {
            format: "json",
            message,
        };

        let json = serde_json::to_vec_pretty(&report_json(report)?)
            .map_err(|e| render_error(e.to_string()))?;
        let path = self.path_for(report);
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| render_error(format!("{}: {}", path.display(), e)))?;

        info!(path = %path.display(), "Generating Report");
        Ok(())
    }
}

/// Prints the JSON report on standard output
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutRenderer;

#[async_trait]
impl ReportRenderer for StdoutRenderer {
    fn format(&self) -> &'static str {
        "stdout"
    }

    async fn render(&self, report: &ReportData) -> Result<(), PipelineError> {
        let json = serde_json::to_string_pretty(&report_json(report)?).map_err(|e| {
            PipelineError::Render {
                format: "stdout",
                message: e.to_string(),
            }
        })?;
        println!("{json}");
        Ok(())
    }
}
