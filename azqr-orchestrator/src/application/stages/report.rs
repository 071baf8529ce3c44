//! Hand-off to the report renderers selected by the output flags

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::context::ScanContext;
use crate::domain::errors::PipelineError;
use crate::domain::stage::{BaseStage, Stage};
use crate::infrastructure::renderers::{JsonRenderer, ReportRenderer, StdoutRenderer};

/// Renderers for the flags set on the scan
pub fn renderers_for(ctx: &ScanContext) -> Vec<Box<dyn ReportRenderer>> {
    let mut renderers: Vec<Box<dyn ReportRenderer>> = Vec::new();

    if ctx.params.xlsx {
        warn!("Excel output is not available in this build, skipping");
    }
    if ctx.params.csv {
        warn!("CSV output is not available in this build, skipping");
    }
    if ctx.params.json {
        renderers.push(Box::new(JsonRenderer::new(ctx.output_dir.clone())));
    }
    if ctx.params.stdout {
        renderers.push(Box::new(StdoutRenderer));
    }
    renderers
}

pub struct ReportRenderingStage {
    base: BaseStage,
}

impl ReportRenderingStage {
    pub fn new() -> Self {
        Self {
            base: BaseStage::new("Report Rendering", true),
        }
    }
}

impl Default for ReportRenderingStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for ReportRenderingStage {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn skip(&self, _ctx: &ScanContext) -> bool {
        self.base.skip()
    }

    async fn execute(&self, ctx: &mut ScanContext) -> Result<(), PipelineError> {
        let renderers = renderers_for(ctx);
        if renderers.is_empty() {
            debug!("No report format selected");
        }
        for renderer in renderers {
            renderer.render(&ctx.report).await?;
        }
        Ok(())
    }
}
