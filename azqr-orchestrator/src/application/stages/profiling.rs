//! Debug-only timing bookends

use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::domain::context::ScanContext;
use crate::domain::errors::PipelineError;
use crate::domain::stage::{BaseStage, Stage};

pub struct ProfilingStage {
    base: BaseStage,
}

impl ProfilingStage {
    pub fn new() -> Self {
        Self {
            base: BaseStage::new("Profiling Setup", false),
        }
    }
}

impl Default for ProfilingStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for ProfilingStage {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn skip(&self, ctx: &ScanContext) -> bool {
        !ctx.params.debug
    }

    async fn execute(&self, ctx: &mut ScanContext) -> Result<(), PipelineError> {
        ctx.profiling_started = Some(Instant::now());
        debug!("Profiling started");
        Ok(())
    }
}

pub struct ProfilingCleanupStage {
    base: BaseStage,
}

impl ProfilingCleanupStage {
    pub fn new() -> Self {
        Self {
            base: BaseStage::new("Profiling Cleanup", false),
        }
    }
}

impl Default for ProfilingCleanupStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for ProfilingCleanupStage {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn skip(&self, ctx: &ScanContext) -> bool {
        !ctx.params.debug || ctx.profiling_started.is_none()
    }

    async fn execute(&self, ctx: &mut ScanContext) -> Result<(), PipelineError> {
        if let Some(started) = ctx.profiling_started.take() {
            info!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Profiling finished"
            );
        }
        Ok(())
    }
}
