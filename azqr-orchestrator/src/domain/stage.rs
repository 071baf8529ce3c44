//! Stage contract

use async_trait::async_trait;

use super::context::ScanContext;
use super::errors::PipelineError;

/// One step of a scan pipeline
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &str;

    /// Checked before [`Stage::execute`]; a skipped stage is counted but not run
    fn skip(&self, ctx: &ScanContext) -> bool;

    async fn execute(&self, ctx: &mut ScanContext) -> Result<(), PipelineError>;
}

/// Name and required flag shared by the concrete stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseStage {
    name: &'static str,
    required: bool,
}

impl BaseStage {
    pub const fn new(name: &'static str, required: bool) -> Self {
        Self { name, required }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Optional stages skip unless they override this check
    pub fn skip(&self) -> bool {
        !self.required
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_stage_skips_when_not_required() {
        assert!(!BaseStage::new("Initialization", true).skip());
        assert!(BaseStage::new("Advisor", false).skip());
    }
}
