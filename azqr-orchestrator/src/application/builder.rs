//! Pipeline assembly

use crate::application::pipeline::Pipeline;
use crate::application::stages::{
    AdvisorStage, ArcSqlStage, CostStage, DefenderRecommendationsStage, DefenderStage,
    DiagnosticsStage, GraphScanStage, InitializationStage, PluginExecutionStage, PolicyStage,
    ProfilingCleanupStage, ProfilingStage, ReportRenderingStage, ResourceDiscoveryStage,
    ServiceScanStage, SubscriptionDiscoveryStage,
};
use crate::domain::stage::Stage;

#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<Box<dyn Stage>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline::new(self.stages)
    }

    /// Every stage of a full scan, in execution order
    pub fn build_default() -> Pipeline {
        Self::new()
            .add_stage(ProfilingStage::new())
            .add_stage(InitializationStage::new())
            .add_stage(SubscriptionDiscoveryStage::new())
            .add_stage(ResourceDiscoveryStage::new())
            .add_stage(GraphScanStage::new())
            .add_stage(DiagnosticsStage::new())
            .add_stage(ServiceScanStage::new())
            .add_stage(AdvisorStage::new())
            .add_stage(DefenderStage::new())
            .add_stage(DefenderRecommendationsStage::new())
            .add_stage(PolicyStage::new())
            .add_stage(ArcSqlStage::new())
            .add_stage(CostStage::new())
            .add_stage(PluginExecutionStage::new())
            .add_stage(ReportRenderingStage::new())
            .add_stage(ProfilingCleanupStage::new())
            .build()
    }

    /// Discovery and internal plugins only
    pub fn build_plugin_only() -> Pipeline {
        Self::new()
            .add_stage(ProfilingStage::new())
            .add_stage(InitializationStage::new())
            .add_stage(SubscriptionDiscoveryStage::new())
            .add_stage(PluginExecutionStage::new())
            .add_stage(ReportRenderingStage::new())
            .add_stage(ProfilingCleanupStage::new())
            .build()
    }
}
