//! Optional insight stages: Advisor, Defender, Policy and Arc SQL
//!
//! A failing insight does not fail the scan. The error is logged and the
//! section stays empty; cancellation still stops the pipeline.

use async_trait::async_trait;
use tracing::{info, warn};

use azqr_core::domain::{
    STAGE_ADVISOR, STAGE_ARC, STAGE_DEFENDER, STAGE_DEFENDER_RECOMMENDATIONS, STAGE_POLICY,
};
use azqr_scanners::insights::{
    DefenderScanner, list_advisor_recommendations, list_arc_sql, list_defender_recommendations,
    list_policy_states,
};

use crate::domain::context::ScanContext;
use crate::domain::errors::PipelineError;
use crate::domain::stage::{BaseStage, Stage};

/// Keep the value, or log the error and fall back to an empty one
pub(crate) fn tolerate<T: Default>(
    stage: &str,
    result: Result<T, PipelineError>,
) -> Result<T, PipelineError> {
    match result {
        Ok(value) => Ok(value),
        Err(err) if err.is_cancelled() => Err(err),
        Err(err) => {
            warn!(stage, error = %err, "Insight unavailable, continuing");
            Ok(T::default())
        }
    }
}

pub struct AdvisorStage {
    base: BaseStage,
}

impl AdvisorStage {
    pub fn new() -> Self {
        Self {
            base: BaseStage::new("Advisor", false),
        }
    }
}

impl Default for AdvisorStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for AdvisorStage {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn skip(&self, ctx: &ScanContext) -> bool {
        !ctx.params.stages.is_stage_enabled(STAGE_ADVISOR)
    }

    async fn execute(&self, ctx: &mut ScanContext) -> Result<(), PipelineError> {
        let graph = ctx.graph()?;
        let result =
            list_advisor_recommendations(graph.as_ref(), &ctx.subscriptions, &ctx.filters, &ctx.cancel)
                .await
                .map_err(PipelineError::from);
        ctx.report.advisor = tolerate(self.name(), result)?;
        Ok(())
    }
}

/// Defender plan tiers, one ARM call per subscription
pub struct DefenderStage {
    base: BaseStage,
}

impl DefenderStage {
    pub fn new() -> Self {
        Self {
            base: BaseStage::new("Defender Status", false),
        }
    }
}

impl Default for DefenderStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for DefenderStage {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn skip(&self, ctx: &ScanContext) -> bool {
        !ctx.params.stages.is_stage_enabled(STAGE_DEFENDER)
    }

    async fn execute(&self, ctx: &mut ScanContext) -> Result<(), PipelineError> {
        info!("Scanning Defender Status");
        let mut results = Vec::new();

        for (subscription_id, subscription_name) in &ctx.subscriptions {
            ctx.check_cancelled()?;
            let config = ctx.scanner_config(subscription_id, subscription_name);
            let result = match DefenderScanner::new(&config) {
                Ok(scanner) => scanner.list_configuration().await,
                Err(err) => Err(err),
            }
            .map_err(PipelineError::from);
            results.extend(tolerate(self.name(), result)?);
        }

        ctx.report.defender = results;
        Ok(())
    }
}

pub struct DefenderRecommendationsStage {
    base: BaseStage,
}

impl DefenderRecommendationsStage {
    pub fn new() -> Self {
        Self {
            base: BaseStage::new("Defender Recommendations", false),
        }
    }
}

impl Default for DefenderRecommendationsStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for DefenderRecommendationsStage {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn skip(&self, ctx: &ScanContext) -> bool {
        !ctx.params
            .stages
            .is_stage_enabled(STAGE_DEFENDER_RECOMMENDATIONS)
    }

    async fn execute(&self, ctx: &mut ScanContext) -> Result<(), PipelineError> {
        let graph = ctx.graph()?;
        let result = list_defender_recommendations(
            graph.as_ref(),
            &ctx.subscriptions,
            &ctx.filters,
            &ctx.cancel,
        )
        .await
        .map_err(PipelineError::from);
        ctx.report.defender_recommendations = tolerate(self.name(), result)?;
        Ok(())
    }
}

pub struct PolicyStage {
    base: BaseStage,
}

impl PolicyStage {
    pub fn new() -> Self {
        Self {
            base: BaseStage::new("Azure Policy", false),
        }
    }
}

impl Default for PolicyStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for PolicyStage {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn skip(&self, ctx: &ScanContext) -> bool {
        !ctx.params.stages.is_stage_enabled(STAGE_POLICY)
    }

    async fn execute(&self, ctx: &mut ScanContext) -> Result<(), PipelineError> {
        let graph = ctx.graph()?;
        let result = list_policy_states(graph.as_ref(), &ctx.subscriptions, &ctx.filters, &ctx.cancel)
            .await
            .map_err(PipelineError::from);
        ctx.report.policy = tolerate(self.name(), result)?;
        Ok(())
    }
}

pub struct ArcSqlStage {
    base: BaseStage,
}

impl ArcSqlStage {
    pub fn new() -> Self {
        Self {
            base: BaseStage::new("Arc SQL", false),
        }
    }
}

impl Default for ArcSqlStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for ArcSqlStage {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn skip(&self, ctx: &ScanContext) -> bool {
        !ctx.params.stages.is_stage_enabled(STAGE_ARC)
    }

    async fn execute(&self, ctx: &mut ScanContext) -> Result<(), PipelineError> {
        let graph = ctx.graph()?;
        let result = list_arc_sql(graph.as_ref(), &ctx.subscriptions, &ctx.filters, &ctx.cancel)
            .await
            .map_err(PipelineError::from);
        ctx.report.arc_sql = tolerate(self.name(), result)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use azqr_core::infrastructure::http::ClientError;

    use super::*;

    #[test]
    fn test_tolerate_swallows_failures() {
        let result: Result<Vec<u8>, _> =
            Err(PipelineError::InvalidInput("AuthorizationFailed".into()));
        assert_eq!(tolerate("Advisor", result).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_tolerate_keeps_cancellation() {
        let result: Result<Vec<u8>, _> = Err(PipelineError::Client(ClientError::Cancelled));
        assert!(tolerate("Advisor", result).unwrap_err().is_cancelled());
    }
}
