//! Diagnostic settings lookup

use std::collections::BTreeSet;

use async_trait::async_trait;
use tracing::info;

use azqr_core::domain::STAGE_DIAGNOSTICS;
use azqr_scanners::insights::{
    DIAGNOSTIC_SETTINGS_RECOMMENDATION_ID, DiagnosticSettingsScanner,
    diagnostic_settings_recommendation, missing_diagnostic_settings, supports_diagnostic_settings,
};

use crate::domain::context::ScanContext;
use crate::domain::errors::PipelineError;
use crate::domain::stage::{BaseStage, Stage};

pub struct DiagnosticsStage {
    base: BaseStage,
}

impl DiagnosticsStage {
    pub fn new() -> Self {
        Self {
            base: BaseStage::new("Diagnostics Settings Scan", false),
        }
    }
}

impl Default for DiagnosticsStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for DiagnosticsStage {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn skip(&self, ctx: &ScanContext) -> bool {
        !ctx.params.stages.is_stage_enabled(STAGE_DIAGNOSTICS)
    }

    async fn execute(&self, ctx: &mut ScanContext) -> Result<(), PipelineError> {
        let scanner = DiagnosticSettingsScanner::new(&ctx.client_options, ctx.credential.clone())?
            .with_batch_size(ctx.scan_config.diagnostics_batch_size);
        ctx.diagnostics_settings = scanner.scan(&ctx.report.resources, &ctx.cancel).await?;

        if ctx
            .filters
            .is_recommendation_excluded(DIAGNOSTIC_SETTINGS_RECOMMENDATION_ID)
        {
            return Ok(());
        }

        let supported: BTreeSet<&str> = ctx
            .report
            .resources
            .iter()
            .map(|r| r.resource_type.as_str())
            .filter(|t| supports_diagnostic_settings(t))
            .collect();
        let recommendations: Vec<_> = supported
            .into_iter()
            .map(diagnostic_settings_recommendation)
            .collect();
        for recommendation in recommendations {
            ctx.report.add_recommendation(recommendation);
        }

        let missing: Vec<_> = missing_diagnostic_settings(
            &ctx.report.resources,
            &ctx.diagnostics_settings,
            &ctx.subscriptions,
        )
        .into_iter()
        .filter(|r| !ctx.filters.is_service_excluded(&r.resource_id))
        .collect();

        info!(
            with_settings = ctx.diagnostics_settings.len(),
            missing = missing.len(),
            "Diagnostic settings scanned"
        );
        ctx.report.graph.extend(missing);
        Ok(())
    }
}
