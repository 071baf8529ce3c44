//! Cost Management totals per subscription

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use azqr_core::domain::{COST_PREVIOUS_MONTH, CostResult, STAGE_COST, ScanError};
use azqr_scanners::insights::{CostPeriod, CostScanner};

use crate::domain::context::ScanContext;
use crate::domain::errors::PipelineError;
use crate::domain::stage::{BaseStage, Stage};

pub struct CostStage {
    base: BaseStage,
}

impl CostStage {
    pub fn new() -> Self {
        Self {
            base: BaseStage::new("Cost", false),
        }
    }
}

impl Default for CostStage {
    fn default() -> Self {
        Self::new()
    }
}

/// Period selected by the `cost.previousMonth` option
pub fn cost_period(ctx: &ScanContext) -> CostPeriod {
    let previous_month = ctx
        .params
        .stages
        .option_or_default(STAGE_COST, COST_PREVIOUS_MONTH)
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    CostPeriod::for_option(previous_month, Utc::now())
}

#[async_trait]
impl Stage for CostStage {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn skip(&self, ctx: &ScanContext) -> bool {
        !ctx.params.stages.is_stage_enabled(STAGE_COST)
    }

    async fn execute(&self, ctx: &mut ScanContext) -> Result<(), PipelineError> {
        let period = cost_period(ctx);
        let mut cost = CostResult {
            from: period.from,
            to: period.to,
            items: Vec::new(),
        };

        if ctx.subscriptions.is_empty() {
            ctx.report.cost = cost;
            return Ok(());
        }

        let workers = ctx.scan_config.cost_workers.min(ctx.subscriptions.len()).max(1);
        info!(
            subscriptions = ctx.subscriptions.len(),
            workers, "Scanning Costs"
        );

        let semaphore = Arc::new(Semaphore::new(workers));
        let mut join_set: JoinSet<Result<CostResult, ScanError>> = JoinSet::new();

        for (subscription_id, subscription_name) in &ctx.subscriptions {
            let permit = semaphore.clone();
            let config = ctx.scanner_config(subscription_id, subscription_name);
            join_set.spawn(async move {
                let _permit = permit
                    .acquire_owned()
                    .await
                    .map_err(|e| ScanError::Other(format!("Failed to acquire semaphore: {e}")))?;
                CostScanner::new(&config)?.query_costs(period).await
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok(result)) => cost.items.extend(result.items),
                Ok(Err(err)) if err.is_cancelled() => {
                    join_set.abort_all();
                    return Err(err.into());
                }
                Ok(Err(err)) => warn!(error = %err, "Cost query failed, continuing"),
                Err(err) => warn!(error = %err, "Cost task aborted"),
            }
        }

        cost.items.sort_by(|a, b| {
            (a.subscription_id.as_str(), a.service_name.as_str())
                .cmp(&(b.subscription_id.as_str(), b.service_name.as_str()))
        });
        ctx.report.cost = cost;
        Ok(())
    }
}
