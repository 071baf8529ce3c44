//! Subscription and resource discovery

use async_trait::async_trait;
use tracing::info;

use azqr_scanners::discovery::{EXCEL_MAX_ROWS, SubscriptionDiscovery, list_resources};

use crate::domain::context::ScanContext;
use crate::domain::errors::PipelineError;
use crate::domain::stage::{BaseStage, Stage};

pub struct SubscriptionDiscoveryStage {
    base: BaseStage,
}

impl SubscriptionDiscoveryStage {
    pub fn new() -> Self {
        Self {
            base: BaseStage::new("Subscription Discovery", true),
        }
    }
}

impl Default for SubscriptionDiscoveryStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for SubscriptionDiscoveryStage {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn skip(&self, _ctx: &ScanContext) -> bool {
        self.base.skip()
    }

    async fn execute(&self, ctx: &mut ScanContext) -> Result<(), PipelineError> {
        let discovery = SubscriptionDiscovery::new(&ctx.client_options, ctx.credential.clone())?;

        ctx.subscriptions = if ctx.params.management_groups.is_empty() {
            discovery
                .list_subscriptions(&ctx.params.subscriptions, &ctx.filters, &ctx.cancel)
                .await?
        } else {
            discovery
                .list_management_group_subscriptions(
                    &ctx.params.management_groups,
                    &ctx.filters,
                    &ctx.cancel,
                )
                .await?
        };

        info!(count = ctx.subscriptions.len(), "Subscriptions to scan");
        Ok(())
    }
}

pub struct ResourceDiscoveryStage {
    base: BaseStage,
}

impl ResourceDiscoveryStage {
    pub fn new() -> Self {
        Self {
            base: BaseStage::new("Resource Discovery", true),
        }
    }
}

impl Default for ResourceDiscoveryStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for ResourceDiscoveryStage {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn skip(&self, _ctx: &ScanContext) -> bool {
        self.base.skip()
    }

    async fn execute(&self, ctx: &mut ScanContext) -> Result<(), PipelineError> {
        let graph = ctx.graph()?;
        let (resources, excluded) =
            list_resources(graph.as_ref(), &ctx.subscriptions, &ctx.filters, &ctx.cancel).await?;

        if resources.len() > EXCEL_MAX_ROWS {
            return Err(PipelineError::TooManyResources {
                count: resources.len(),
                limit: EXCEL_MAX_ROWS,
            });
        }

        info!(
            resources = resources.len(),
            excluded = excluded.len(),
            "Resources discovered"
        );
        ctx.report.resources = resources;
        ctx.report.excluded_resources = excluded;
        Ok(())
    }
}
