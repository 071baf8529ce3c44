//! Internal plugin execution

use async_trait::async_trait;
use tracing::{error, info, warn};

use azqr_plugins::get_internal_plugin;

use crate::domain::context::ScanContext;
use crate::domain::errors::PipelineError;
use crate::domain::report::PluginResult;
use crate::domain::stage::{BaseStage, Stage};

pub struct PluginExecutionStage {
    base: BaseStage,
}

impl PluginExecutionStage {
    pub fn new() -> Self {
        Self {
            base: BaseStage::new("Plugin Execution", false),
        }
    }
}

impl Default for PluginExecutionStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for PluginExecutionStage {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn skip(&self, ctx: &ScanContext) -> bool {
        !ctx.params.has_enabled_plugins()
    }

    async fn execute(&self, ctx: &mut ScanContext) -> Result<(), PipelineError> {
        let request = ctx.plugin_request();

        for name in ctx.params.enabled_plugins() {
            ctx.check_cancelled()?;

            let Some(scanner) = get_internal_plugin(ctx.plugin_registry, &name) else {
                warn!(plugin = %name, "Internal plugin not found");
                continue;
            };

            info!(plugin = %name, "Running internal plugin");
            match scanner.scan(&request).await {
                Ok(output) => {
                    info!(
                        plugin = %name,
                        rows = output.rows().len(),
                        "Internal plugin completed"
                    );
                    ctx.report.plugin_results.push(PluginResult::from(output));
                }
                Err(err) => error!(plugin = %name, error = %err, "Internal plugin failed"),
            }
        }

        ctx.check_cancelled()
    }
}
