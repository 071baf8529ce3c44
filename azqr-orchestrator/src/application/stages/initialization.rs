//! Scope validation, output naming and client setup

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use tracing::{debug, info};

use azqr_core::domain::ScanParams;
use azqr_core::infrastructure::graph::GraphQueryClient;

use crate::domain::context::ScanContext;
use crate::domain::errors::PipelineError;
use crate::domain::report::ReportData;
use crate::domain::stage::{BaseStage, Stage};

/// Output file name used when the caller does not provide one
pub fn default_output_name(now: DateTime<Local>) -> String {
    now.format("azqr_action_plan_%Y_%m_%d_T%H%M%S").to_string()
}

/// Reject scope combinations that cannot be scanned
pub fn validate_scope(params: &ScanParams) -> Result<(), PipelineError> {
    if !params.management_groups.is_empty()
        && (!params.subscriptions.is_empty() || !params.resource_groups.is_empty())
    {
        return Err(PipelineError::InvalidInput(
            "Management Group name cannot be used with a Subscription Id or Resource Group name"
                .to_string(),
        ));
    }

    if !params.resource_groups.is_empty() {
        if params.subscriptions.is_empty() {
            return Err(PipelineError::InvalidInput(
                "Resource Group name can only be used with a Subscription Id".to_string(),
            ));
        }
        if params.subscriptions.len() > 1 {
            return Err(PipelineError::InvalidInput(
                "Resource Group name can only be used with 1 Subscription Id".to_string(),
            ));
        }
    }

    Ok(())
}

pub struct InitializationStage {
    base: BaseStage,
}

impl InitializationStage {
    pub fn new() -> Self {
        Self {
            base: BaseStage::new("Initialization", true),
        }
    }
}

impl Default for InitializationStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for InitializationStage {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn skip(&self, _ctx: &ScanContext) -> bool {
        self.base.skip()
    }

    async fn execute(&self, ctx: &mut ScanContext) -> Result<(), PipelineError> {
        validate_scope(&ctx.params)?;

        if ctx.params.output_name.is_empty() {
            ctx.params.output_name = default_output_name(Local::now());
        }

        let mut filters = ctx.params.filters.clone();
        for subscription in &ctx.params.subscriptions {
            filters.add_subscription(subscription);
        }
        if let Some(subscription) = ctx.params.subscriptions.first() {
            for resource_group in &ctx.params.resource_groups {
                filters.add_resource_group(&format!(
                    "/subscriptions/{subscription}/resourceGroups/{resource_group}"
                ));
            }
        }
        ctx.filters = Arc::new(filters);

        if ctx.graph.is_none() {
            let client = GraphQueryClient::new(
                &ctx.client_options,
                ctx.credential.clone(),
                &ctx.scan_config,
            )?;
            debug!(endpoint = client.endpoint(), "Graph client ready");
            ctx.graph = Some(Arc::new(client));
        }

        ctx.report = ReportData::new(ctx.params.output_name.clone(), ctx.params.mask);
        info!(
            output_name = %ctx.params.output_name,
            stages = ?ctx.params.stages.enabled_stages(),
            "Scan initialized"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rstest::rstest;

    use super::*;

    fn params(groups: &[&str], subscriptions: &[&str], resource_groups: &[&str]) -> ScanParams {
        ScanParams {
            management_groups: groups.iter().map(|s| s.to_string()).collect(),
            subscriptions: subscriptions.iter().map(|s| s.to_string()).collect(),
            resource_groups: resource_groups.iter().map(|s| s.to_string()).collect(),
            ..ScanParams::default()
        }
    }

    #[rstest]
    #[case(&["mg"], &["s1"], &[], "Management Group name cannot be used with a Subscription Id or Resource Group name")]
    #[case(&["mg"], &[], &["rg"], "Management Group name cannot be used with a Subscription Id or Resource Group name")]
    #[case(&[], &[], &["rg"], "Resource Group name can only be used with a Subscription Id")]
    #[case(&[], &["s1", "s2"], &["rg"], "Resource Group name can only be used with 1 Subscription Id")]
    fn test_invalid_scopes(
        #[case] groups: &[&str],
        #[case] subscriptions: &[&str],
        #[case] resource_groups: &[&str],
        #[case] message: &str,
    ) {
        let err = validate_scope(&params(groups, subscriptions, resource_groups)).unwrap_err();
        assert_eq!(err.to_string(), message);
    }

    #[rstest]
    #[case(&[], &[], &[])]
    #[case(&["mg"], &[], &[])]
    #[case(&[], &["s1", "s2"], &[])]
    #[case(&[], &["s1"], &["rg1", "rg2"])]
    fn test_valid_scopes(
        #[case] groups: &[&str],
        #[case] subscriptions: &[&str],
        #[case] resource_groups: &[&str],
    ) {
        assert!(validate_scope(&params(groups, subscriptions, resource_groups)).is_ok());
    }

    #[test]
    fn test_default_output_name_format() {
        let now = Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap();
        assert_eq!(default_output_name(now), "azqr_action_plan_2024_03_07_T090502");
    }
}
