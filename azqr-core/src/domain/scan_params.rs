//! Caller-supplied scan request

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::filters::{FilterError, Filters, load_filters};
use super::scanner::ScannerRegistry;
use super::stage_config::{StageConfigError, StageConfigs};
use super::stage_options::StageOptionError;

#[derive(Debug, thiserror::Error)]
pub enum ScanParamsError {
    #[error(transparent)]
    Stage(#[from] StageConfigError),

    #[error("failed applying stage parameters: {0}")]
    StageOptions(#[from] StageOptionError),

    #[error(transparent)]
    Filters(#[from] FilterError),
}

/// Everything a scan needs to know up front. Only `filters` scanners are
/// derived once the scan starts.
#[derive(Debug, Clone)]
pub struct ScanParams {
    pub management_groups: Vec<String>,
    pub subscriptions: Vec<String>,
    pub resource_groups: Vec<String>,
    pub output_name: String,
    pub stages: StageConfigs,
    pub xlsx: bool,
    pub mask: bool,
    pub csv: bool,
    pub json: bool,
    pub stdout: bool,
    pub debug: bool,
    pub scanner_keys: Vec<String>,
    pub filters: Filters,
    pub enabled_internal_plugins: BTreeMap<String, bool>,
    pub use_azqr_recommendations: bool,
    pub use_aprl_recommendations: bool,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            management_groups: Vec::new(),
            subscriptions: Vec::new(),
            resource_groups: Vec::new(),
            output_name: String::new(),
            stages: StageConfigs::with_defaults(),
            xlsx: false,
            mask: true,
            csv: false,
            json: false,
            stdout: false,
            debug: false,
            scanner_keys: Vec::new(),
            filters: Filters::default(),
            enabled_internal_plugins: BTreeMap::new(),
            use_azqr_recommendations: true,
            use_aprl_recommendations: true,
        }
    }
}

/// Programmatic scan request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanArgs {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subscriptions: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource_groups: Vec<String>,
    /// Scanner keys
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<String>,
    /// `name` enables, `-name` disables
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<String>,
    /// `stage.key=value`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stage_params: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask: Option<bool>,
}

/// Programmatic plugin-only scan request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PluginScanArgs {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subscriptions: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource_groups: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask: Option<bool>,
}

impl ScanParams {
    /// Default stages adjusted by `args`, filters with no file, masking on
    /// unless turned off
    pub fn with_defaults(
        args: ScanArgs,
        registry: &ScannerRegistry,
    ) -> Result<Self, ScanParamsError> {
        let mut stages = StageConfigs::with_defaults();
        if !args.stages.is_empty() {
            stages.configure_stages(&args.stages)?;
        }
        stages.apply_stage_params(&args.stage_params)?;

        let filters = load_filters(None, &args.services, registry)?;

        Ok(Self {
            subscriptions: args.subscriptions,
            resource_groups: args.resource_groups,
            stages,
            mask: args.mask.unwrap_or(true),
            scanner_keys: args.services,
            filters,
            ..Self::default()
        })
    }

    /// No stage configured and the given internal plugins enabled
    pub fn for_plugins(
        args: PluginScanArgs,
        enabled_internal_plugins: BTreeMap<String, bool>,
        registry: &ScannerRegistry,
    ) -> Result<Self, ScanParamsError> {
        let filters = load_filters(None, &[], registry)?;

        Ok(Self {
            subscriptions: args.subscriptions,
            resource_groups: args.resource_groups,
            stages: StageConfigs::new(),
            mask: args.mask.unwrap_or(true),
            filters,
            enabled_internal_plugins,
            ..Self::default()
        })
    }

    /// True when at least one internal plugin is switched on
    pub fn has_enabled_plugins(&self) -> bool {
        self.enabled_internal_plugins.values().any(|enabled| *enabled)
    }

    /// Enabled internal plugin names, sorted
    pub fn enabled_plugins(&self) -> Vec<String> {
        self.enabled_internal_plugins
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::stage_config::{STAGE_ADVISOR, STAGE_COST, STAGE_GRAPH};
    use crate::domain::stage_options::{COST_PREVIOUS_MONTH, OptionValue};

    #[test]
    fn test_defaults() {
        let params = ScanParams::default();
        assert!(params.mask);
        assert!(params.use_azqr_recommendations);
        assert!(params.use_aprl_recommendations);
        assert!(!params.debug);
        assert!(params.stages.is_stage_enabled(STAGE_GRAPH));
        assert!(!params.has_enabled_plugins());
    }

    #[test]
    fn test_with_defaults_applies_stages_and_params() {
        let args = ScanArgs {
            stages: vec!["cost".into(), "-advisor".into()],
            stage_params: vec!["cost.previousMonth=true".into()],
            mask: Some(false),
            ..Default::default()
        };
        let params = ScanParams::with_defaults(args, &ScannerRegistry::new()).unwrap();
        assert!(params.stages.is_stage_enabled(STAGE_COST));
        assert!(!params.stages.is_stage_enabled(STAGE_ADVISOR));
        assert_eq!(
            params.stages.get_option(STAGE_COST, COST_PREVIOUS_MONTH),
            Some(&OptionValue::Bool(true))
        );
        assert!(!params.mask);
    }

    #[test]
    fn test_with_defaults_rejects_bad_stage_param() {
        let args = ScanArgs {
            stage_params: vec!["cost.bogus=1".into()],
            ..Default::default()
        };
        let err = ScanParams::with_defaults(args, &ScannerRegistry::new()).unwrap_err();
        assert!(err.to_string().contains("unknown option \"bogus\""));
    }

    #[test]
    fn test_for_plugins() {
        let enabled = BTreeMap::from([
            ("carbon".to_string(), true),
            ("other".to_string(), false),
        ]);
        let params =
            ScanParams::for_plugins(PluginScanArgs::default(), enabled, &ScannerRegistry::new())
                .unwrap();
        assert!(params.stages.enabled_stages().is_empty());
        assert!(params.mask);
        assert_eq!(params.enabled_plugins(), vec!["carbon"]);
    }

    #[test]
    fn test_args_deserialize_camel_case() {
        let args: ScanArgs = serde_json::from_str(
            r#"{"subscriptions":["s"],"stageParams":["cost.previousMonth=1"],"mask":false}"#,
        )
        .unwrap();
        assert_eq!(args.subscriptions, vec!["s"]);
        assert_eq!(args.stage_params.len(), 1);
        assert_eq!(args.mask, Some(false));
    }
}
