//! Togglable pipeline stages
//!
//! The registry is closed: only the names below can be enabled, disabled or
//! given options.

use std::collections::BTreeMap;

use super::stage_options::OptionValue;

pub const STAGE_GRAPH: &str = "graph";
pub const STAGE_DIAGNOSTICS: &str = "diagnostics";
pub const STAGE_ADVISOR: &str = "advisor";
pub const STAGE_DEFENDER: &str = "defender";
pub const STAGE_DEFENDER_RECOMMENDATIONS: &str = "defender-recommendations";
pub const STAGE_ARC: &str = "arc";
pub const STAGE_POLICY: &str = "policy";
pub const STAGE_COST: &str = "cost";

/// Every known stage with its default enabled flag
pub const STAGE_REGISTRY: [(&str, bool); 8] = [
    (STAGE_GRAPH, true),
    (STAGE_DIAGNOSTICS, true),
    (STAGE_ADVISOR, true),
    (STAGE_DEFENDER, true),
    (STAGE_DEFENDER_RECOMMENDATIONS, false),
    (STAGE_ARC, false),
    (STAGE_POLICY, false),
    (STAGE_COST, false),
];

pub fn is_valid_stage_name(name: &str) -> bool {
    STAGE_REGISTRY.iter().any(|(stage, _)| *stage == name)
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StageConfigError {
    #[error("unknown stage name: {0}")]
    UnknownStage(String),

    #[error("graph stage is mandatory for regular scans and cannot be disabled")]
    GraphStageMandatory,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageConfig {
    pub enabled: bool,
    pub options: BTreeMap<String, OptionValue>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageConfigs {
    stages: BTreeMap<String, StageConfig>,
}

impl StageConfigs {
    /// No stage configured; used by plugin-only scans
    pub fn new() -> Self {
        Self::default()
    }

    /// Every registered stage at its default
    pub fn with_defaults() -> Self {
        let stages = STAGE_REGISTRY
            .iter()
            .map(|(name, enabled)| {
                (
                    name.to_string(),
                    StageConfig {
                        enabled: *enabled,
                        options: BTreeMap::new(),
                    },
                )
            })
            .collect();
        Self { stages }
    }

    pub fn is_stage_enabled(&self, name: &str) -> bool {
        self.stages.get(name).is_some_and(|cfg| cfg.enabled)
    }

    pub fn enable_stage(&mut self, name: &str) -> Result<(), StageConfigError> {
        if !is_valid_stage_name(name) {
            return Err(StageConfigError::UnknownStage(name.to_string()));
        }
        self.stages.entry(name.to_string()).or_default().enabled = true;
        Ok(())
    }

    pub fn disable_stage(&mut self, name: &str) -> Result<(), StageConfigError> {
        if !is_valid_stage_name(name) {
            return Err(StageConfigError::UnknownStage(name.to_string()));
        }
        if let Some(cfg) = self.stages.get_mut(name) {
            cfg.enabled = false;
        }
        Ok(())
    }

    /// Enabled stage names in sorted order
    pub fn enabled_stages(&self) -> Vec<String> {
        self.stages
            .iter()
            .filter(|(_, cfg)| cfg.enabled)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn validate_graph_stage_enabled(&self) -> Result<(), StageConfigError> {
        if self.is_stage_enabled(STAGE_GRAPH) {
            Ok(())
        } else {
            Err(StageConfigError::GraphStageMandatory)
        }
    }

    /// Apply `--stages` values such as `"cost,policy"` or `"-diagnostics"`.
    /// Tokens are comma separated, trimmed and lowercased; a leading `-` disables.
    pub fn configure_stages(&mut self, values: &[String]) -> Result<(), StageConfigError> {
        for value in values {
            for token in value.split(',') {
                let token = token.trim().to_lowercase();
                if token.is_empty() {
                    continue;
                }
                match token.strip_prefix('-') {
                    Some(name) => self.disable_stage(name)?,
                    None => self.enable_stage(&token)?,
                }
            }
        }
        Ok(())
    }

    /// Merge options into a stage without touching its enabled flag
    pub fn set_stage_options(
        &mut self,
        name: &str,
        options: BTreeMap<String, OptionValue>,
    ) -> Result<(), StageConfigError> {
        if !is_valid_stage_name(name) {
            return Err(StageConfigError::UnknownStage(name.to_string()));
        }
        self.stages
            .entry(name.to_string())
            .or_default()
            .options
            .extend(options);
        Ok(())
    }

    pub fn get_options(&self, name: &str) -> Option<&BTreeMap<String, OptionValue>> {
        self.stages.get(name).map(|cfg| &cfg.options)
    }

    /// Typed option lookup
    pub fn get_option(&self, stage: &str, key: &str) -> Option<&OptionValue> {
        self.get_options(stage).and_then(|options| options.get(key))
    }
}
