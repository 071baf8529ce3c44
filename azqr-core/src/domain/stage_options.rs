//! Typed `stage.key=value` options
//!
//! Each stage declares the options it understands with a type and a
//! default. Parsing rejects unknown stages, unknown keys and values that do
//! not match the declared type.

use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;

use super::stage_config::{STAGE_COST, StageConfigError, StageConfigs};

/// Option key for the cost stage
pub const COST_PREVIOUS_MONTH: &str = "previousMonth";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionType {
    Bool,
    Int,
    Float,
    String,
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionType::Bool => write!(f, "bool"),
            OptionType::Int => write!(f, "int"),
            OptionType::Float => write!(f, "float64"),
            OptionType::String => write!(f, "string"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl OptionValue {
    pub fn option_type(&self) -> OptionType {
        match self {
            OptionValue::Bool(_) => OptionType::Bool,
            OptionValue::Int(_) => OptionType::Int,
            OptionValue::Float(_) => OptionType::Float,
            OptionValue::String(_) => OptionType::String,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            OptionValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            OptionValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::String(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionSpec {
    pub option_type: OptionType,
    pub default: OptionValue,
    pub description: &'static str,
}

pub type StageOptions = BTreeMap<String, OptionValue>;

static OPTION_REGISTRY: Lazy<BTreeMap<&'static str, BTreeMap<&'static str, OptionSpec>>> =
    Lazy::new(|| {
        let mut registry = BTreeMap::new();
        registry.insert(
            STAGE_COST,
            BTreeMap::from([(
                COST_PREVIOUS_MONTH,
                OptionSpec {
                    option_type: OptionType::Bool,
                    default: OptionValue::Bool(false),
                    description: "Scan costs for the previous calendar month (UTC) instead of the last three months",
                },
            )]),
        );
        registry
    });

/// Declared options per stage
pub fn option_registry() -> &'static BTreeMap<&'static str, BTreeMap<&'static str, OptionSpec>> {
    &OPTION_REGISTRY
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StageOptionError {
    #[error("stage param must be in the form stage.key=value: {0}")]
    Format(String),

    #[error("unknown stage: {0}")]
    UnknownStage(String),

    #[error("unknown option {key:?} for stage {stage:?}")]
    UnknownOption { stage: String, key: String },

    #[error("invalid value for {stage}.{key}: {message}")]
    InvalidValue {
        stage: String,
        key: String,
        message: String,
    },

    #[error(transparent)]
    Config(#[from] StageConfigError),
}

/// Parse `stage.key=value` strings into typed options grouped by stage.
/// Blank entries are ignored.
pub fn parse_and_validate_stage_params(
    params: &[String],
) -> Result<BTreeMap<String, StageOptions>, StageOptionError> {
    let mut parsed: BTreeMap<String, StageOptions> = BTreeMap::new();

    for param in params {
        let param = param.trim();
        if param.is_empty() {
            continue;
        }

        let (stage_key, raw_value) = param
            .split_once('=')
            .ok_or_else(|| StageOptionError::Format(param.to_string()))?;
        let (stage, key) = stage_key
            .split_once('.')
            .filter(|(stage, key)| !stage.is_empty() && !key.is_empty())
            .ok_or_else(|| StageOptionError::Format(param.to_string()))?;

        let specs = OPTION_REGISTRY
            .get(stage)
            .ok_or_else(|| StageOptionError::UnknownStage(stage.to_string()))?;
        let spec = specs
            .get(key)
            .ok_or_else(|| StageOptionError::UnknownOption {
                stage: stage.to_string(),
                key: key.to_string(),
            })?;

        let value = parse_value(raw_value, spec.option_type).map_err(|message| {
            StageOptionError::InvalidValue {
                stage: stage.to_string(),
                key: key.to_string(),
                message,
            }
        })?;

        parsed
            .entry(stage.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    Ok(parsed)
}

/// Trim whitespace, then surrounding quote characters, then parse by type
pub fn parse_value(raw: &str, option_type: OptionType) -> Result<OptionValue, String> {
    let value = raw.trim().trim_matches(|c| c == '"' || c == '\'');

    match option_type {
        OptionType::Bool => parse_bool(value)
            .map(OptionValue::Bool)
            .ok_or_else(|| format!("expected bool, got {:?}", value)),
        OptionType::Int => value
            .parse::<i64>()
            .map(OptionValue::Int)
            .map_err(|_| format!("expected int, got {:?}", value)),
        OptionType::Float => value
            .parse::<f64>()
            .map(OptionValue::Float)
            .map_err(|_| format!("expected float64, got {:?}", value)),
        OptionType::String => Ok(OptionValue::String(value.to_string())),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

impl StageConfigs {
    /// Parse, validate and merge stage params into these configs
    pub fn apply_stage_params(&mut self, params: &[String]) -> Result<(), StageOptionError> {
        for (stage, options) in parse_and_validate_stage_params(params)? {
            self.set_stage_options(&stage, options)?;
        }
        Ok(())
    }

    /// Option value, falling back to the declared default
    pub fn option_or_default(&self, stage: &str, key: &str) -> Option<OptionValue> {
        self.get_option(stage, key).cloned().or_else(|| {
            OPTION_REGISTRY
                .get(stage)
                .and_then(|specs| specs.get(key))
                .map(|spec| spec.default.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn params(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_cost_previous_month() {
        let parsed = parse_and_validate_stage_params(&params(&["cost.previousMonth=true"])).unwrap();
        assert_eq!(
            parsed["cost"][COST_PREVIOUS_MONTH],
            OptionValue::Bool(true)
        );
    }

    #[rstest]
    #[case("costpreviousMonth=true", "stage param must be in the form stage.key=value: costpreviousMonth=true")]
    #[case("cost.previousMonth", "stage param must be in the form stage.key=value: cost.previousMonth")]
    #[case(".previousMonth=true", "stage param must be in the form stage.key=value: .previousMonth=true")]
    #[case("graph.previousMonth=true", "unknown stage: graph")]
    #[case("cost.nextMonth=true", "unknown option \"nextMonth\" for stage \"cost\"")]
    #[case("cost.previousMonth=yes", "invalid value for cost.previousMonth: expected bool, got \"yes\"")]
    fn test_errors(#[case] input: &str, #[case] expected: &str) {
        let err = parse_and_validate_stage_params(&params(&[input])).unwrap_err();
        assert_eq!(err.to_string(), expected);
    }

    #[rstest]
    #[case(" \"true\" ", true)]
    #[case("'False'", false)]
    #[case("1", true)]
    #[case("F", false)]
    fn test_quotes_and_whitespace(#[case] raw: &str, #[case] expected: bool) {
        assert_eq!(
            parse_value(raw, OptionType::Bool).unwrap(),
            OptionValue::Bool(expected)
        );
    }

    #[test]
    fn test_blank_params_are_ignored() {
        assert!(parse_and_validate_stage_params(&params(&["", "   "]))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_apply_does_not_enable_stage() {
        let mut configs = StageConfigs::with_defaults();
        configs
            .apply_stage_params(&params(&["cost.previousMonth=true"]))
            .unwrap();
        assert!(!configs.is_stage_enabled(STAGE_COST));
        assert_eq!(
            configs.get_option(STAGE_COST, COST_PREVIOUS_MONTH),
            Some(&OptionValue::Bool(true))
        );
    }

    #[test]
    fn test_option_default() {
        let configs = StageConfigs::with_defaults();
        assert_eq!(
            configs.option_or_default(STAGE_COST, COST_PREVIOUS_MONTH),
            Some(OptionValue::Bool(false))
        );
    }

    #[test]
    fn test_other_types() {
        assert_eq!(parse_value("42", OptionType::Int).unwrap(), OptionValue::Int(42));
        assert_eq!(
            parse_value("'1.5'", OptionType::Float).unwrap(),
            OptionValue::Float(1.5)
        );
        assert_eq!(
            parse_value(" \"abc\" ", OptionType::String).unwrap(),
            OptionValue::String("abc".into())
        );
        assert_eq!(
            parse_value("x", OptionType::Int).unwrap_err(),
            "expected int, got \"x\""
        );
    }
}
