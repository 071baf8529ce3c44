//! Recommendation rules and the engine that evaluates them
//!
//! A rule pairs static metadata with an `eval` closure over one concrete
//! resource shape. Scanners own their rules; the engine only reads them.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::scanner::RuleContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecommendationCategory {
    BusinessContinuity,
    DisasterRecovery,
    Governance,
    HighAvailability,
    MonitoringAndAlerting,
    OtherBestPractices,
    Scalability,
    Security,
    ServiceUpgradeAndRetirement,
    #[serde(rename = "SLA")]
    Sla,
}

impl RecommendationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BusinessContinuity => "BusinessContinuity",
            Self::DisasterRecovery => "DisasterRecovery",
            Self::Governance => "Governance",
            Self::HighAvailability => "HighAvailability",
            Self::MonitoringAndAlerting => "MonitoringAndAlerting",
            Self::OtherBestPractices => "OtherBestPractices",
            Self::Scalability => "Scalability",
            Self::Security => "Security",
            Self::ServiceUpgradeAndRetirement => "ServiceUpgradeAndRetirement",
            Self::Sla => "SLA",
        }
    }
}

impl fmt::Display for RecommendationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecommendationImpact {
    High,
    Medium,
    Low,
}

impl RecommendationImpact {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }

    /// Case-insensitive parse; unknown values map to `None`
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

impl fmt::Display for RecommendationImpact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RecommendationType {
    #[default]
    Recommendation,
    #[serde(rename = "SLA")]
    Sla,
}

/// Rule metadata without the evaluation closure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationDefinition {
    pub id: String,
    pub resource_type: String,
    pub category: RecommendationCategory,
    pub recommendation: String,
    pub impact: RecommendationImpact,
    pub recommendation_type: RecommendationType,
    pub learn_more_url: String,
}

impl RecommendationDefinition {
    /// Catalog entry for the report
    pub fn to_aprl_recommendation(&self) -> AprlRecommendation {
        AprlRecommendation {
            recommendation_id: self.id.clone(),
            recommendation: self.recommendation.clone(),
            category: self.category.as_str().to_string(),
            impact: self.impact.as_str().to_string(),
            resource_type: self.resource_type.clone(),
            long_description: self.recommendation.clone(),
            learn_more_link: vec![LearnMoreLink {
                name: "Learn More".to_string(),
                url: self.learn_more_url.clone(),
            }],
            source: "AZQR".to_string(),
            ..AprlRecommendation::default()
        }
    }
}

/// `(resource, context) -> (broken, detail)`
pub type EvalFn<R> = Arc<dyn Fn(&R, &RuleContext) -> (bool, String) + Send + Sync>;

/// A rule evaluated against resources of shape `R`
pub struct AzqrRecommendation<R> {
    pub definition: RecommendationDefinition,
    pub eval: EvalFn<R>,
}

impl<R> AzqrRecommendation<R> {
    pub fn new<F>(definition: RecommendationDefinition, eval: F) -> Self
    where
        F: Fn(&R, &RuleContext) -> (bool, String) + Send + Sync + 'static,
    {
        Self {
            definition,
            eval: Arc::new(eval),
        }
    }

    pub fn id(&self) -> &str {
        &self.definition.id
    }
}

impl<R> Clone for AzqrRecommendation<R> {
    fn clone(&self) -> Self {
        Self {
            definition: self.definition.clone(),
            eval: Arc::clone(&self.eval),
        }
    }
}

impl<R> fmt::Debug for AzqrRecommendation<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzqrRecommendation")
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}

/// Rule set keyed by rule id
pub type RuleSet<R> = BTreeMap<String, AzqrRecommendation<R>>;

/// Outcome of one rule against one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AzqrResult {
    pub recommendation_id: String,
    pub resource_type: String,
    pub recommendation: String,
    pub category: RecommendationCategory,
    pub impact: RecommendationImpact,
    pub recommendation_type: RecommendationType,
    pub learn_more_url: String,
    pub not_compliant: bool,
    /// Detail string; the asserted SLA for SLA rules
    pub result: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnMoreLink {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
}

/// Declarative graph recommendation, as found in recommendation YAML files
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AprlRecommendation {
    #[serde(rename = "aprlGuid")]
    pub recommendation_id: String,
    #[serde(rename = "description", default)]
    pub recommendation: String,
    #[serde(rename = "recommendationControl", default)]
    pub category: String,
    #[serde(rename = "recommendationImpact", default)]
    pub impact: String,
    #[serde(rename = "recommendationResourceType", default)]
    pub resource_type: String,
    #[serde(rename = "recommendationMetadataState", default)]
    pub metadata_state: String,
    #[serde(rename = "longDescription", default)]
    pub long_description: String,
    #[serde(rename = "potentialBenefits", default)]
    pub potential_benefits: String,
    #[serde(rename = "pgVerified", default)]
    pub pg_verified: bool,
    #[serde(rename = "automationAvailable", default, deserialize_with = "string_or_bool")]
    pub automation_available: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(rename = "graphQuery", default, skip_serializing_if = "String::is_empty")]
    pub graph_query: String,
    #[serde(rename = "learnMoreLink", default)]
    pub learn_more_link: Vec<LearnMoreLink>,
    #[serde(default)]
    pub source: String,
}

fn string_or_bool<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Bool(value)) => value.to_string(),
        Some(Raw::Text(value)) => value,
        None => String::new(),
    })
}

impl AprlRecommendation {
    /// First learn-more URL, if any
    pub fn learn_more_url(&self) -> &str {
        self.learn_more_link
            .first()
            .map(|link| link.url.as_str())
            .unwrap_or_default()
    }
}

/// Evaluates rule sets against single resources
#[derive(Debug, Default, Clone, Copy)]
pub struct RecommendationEngine;

impl RecommendationEngine {
    /// Evaluate every rule not excluded by the filters
    pub fn evaluate_recommendations<R>(
        &self,
        rules: &RuleSet<R>,
        target: &R,
        ctx: &RuleContext,
    ) -> BTreeMap<String, AzqrResult> {
        rules
            .iter()
            .filter(|(_, rule)| !ctx.filters.is_recommendation_excluded(rule.id()))
            .map(|(key, rule)| (key.clone(), Self::evaluate(rule, target, ctx)))
            .collect()
    }

    fn evaluate<R>(rule: &AzqrRecommendation<R>, target: &R, ctx: &RuleContext) -> AzqrResult {
        let (broken, detail) = (rule.eval)(target, ctx);
        let definition = &rule.definition;

        AzqrResult {
            recommendation_id: definition.id.clone(),
            resource_type: definition.resource_type.clone(),
            recommendation: definition.recommendation.clone(),
            category: definition.category,
            impact: definition.impact,
            recommendation_type: definition.recommendation_type,
            learn_more_url: definition.learn_more_url.clone(),
            not_compliant: broken,
            result: detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::filters::Filters;

    struct Cache {
        tls: &'static str,
        zones: usize,
    }

    fn definition(id: &str, kind: RecommendationType) -> RecommendationDefinition {
        RecommendationDefinition {
            id: id.to_string(),
            resource_type: "Microsoft.Cache/Redis".to_string(),
            category: if kind == RecommendationType::Sla {
                RecommendationCategory::HighAvailability
            } else {
                RecommendationCategory::Security
            },
            recommendation: format!("rule {}", id),
            impact: RecommendationImpact::High,
            recommendation_type: kind,
            learn_more_url: "https://learn.microsoft.com".to_string(),
        }
    }

    fn rules() -> RuleSet<Cache> {
        let mut rules = RuleSet::new();
        rules.insert(
            "redis-001".into(),
            AzqrRecommendation::new(
                definition("redis-001", RecommendationType::Recommendation),
                |c: &Cache, _ctx: &RuleContext| (c.tls != "1.2", String::new()),
            ),
        );
        rules.insert(
            "redis-002".into(),
            AzqrRecommendation::new(
                definition("redis-002", RecommendationType::Sla),
                |c: &Cache, _ctx: &RuleContext| {
                    let sla = if c.zones > 1 { "99.99%" } else { "99.9%" };
                    (false, sla.to_string())
                },
            ),
        );
        rules
    }

    #[test]
    fn test_evaluates_every_rule() {
        let ctx = RuleContext::new(Filters::default());
        let results = RecommendationEngine.evaluate_recommendations(
            &rules(),
            &Cache {
                tls: "1.0",
                zones: 3,
            },
            &ctx,
        );
        assert_eq!(results.len(), 2);
        assert!(results["redis-001"].not_compliant);
        assert!(!results["redis-002"].not_compliant);
        assert_eq!(results["redis-002"].result, "99.99%");
        assert_eq!(
            results["redis-002"].recommendation_type,
            RecommendationType::Sla
        );
    }

    #[test]
    fn test_excluded_rules_are_skipped() {
        let mut filters = Filters::default();
        filters.exclude_recommendation("REDIS-001");
        let ctx = RuleContext::new(filters);

        let results = RecommendationEngine.evaluate_recommendations(
            &rules(),
            &Cache {
                tls: "1.2",
                zones: 1,
            },
            &ctx,
        );
        assert!(!results.contains_key("redis-001"));
        assert_eq!(results["redis-002"].result, "99.9%");
    }

    #[test]
    fn test_aprl_yaml_shape() {
        let yaml = r#"
aprlGuid: 0a1b2c3d
description: Enable zone redundancy
recommendationControl: HighAvailability
recommendationImpact: High
recommendationResourceType: Microsoft.Cache/Redis
recommendationMetadataState: Active
pgVerified: true
automationAvailable: true
tags: [resiliency]
learnMoreLink:
  - name: Docs
    url: https://example.test/docs
"#;
        let rec: AprlRecommendation = serde_yml::from_str(yaml).unwrap();
        assert_eq!(rec.recommendation_id, "0a1b2c3d");
        assert_eq!(rec.automation_available, "true");
        assert!(rec.pg_verified);
        assert_eq!(rec.learn_more_url(), "https://example.test/docs");
    }

    #[test]
    fn test_definition_to_catalog_entry() {
        let entry = definition("redis-001", RecommendationType::Recommendation)
            .to_aprl_recommendation();
        assert_eq!(entry.source, "AZQR");
        assert_eq!(entry.category, "Security");
        assert_eq!(entry.learn_more_url(), "https://learn.microsoft.com");
    }
}
