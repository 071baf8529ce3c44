//! Built-in service scanners

pub mod keyvault;
pub mod redis;
pub mod resource;
pub mod storage;

use std::collections::BTreeMap;

use serde::Deserialize;

use azqr_core::domain::{
    RecommendationCategory, RecommendationDefinition, RecommendationImpact, RecommendationType,
};

pub(crate) const CAF_URL: &str =
    "https://learn.microsoft.com/en-us/azure/cloud-adoption-framework/ready/azure-best-practices/resource-abbreviations";
pub(crate) const TAGS_URL: &str =
    "https://learn.microsoft.com/en-us/azure/azure-resource-manager/management/tag-resources?tabs=json";

/// SKU block shared by most ARM resources
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Sku {
    pub name: String,
    pub tier: Option<String>,
    pub family: Option<String>,
    pub capacity: Option<i64>,
}

pub type Tags = BTreeMap<String, String>;

pub(crate) fn definition(
    resource_type: &str,
    id: &str,
    category: RecommendationCategory,
    impact: RecommendationImpact,
    recommendation: &str,
    learn_more_url: &str,
) -> RecommendationDefinition {
    RecommendationDefinition {
        id: id.to_string(),
        resource_type: resource_type.to_string(),
        category,
        recommendation: recommendation.to_string(),
        impact,
        recommendation_type: RecommendationType::Recommendation,
        learn_more_url: learn_more_url.to_string(),
    }
}

/// SLA rules report the SLA string and never count as broken
pub(crate) fn sla_definition(
    resource_type: &str,
    id: &str,
    recommendation: &str,
    learn_more_url: &str,
) -> RecommendationDefinition {
    RecommendationDefinition {
        recommendation_type: RecommendationType::Sla,
        ..definition(
            resource_type,
            id,
            RecommendationCategory::HighAvailability,
            RecommendationImpact::High,
            recommendation,
            learn_more_url,
        )
    }
}

/// Cloud Adoption Framework abbreviation check
pub(crate) fn has_caf_prefix(name: &str, prefix: &str) -> bool {
    name.starts_with(prefix)
}

pub(crate) fn has_tags(tags: &Option<Tags>) -> bool {
    tags.as_ref().is_some_and(|t| !t.is_empty())
}

pub(crate) fn is_tls12(version: Option<&str>) -> bool {
    matches!(version, Some(v) if v.eq_ignore_ascii_case("1.2") || v.eq_ignore_ascii_case("TLS1_2"))
}
