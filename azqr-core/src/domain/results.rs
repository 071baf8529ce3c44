//! Result rows produced by the scan stages

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::recommendation::AzqrResult;
use super::resource_id::build_resource_id;

/// Per-resource output of a service scanner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AzqrServiceResult {
    pub subscription_id: String,
    pub subscription_name: String,
    pub resource_group: String,
    pub location: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub service_name: String,
    pub recommendations: BTreeMap<String, AzqrResult>,
}

impl AzqrServiceResult {
    /// Lowercase ARM id rebuilt from the result fields
    pub fn resource_id(&self) -> String {
        build_resource_id(
            &self.subscription_id,
            &self.resource_group,
            &self.resource_type,
            &self.service_name,
        )
    }
}

/// Identity fields extracted from a listed resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub id: String,
    pub name: String,
    pub location: String,
    #[serde(rename = "type")]
    pub resource_type: String,
}

/// A discovered resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub subscription_id: String,
    pub resource_group: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub location: String,
    pub name: String,
    #[serde(default)]
    pub sku_name: String,
    #[serde(default)]
    pub sku_tier: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub sla: String,
}

/// One failing graph recommendation for one resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AprlResult {
    pub recommendation_id: String,
    pub resource_type: String,
    pub recommendation: String,
    pub long_description: String,
    pub potential_benefits: String,
    pub resource_id: String,
    pub subscription_id: String,
    pub subscription_name: String,
    pub resource_group: String,
    pub name: String,
    pub tags: String,
    pub category: String,
    pub impact: String,
    pub learn: String,
    pub param1: String,
    pub param2: String,
    pub param3: String,
    pub param4: String,
    pub param5: String,
    pub automation_available: String,
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceTypeCount {
    #[serde(rename = "Subscription")]
    pub subscription: String,
    #[serde(rename = "Resource Type")]
    pub resource_type: String,
    #[serde(rename = "Number of Resources")]
    pub count: f64,
    #[serde(rename = "Available In APRL?")]
    pub available_in_aprl: String,
    #[serde(rename = "Custom1", default)]
    pub custom1: String,
    #[serde(rename = "Custom2", default)]
    pub custom2: String,
    #[serde(rename = "Custom3", default)]
    pub custom3: String,
}

impl ResourceTypeCount {
    /// Order by subscription, then resource type
    pub fn sort(counts: &mut [ResourceTypeCount]) {
        counts.sort_by(|a, b| {
            (a.subscription.as_str(), a.resource_type.as_str())
                .cmp(&(b.subscription.as_str(), b.resource_type.as_str()))
        });
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisorResult {
    pub recommendation_id: String,
    pub subscription_id: String,
    pub subscription_name: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    pub resource_id: String,
    pub category: String,
    pub impact: String,
    pub description: String,
}

/// Defender plan tier of one subscription
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefenderResult {
    pub subscription_id: String,
    pub subscription_name: String,
    pub name: String,
    pub tier: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefenderRecommendation {
    pub subscription_id: String,
    pub subscription_name: String,
    pub resource_group_name: String,
    pub resource_type: String,
    pub resource_name: String,
    pub category: String,
    pub recommendation_severity: String,
    pub recommendation_name: String,
    pub action_description: String,
    pub remediation_description: String,
    pub az_portal_link: String,
    pub resource_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzurePolicyResult {
    pub subscription_id: String,
    pub subscription_name: String,
    pub resource_group: String,
    pub resource_type: String,
    pub resource_name: String,
    pub policy_display_name: String,
    pub policy_description: String,
    pub resource_id: String,
    pub time_stamp: String,
    pub policy_definition_name: String,
    pub policy_definition_id: String,
    pub policy_assignment_name: String,
    pub policy_assignment_id: String,
    pub compliance_state: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArcSqlResult {
    pub subscription_id: String,
    pub subscription_name: String,
    pub status: String,
    pub azure_arc_server: String,
    pub sql_instance: String,
    pub resource_group: String,
    pub version: String,
    pub build: String,
    pub patch_level: String,
    pub edition: String,
    pub vcores: String,
    pub license: String,
    pub dpsa_status: String,
    pub telemetry_status: String,
    pub defender_status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostResultItem {
    pub subscription_id: String,
    pub subscription_name: String,
    pub service_name: String,
    pub value: String,
    pub currency: String,
}

/// Cost aggregate over a date range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostResult {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub items: Vec<CostResultItem>,
}

impl Default for CostResult {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            from: now,
            to: now,
            items: Vec::new(),
        }
    }
}
