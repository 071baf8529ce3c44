//! Microsoft Defender for Cloud plans and unhealthy assessments

use std::collections::BTreeMap;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use azqr_core::domain::{
    DefenderRecommendation, DefenderResult, Filters, ScanError, ScannerConfig,
    mask_subscription_id,
};
use azqr_core::infrastructure::graph::GraphQuery;
use azqr_core::infrastructure::http::ClientError;

use crate::arm::ArmClient;
use crate::rows::{field, subscription_ids};

const PRICINGS_API_VERSION: &str = "2024-01-01";
const NOT_REGISTERED: &str = "Subscription Not Registered";

const RECOMMENDATIONS_QUERY: &str = "SecurityResources \
    | where type == 'microsoft.security/assessments' \
    | where properties.status.code == 'Unhealthy' \
    | mvexpand Category = properties.metadata.categories \
    | extend \
        ResourceId = properties.resourceDetails.Id, \
        ResourceIdsplit = split(properties.resourceDetails.Id, '/'), \
        RecommendationName = properties.displayName, \
        ActionDescription = properties.metadata.description, \
        RemediationDescription = properties.metadata.remediationDescription, \
        RecommendationSeverity = properties.metadata.severity, \
        AzPortalLink = tostring(properties.links.azurePortal) \
    | extend \
        ResourceGroupName = tostring(ResourceIdsplit[4]), \
        ResourceType = tostring(ResourceIdsplit[6]), \
        ResourceName = tostring(ResourceIdsplit[8]) \
    | join kind=leftouter (resourcecontainers \
        | where type == 'microsoft.resources/subscriptions' \
        | project SubscriptionName = name, subscriptionId) on subscriptionId \
    | project SubscriptionId = subscriptionId, SubscriptionName, ResourceGroupName, ResourceType, \
        ResourceName, Category, RecommendationSeverity, RecommendationName, ActionDescription, \
        RemediationDescription, AzPortalLink, ResourceId";

#[derive(Debug, Deserialize)]
struct Pricing {
    #[serde(default)]
    name: String,
    #[serde(default)]
    properties: PricingProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PricingProperties {
    #[serde(default)]
    pricing_tier: String,
}

/// Defender plan tiers of one subscription
#[derive(Debug, Clone)]
pub struct DefenderScanner {
    client: ArmClient,
    subscription_name: String,
}

impl DefenderScanner {
    pub fn new(config: &ScannerConfig) -> Result<Self, ScanError> {
        Ok(Self {
            client: ArmClient::new(config)?,
            subscription_name: config.subscription_name.clone(),
        })
    }

    /// Pricing tier of every plan; an unregistered subscription yields none
    pub async fn list_configuration(&self) -> Result<Vec<DefenderResult>, ScanError> {
        let subscription_id = self.client.subscription_id();
        info!(
            subscription = %mask_subscription_id(subscription_id),
            "Scanning subscription for Defender Status"
        );

        let pricings: Vec<Pricing> = match self
            .client
            .list("Microsoft.Security/pricings", PRICINGS_API_VERSION)
            .await
        {
            Ok(pricings) => pricings,
            Err(err) if is_not_registered(&err) => {
                info!("Subscription Not Registered for Defender. Skipping Defender Scan...");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };

        Ok(pricings
            .into_iter()
            .map(|p| DefenderResult {
                subscription_id: subscription_id.to_string(),
                subscription_name: self.subscription_name.clone(),
                name: p.name,
                tier: p.properties.pricing_tier,
            })
            .collect())
    }
}

fn is_not_registered(err: &ClientError) -> bool {
    err.to_string().contains(NOT_REGISTERED)
}

/// Unhealthy Defender assessments, one row per assessment category
pub async fn list_defender_recommendations(
    graph: &dyn GraphQuery,
    subscriptions: &BTreeMap<String, String>,
    filters: &Filters,
    cancel: &CancellationToken,
) -> Result<Vec<DefenderRecommendation>, ClientError> {
    info!("Scanning Defender Recommendations");
    let result = graph
        .query(RECOMMENDATIONS_QUERY, &subscription_ids(subscriptions), cancel)
        .await?;

    let recommendations: Vec<DefenderRecommendation> = result
        .data
        .iter()
        .filter(|row| !filters.is_service_excluded(&field(row, "ResourceId")))
        .map(|row| DefenderRecommendation {
            subscription_id: field(row, "SubscriptionId"),
            subscription_name: field(row, "SubscriptionName"),
            resource_group_name: field(row, "ResourceGroupName"),
            resource_type: field(row, "ResourceType"),
            resource_name: field(row, "ResourceName"),
            category: field(row, "Category"),
            recommendation_severity: field(row, "RecommendationSeverity"),
            recommendation_name: field(row, "RecommendationName"),
            action_description: field(row, "ActionDescription"),
            remediation_description: field(row, "RemediationDescription"),
            az_portal_link: portal_link(&field(row, "AzPortalLink")),
            resource_id: field(row, "ResourceId"),
        })
        .collect();

    debug!(count = recommendations.len(), "Defender recommendations collected");
    Ok(recommendations)
}

fn portal_link(link: &str) -> String {
    if link.is_empty() || link.starts_with("https://") {
        link.to_string()
    } else {
        format!("https://{link}")
    }
}
