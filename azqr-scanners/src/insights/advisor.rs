//! Azure Advisor recommendations

use std::collections::{BTreeMap, HashSet};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use azqr_core::domain::{AdvisorResult, Filters};
use azqr_core::infrastructure::graph::GraphQuery;
use azqr_core::infrastructure::http::ClientError;

use crate::rows::{field, subscription_ids};

const ADVISOR_QUERY: &str = "AdvisorResources \
    | join kind=inner ( \
        resourcecontainers \
        | where type == 'microsoft.resources/subscriptions' \
        | project subscriptionId, subscriptionName = name) \
    on subscriptionId \
    | project Type = type, SubscriptionId = subscriptionId, SubscriptionName = subscriptionName, \
        ResourceGroup = resourceGroup, Category = properties.category, Impact = properties.impact, \
        ImpactedField = properties.impactedField, ImpactedValue = properties.impactedValue, \
        Problem = properties.shortDescription.problem, \
        ResourceId = properties.resourceMetadata.resourceId, \
        RecommendationTypeId = properties.recommendationTypeId";

/// Advisor recommendations, deduplicated by resource, recommendation type and category
pub async fn list_advisor_recommendations(
    graph: &dyn GraphQuery,
    subscriptions: &BTreeMap<String, String>,
    filters: &Filters,
    cancel: &CancellationToken,
) -> Result<Vec<AdvisorResult>, ClientError> {
    info!("Scanning Advisor Recommendations");
    let result = graph
        .query(ADVISOR_QUERY, &subscription_ids(subscriptions), cancel)
        .await?;

    let mut seen = HashSet::new();
    let mut recommendations = Vec::new();

    for row in &result.data {
        if filters.is_subscription_excluded(&field(row, "SubscriptionId")) {
            continue;
        }
        let resource_id = field(row, "ResourceId");
        if filters.is_service_excluded(&resource_id) {
            continue;
        }

        let recommendation = AdvisorResult {
            recommendation_id: field(row, "RecommendationTypeId"),
            subscription_id: field(row, "SubscriptionId"),
            subscription_name: field(row, "SubscriptionName"),
            resource_type: field(row, "ImpactedField"),
            name: field(row, "ImpactedValue"),
            resource_id,
            category: field(row, "Category"),
            impact: field(row, "Impact"),
            description: field(row, "Problem"),
        };

        let key = (
            recommendation.resource_id.clone(),
            recommendation.recommendation_id.clone(),
            recommendation.category.clone(),
        );
        if seen.insert(key) {
            recommendations.push(recommendation);
        }
    }

    debug!(count = recommendations.len(), "Advisor recommendations collected");
    Ok(recommendations)
}
