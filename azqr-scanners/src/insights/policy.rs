//! Non-compliant Azure Policy states

use std::collections::{BTreeMap, HashSet};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use azqr_core::domain::{
    AzurePolicyResult, Filters, resource_group_from_resource_id, resource_name_from_resource_id,
    resource_type_from_resource_id,
};
use azqr_core::infrastructure::graph::GraphQuery;
use azqr_core::infrastructure::http::ClientError;

use crate::rows::{field, subscription_ids};

const POLICY_QUERY: &str = "PolicyResources \
    | where type == 'microsoft.policyinsights/policystates' \
    | extend \
        resourceId = tostring(properties.resourceId), \
        subscriptionId = tostring(properties.subscriptionId), \
        policyAssignmentId = tostring(properties.policyAssignmentId), \
        policyAssignmentName = tostring(properties.policyAssignmentName), \
        policyDefinitionId = tostring(properties.policyDefinitionId), \
        policyDefinitionName = tostring(properties.policyDefinitionName), \
        timestamp = todatetime(properties.timestamp), \
        complianceState = tostring(properties.complianceState) \
    | where complianceState == 'NonCompliant' \
    | join kind=leftouter ( \
        PolicyResources \
        | where type == 'microsoft.authorization/policydefinitions' \
        | extend policyDefinitionId = tolower(id) \
        | project policyDefinitionId, policyDescription = tostring(properties.description), \
            policyDefinitionDisplayName = properties.displayName \
    ) on policyDefinitionId \
    | join kind=leftouter ( \
        ResourceContainers \
        | where type == 'microsoft.resources/subscriptions' \
        | project subscriptionId = tolower(subscriptionId), subscriptionName = name \
    ) on subscriptionId \
    | project subscriptionId, subscriptionName, resourceId, policyAssignmentId, \
        policyAssignmentName, policyDefinitionId, policyDefinitionName, timestamp, \
        policyDefinitionDisplayName, policyDescription, complianceState";

/// Non-compliant resources, deduplicated by resource and policy definition
pub async fn list_policy_states(
    graph: &dyn GraphQuery,
    subscriptions: &BTreeMap<String, String>,
    filters: &Filters,
    cancel: &CancellationToken,
) -> Result<Vec<AzurePolicyResult>, ClientError> {
    info!("Scanning Azure Policy");
    let result = graph
        .query(POLICY_QUERY, &subscription_ids(subscriptions), cancel)
        .await?;

    let mut seen = HashSet::new();
    let mut states = Vec::new();

    for row in &result.data {
        if filters.is_subscription_excluded(&field(row, "subscriptionId")) {
            continue;
        }
        let resource_id = field(row, "resourceId");
        if filters.is_service_excluded(&resource_id) {
            continue;
        }

        let policy_definition_id = field(row, "policyDefinitionId");
        if !seen.insert((resource_id.clone(), policy_definition_id.clone())) {
            continue;
        }

        states.push(AzurePolicyResult {
            subscription_id: field(row, "subscriptionId"),
            subscription_name: field(row, "subscriptionName"),
            resource_group: resource_group_from_resource_id(&resource_id),
            resource_type: resource_type_from_resource_id(&resource_id),
            resource_name: resource_name_from_resource_id(&resource_id),
            policy_display_name: field(row, "policyDefinitionDisplayName"),
            policy_description: field(row, "policyDescription"),
            time_stamp: field(row, "timestamp"),
            policy_definition_name: field(row, "policyDefinitionName"),
            policy_definition_id,
            policy_assignment_name: field(row, "policyAssignmentName"),
            policy_assignment_id: field(row, "policyAssignmentId"),
            compliance_state: field(row, "complianceState"),
            resource_id,
        });
    }

    debug!(count = states.len(), "Policy states collected");
    Ok(states)
}
