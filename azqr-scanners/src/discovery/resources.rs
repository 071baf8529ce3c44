//! Resource inventory through Resource Graph

use std::collections::{BTreeMap, HashMap, HashSet};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use azqr_core::domain::{Filters, Resource, ResourceTypeCount};
use azqr_core::infrastructure::graph::GraphQuery;
use azqr_core::infrastructure::http::ClientError;

use crate::graph::RecommendationCatalog;
use crate::rows::{field, number, subscription_ids};

/// Spreadsheet row limit minus header rows
pub const EXCEL_MAX_ROWS: usize = 1_048_566;

const RESOURCES_QUERY: &str = "resources \
    | project id, subscriptionId, resourceGroup, location, type, name, \
    skuName = tostring(sku.name), skuTier = tostring(sku.tier), kind";

const TYPE_COUNT_QUERY: &str =
    "resources | summarize count() by subscriptionId, type | order by subscriptionId, type";

const PRIVATE_ENDPOINTS_QUERY: &str = "resources \
    | where type =~ 'Microsoft.Network/privateEndpoints' \
    | mv-expand connection = properties.privateLinkServiceConnections \
    | project id = tolower(tostring(connection.properties.privateLinkServiceId))";

/// Resource count for one subscription and type
#[derive(Debug, Clone, PartialEq)]
pub struct TypeCount {
    pub subscription_id: String,
    pub resource_type: String,
    pub count: f64,
}

/// Every resource, split into in-scope and excluded
pub async fn list_resources(
    graph: &dyn GraphQuery,
    subscriptions: &BTreeMap<String, String>,
    filters: &Filters,
    cancel: &CancellationToken,
) -> Result<(Vec<Resource>, Vec<Resource>), ClientError> {
    let result = graph
        .query(RESOURCES_QUERY, &subscription_ids(subscriptions), cancel)
        .await?;

    let (excluded, resources): (Vec<Resource>, Vec<Resource>) = result
        .data
        .iter()
        .map(|row| Resource {
            id: field(row, "id"),
            subscription_id: field(row, "subscriptionId"),
            resource_group: field(row, "resourceGroup"),
            resource_type: field(row, "type"),
            location: field(row, "location"),
            name: field(row, "name"),
            sku_name: field(row, "skuName"),
            sku_tier: field(row, "skuTier"),
            kind: field(row, "kind"),
            sla: String::new(),
        })
        .partition(|r| filters.is_resource_excluded(&r.id));

    debug!(
        resources = resources.len(),
        excluded = excluded.len(),
        "Resources discovered"
    );
    Ok((resources, excluded))
}

/// Resource counts grouped by subscription and type
pub async fn query_type_counts(
    graph: &dyn GraphQuery,
    subscriptions: &BTreeMap<String, String>,
    cancel: &CancellationToken,
) -> Result<Vec<TypeCount>, ClientError> {
    let result = graph
        .query(TYPE_COUNT_QUERY, &subscription_ids(subscriptions), cancel)
        .await?;

    Ok(result
        .data
        .iter()
        .map(|row| TypeCount {
            subscription_id: field(row, "subscriptionId"),
            resource_type: field(row, "type"),
            count: number(row, "count_").unwrap_or_default(),
        })
        .collect())
}

/// Totals across subscriptions, keyed by lowercase type
pub fn count_by_type(counts: &[TypeCount]) -> HashMap<String, f64> {
    let mut totals = HashMap::new();
    for c in counts {
        *totals.entry(c.resource_type.to_lowercase()).or_insert(0.0) += c.count;
    }
    totals
}

/// Lowercase subscription id, then lowercase type
pub fn count_by_subscription(counts: &[TypeCount]) -> HashMap<String, HashMap<String, f64>> {
    let mut by_subscription: HashMap<String, HashMap<String, f64>> = HashMap::new();
    for c in counts {
        *by_subscription
            .entry(c.subscription_id.to_lowercase())
            .or_default()
            .entry(c.resource_type.to_lowercase())
            .or_insert(0.0) += c.count;
    }
    by_subscription
}

/// Report rows, marking the types the catalog has recommendations for
pub fn to_report_counts(
    counts: &[TypeCount],
    subscriptions: &BTreeMap<String, String>,
    catalog: &RecommendationCatalog,
) -> Vec<ResourceTypeCount> {
    let mut rows: Vec<ResourceTypeCount> = counts
        .iter()
        .map(|c| ResourceTypeCount {
            subscription: subscriptions
                .get(&c.subscription_id)
                .cloned()
                .unwrap_or_default(),
            resource_type: c.resource_type.clone(),
            count: c.count,
            available_in_aprl: if catalog.contains_key(&c.resource_type.to_lowercase()) {
                "Yes".to_string()
            } else {
                "No".to_string()
            },
            ..Default::default()
        })
        .collect();
    ResourceTypeCount::sort(&mut rows);
    rows
}

/// Lowercase ids of resources that a private endpoint connects to
pub async fn list_private_endpoint_targets(
    graph: &dyn GraphQuery,
    subscriptions: &BTreeMap<String, String>,
    cancel: &CancellationToken,
) -> Result<HashSet<String>, ClientError> {
    let result = graph
        .query(PRIVATE_ENDPOINTS_QUERY, &subscription_ids(subscriptions), cancel)
        .await?;

    Ok(result
        .data
        .iter()
        .map(|row| field(row, "id").to_lowercase())
        .filter(|id| !id.is_empty())
        .collect())
}
