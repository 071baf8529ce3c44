//! Diagnostic settings lookup through ARM batch requests

use std::collections::{BTreeMap, HashSet};

use futures::{StreamExt, TryStreamExt, stream};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use azqr_core::domain::{
    AprlRecommendation, AprlResult, RecommendationCategory, RecommendationDefinition,
    RecommendationImpact, RecommendationType, Resource,
};
use azqr_core::infrastructure::client_options::ClientOptions;
use azqr_core::infrastructure::credential::SharedCredential;
use azqr_core::infrastructure::http::{ClientError, HttpClient};

const BATCH_API_VERSION: &str = "2020-06-01";
const DIAGNOSTIC_SETTINGS_API_VERSION: &str = "2021-05-01-preview";
const SETTINGS_MARKER: &str = "/providers/microsoft.insights/diagnosticsettings/";
const MAX_BATCH_SIZE: usize = 20;
const MAX_WORKERS: usize = 30;
const LARGE_SCAN_THRESHOLD: usize = 5_000;

pub const DIAGNOSTIC_SETTINGS_RECOMMENDATION_ID: &str = "diag-001";
const DIAGNOSTIC_SETTINGS_URL: &str =
    "https://learn.microsoft.com/azure/azure-monitor/essentials/diagnostic-settings";

/// Lowercase types that accept diagnostic settings
const SUPPORTED_TYPES: [&str; 71] = [
    "microsoft.analysisservices/servers",
    "microsoft.app/containerapps",
    "microsoft.app/managedenvironments",
    "microsoft.appconfiguration/configurationstores",
    "microsoft.automation/automationaccounts",
    "microsoft.batch/batchaccounts",
    "microsoft.cache/redis",
    "microsoft.cdn/profiles",
    "microsoft.cognitiveservices/accounts",
    "microsoft.compute/availabilitysets",
    "microsoft.compute/disks",
    "microsoft.compute/galleries",
    "microsoft.compute/virtualmachines",
    "microsoft.compute/virtualmachinescalesets",
    "microsoft.containerinstance/containergroups",
    "microsoft.containerregistry/registries",
    "microsoft.containerservice/managedclusters",
    "microsoft.dashboard/grafana",
    "microsoft.databricks/workspaces",
    "microsoft.datafactory/factories",
    "microsoft.dbformysql/flexibleservers",
    "microsoft.dbformysql/servers",
    "microsoft.dbforpostgresql/flexibleservers",
    "microsoft.dbforpostgresql/servers",
    "microsoft.devices/iothubs",
    "microsoft.documentdb/databaseaccounts",
    "microsoft.eventgrid/domains",
    "microsoft.eventhub/namespaces",
    "microsoft.insights/components",
    "microsoft.keyvault/vaults",
    "microsoft.kusto/clusters",
    "microsoft.logic/workflows",
    "microsoft.machinelearningservices/workspaces",
    "microsoft.network/applicationgateways",
    "microsoft.network/azurefirewalls",
    "microsoft.network/connections",
    "microsoft.network/frontdoorwebapplicationfirewallpolicies",
    "microsoft.network/ipgroups",
    "microsoft.network/loadbalancers",
    "microsoft.network/natgateways",
    "microsoft.network/networkinterfaces",
    "microsoft.network/networksecuritygroups",
    "microsoft.network/networkwatchers",
    "microsoft.network/privatednszones",
    "microsoft.network/privateendpoints",
    "microsoft.network/publicipaddresses",
    "microsoft.network/routetables",
    "microsoft.network/trafficmanagerprofiles",
    "microsoft.network/virtualnetworkgateways",
    "microsoft.network/virtualnetworks",
    "microsoft.network/virtualnetworks/subnets",
    "microsoft.network/virtualwans",
    "microsoft.operationalinsights/workspaces",
    "microsoft.recoveryservices/vaults",
    "microsoft.resources/resourcegroups",
    "microsoft.search/searchservices",
    "microsoft.servicebus/namespaces",
    "microsoft.signalrservice/signalr",
    "microsoft.signalrservice/webpubsub",
    "microsoft.sql/servers",
    "microsoft.sql/servers/databases",
    "microsoft.sql/servers/elasticpools",
    "microsoft.storage/storageaccounts",
    "microsoft.virtualmachineimages/imagetemplates",
    "microsoft.web/certificates",
    "microsoft.web/connections",
    "microsoft.web/serverfarms",
    "microsoft.web/sites",
    "specialized.workload/avd",
    "specialized.workload/hpc",
    "specialized.workload/sap",
];

pub fn supports_diagnostic_settings(resource_type: &str) -> bool {
    SUPPORTED_TYPES.contains(&resource_type.to_lowercase().as_str())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchRequestItem {
    http_method: &'static str,
    relative_url: String,
}

#[derive(Debug, Serialize)]
struct BatchRequest {
    requests: Vec<BatchRequestItem>,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    #[serde(default)]
    responses: Vec<BatchResponseItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchResponseItem {
    #[serde(default)]
    http_status_code: u16,
    #[serde(default)]
    content: Value,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsCollection {
    #[serde(default)]
    value: Vec<Setting>,
}

#[derive(Debug, Deserialize)]
struct Setting {
    #[serde(default)]
    id: String,
}

/// Lowercase id of the resource a diagnostic setting belongs to
fn owner_of_setting(setting_id: &str) -> Option<String> {
    let lower = setting_id.to_lowercase();
    lower.find(SETTINGS_MARKER).map(|i| lower[..i].to_string())
}

/// Looks up diagnostic settings for many resources at once
#[derive(Debug, Clone)]
pub struct DiagnosticSettingsScanner {
    http: HttpClient,
    batch_url: String,
    batch_size: usize,
}

impl DiagnosticSettingsScanner {
    pub fn new(
        options: &ClientOptions,
        credential: Option<SharedCredential>,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            http: HttpClient::new(options, credential)?,
            batch_url: format!(
                "{}/batch?api-version={}",
                options.resource_manager_endpoint(),
                BATCH_API_VERSION
            ),
            batch_size: MAX_BATCH_SIZE,
        })
    }

    /// Resource ids per batch request, at most 20
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        self
    }

    /// Lowercase ids of supported resources that have at least one setting
    pub async fn list_resources_with_diagnostic_settings(
        &self,
        resources: &[Resource],
        cancel: &CancellationToken,
    ) -> Result<HashSet<String>, ClientError> {
        let ids: Vec<&str> = resources
            .iter()
            .filter(|r| supports_diagnostic_settings(&r.resource_type))
            .map(|r| r.id.as_str())
            .collect();

        if ids.is_empty() {
            debug!("No resources found to scan for diagnostic settings");
            return Ok(HashSet::new());
        }
        if ids.len() > LARGE_SCAN_THRESHOLD {
            warn!(
                resources = ids.len(),
                "Large number of resources detected. Scan will take longer than usual"
            );
        }

        let batches: Vec<&[&str]> = ids.chunks(self.batch_size).collect();
        let workers = batches.len().min(MAX_WORKERS);
        info!(batches = batches.len(), workers, "Scanning Diagnostic Settings");

        let queries: Vec<_> = batches
            .into_iter()
            .map(|batch| self.query_batch(batch, cancel))
            .collect();
        let found: Vec<HashSet<String>> = stream::iter(queries)
            .buffer_unordered(workers)
            .try_collect()
            .await?;

        Ok(found.into_iter().flatten().collect())
    }

    /// Same as [`Self::list_resources_with_diagnostic_settings`], with
    /// skippable failures treated as no settings found
    pub async fn scan(
        &self,
        resources: &[Resource],
        cancel: &CancellationToken,
    ) -> Result<HashSet<String>, ClientError> {
        match self
            .list_resources_with_diagnostic_settings(resources, cancel)
            .await
        {
            Err(err) if err.is_skippable() => {
                debug!(error = %err, "Diagnostic settings lookup skipped");
                Ok(HashSet::new())
            }
            other => other,
        }
    }

    async fn query_batch(
        &self,
        ids: &[&str],
        cancel: &CancellationToken,
    ) -> Result<HashSet<String>, ClientError> {
        let request = BatchRequest {
            requests: ids
                .iter()
                .map(|id| BatchRequestItem {
                    http_method: "GET",
                    relative_url: format!(
                        "{id}/providers/microsoft.insights/diagnosticSettings?api-version={DIAGNOSTIC_SETTINGS_API_VERSION}"
                    ),
                })
                .collect(),
        };
        let body = serde_json::to_value(&request).map_err(|e| ClientError::Decode {
            url: self.batch_url.clone(),
            message: e.to_string(),
        })?;

        let response = self.http.post(&self.batch_url, &body, cancel).await?;
        if let Some(quota) = response.header("x-ms-ratelimit-remaining-tenant-reads") {
            debug!(quota, "ARM batch remaining quota");
        }
        let batch: BatchResponse = response.json(&self.batch_url)?;

        let mut owners = HashSet::new();
        for item in batch.responses.into_iter().filter(|r| r.http_status_code == 200) {
            match serde_json::from_value::<SettingsCollection>(item.content) {
                Ok(collection) => owners.extend(
                    collection
                        .value
                        .iter()
                        .filter_map(|s| owner_of_setting(&s.id)),
                ),
                Err(err) => debug!(error = %err, "Skipping undecodable diagnostic settings"),
            }
        }
        Ok(owners)
    }
}

fn definition(resource_type: &str) -> RecommendationDefinition {
    RecommendationDefinition {
        id: DIAGNOSTIC_SETTINGS_RECOMMENDATION_ID.to_string(),
        resource_type: resource_type.to_string(),
        category: RecommendationCategory::MonitoringAndAlerting,
        recommendation: "Enable diagnostic settings".to_string(),
        impact: RecommendationImpact::Low,
        recommendation_type: RecommendationType::Recommendation,
        learn_more_url: DIAGNOSTIC_SETTINGS_URL.to_string(),
    }
}

/// Catalog entry for the diagnostic settings rule of one resource type
pub fn diagnostic_settings_recommendation(resource_type: &str) -> AprlRecommendation {
    definition(resource_type).to_aprl_recommendation()
}

/// One row per supported resource without any diagnostic setting
pub fn missing_diagnostic_settings(
    resources: &[Resource],
    with_settings: &HashSet<String>,
    subscriptions: &BTreeMap<String, String>,
) -> Vec<AprlResult> {
    resources
        .iter()
        .filter(|r| supports_diagnostic_settings(&r.resource_type))
        .filter(|r| !with_settings.contains(&r.id.to_lowercase()))
        .map(|r| {
            let rule = definition(&r.resource_type);
            AprlResult {
                recommendation_id: rule.id,
                resource_type: r.resource_type.clone(),
                long_description: rule.recommendation.clone(),
                recommendation: rule.recommendation,
                resource_id: r.id.clone(),
                subscription_id: r.subscription_id.clone(),
                subscription_name: subscriptions
                    .get(&r.subscription_id)
                    .cloned()
                    .unwrap_or_default(),
                resource_group: r.resource_group.clone(),
                name: r.name.clone(),
                category: rule.category.as_str().to_string(),
                impact: rule.impact.as_str().to_string(),
                learn: rule.learn_more_url,
                source: "AZQR".to_string(),
                ..AprlResult::default()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(id: &str, resource_type: &str) -> Resource {
        Resource {
            id: id.to_string(),
            subscription_id: "s1".into(),
            resource_group: "rg".into(),
            resource_type: resource_type.to_string(),
            name: id.rsplit('/').next().unwrap_or_default().to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_supported_types_ignore_case() {
        assert!(supports_diagnostic_settings("Microsoft.KeyVault/vaults"));
        assert!(!supports_diagnostic_settings("Microsoft.Fake/widgets"));
    }

    #[test]
    fn test_owner_of_setting() {
        assert_eq!(
            owner_of_setting(
                "/subscriptions/S1/resourceGroups/RG/providers/Microsoft.KeyVault/vaults/KV/providers/microsoft.insights/diagnosticSettings/toLaw"
            ),
            Some("/subscriptions/s1/resourcegroups/rg/providers/microsoft.keyvault/vaults/kv".to_string())
        );
        assert_eq!(owner_of_setting("/subscriptions/s1"), None);
    }

    #[test]
    fn test_missing_settings_rows() {
        let resources = vec![
            resource("/subscriptions/s1/resourceGroups/rg/providers/Microsoft.KeyVault/vaults/kv1", "Microsoft.KeyVault/vaults"),
            resource("/subscriptions/s1/resourceGroups/rg/providers/Microsoft.KeyVault/vaults/kv2", "Microsoft.KeyVault/vaults"),
            resource("/subscriptions/s1/resourceGroups/rg/providers/Microsoft.Fake/widgets/w1", "Microsoft.Fake/widgets"),
        ];
        let with_settings = HashSet::from([
            "/subscriptions/s1/resourcegroups/rg/providers/microsoft.keyvault/vaults/kv1".to_string(),
        ]);
        let subscriptions = BTreeMap::from([("s1".to_string(), "Alpha".to_string())]);

        let rows = missing_diagnostic_settings(&resources, &with_settings, &subscriptions);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "kv2");
        assert_eq!(rows[0].subscription_name, "Alpha");
        assert_eq!(rows[0].recommendation_id, DIAGNOSTIC_SETTINGS_RECOMMENDATION_ID);
        assert_eq!(rows[0].source, "AZQR");
    }

    #[test]
    fn test_catalog_entry() {
        let entry = diagnostic_settings_recommendation("Microsoft.KeyVault/vaults");
        assert_eq!(entry.recommendation_id, DIAGNOSTIC_SETTINGS_RECOMMENDATION_ID);
        assert_eq!(entry.category, "MonitoringAndAlerting");
        assert_eq!(entry.learn_more_url(), DIAGNOSTIC_SETTINGS_URL);
    }
}
