//! Storage accounts
//!
//! Bespoke scanner: besides the account listing, each account's blob service
//! properties are fetched so the soft-delete rule can inspect them. A failed
//! lookup leaves them unset and the rule passes.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use azqr_core::domain::{
    AzqrRecommendation, AzqrServiceResult, RecommendationCategory, RecommendationDefinition,
    RecommendationEngine, RecommendationImpact, RuleContext, RuleSet, ScanError, Scanner,
    ScannerConfig, resource_group_from_resource_id,
};

use super::{
    CAF_URL, Sku, TAGS_URL, Tags, definition, has_caf_prefix, has_tags, is_tls12, sla_definition,
};
use crate::arm::ArmClient;

pub const RESOURCE_TYPE: &str = "Microsoft.Storage/storageAccounts";
const API_VERSION: &str = "2023-05-01";
const RELIABILITY_URL: &str =
    "https://learn.microsoft.com/en-us/azure/well-architected/service-guides/storage-accounts/reliability";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageAccount {
    pub id: String,
    pub name: String,
    pub location: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub sku: Sku,
    pub tags: Option<Tags>,
    pub properties: StorageProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StorageProperties {
    pub access_tier: Option<String>,
    pub supports_https_traffic_only: Option<bool>,
    #[serde(rename = "minimumTlsVersion")]
    pub minimum_tls_version: Option<String>,
    pub immutable_storage_with_versioning: Option<EnabledFlag>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EnabledFlag {
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BlobServiceProperties {
    pub properties: BlobServicePropertiesBody,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BlobServicePropertiesBody {
    pub container_delete_retention_policy: Option<EnabledFlag>,
    pub delete_retention_policy: Option<EnabledFlag>,
}

/// What the rules see for one account
#[derive(Debug, Clone, Default)]
pub struct StorageTarget {
    pub account: StorageAccount,
    pub blob_service: Option<BlobServiceProperties>,
}

fn is_enabled(flag: &Option<EnabledFlag>) -> bool {
    flag.as_ref().and_then(|f| f.enabled).unwrap_or(false)
}

/// SLA by redundancy and access tier
pub fn storage_sla(sku: &str, tier: &str) -> &'static str {
    let hot = tier.contains("Hot");
    if sku.contains("RAGRS") {
        if hot { "99.99%" } else { "99.9%" }
    } else if (sku.contains("LRS") || sku.contains("ZRS") || sku.contains("GRS")) && hot {
        "99.9%"
    } else {
        "99%"
    }
}

pub fn recommendations() -> RuleSet<StorageTarget> {
    use RecommendationCategory::*;
    use RecommendationImpact::*;

    let rules = [
        AzqrRecommendation::new(
            definition(
                RESOURCE_TYPE,
                "st-001",
                MonitoringAndAlerting,
                Low,
                "Storage should have diagnostic settings enabled",
                "https://learn.microsoft.com/en-us/azure/storage/blobs/monitor-blob-storage",
            ),
            |t: &StorageTarget, ctx: &RuleContext| {
                (!ctx.has_diagnostic_settings(&t.account.id), String::new())
            },
        ),
        AzqrRecommendation::new(
            sla_definition(
                RESOURCE_TYPE,
                "st-003",
                "Storage should have a SLA",
                "https://www.azure.cn/en-us/support/sla/storage/",
            ),
            |t: &StorageTarget, _ctx: &RuleContext| {
                let tier = t.account.properties.access_tier.as_deref().unwrap_or_default();
                (false, storage_sla(&t.account.sku.name, tier).to_string())
            },
        ),
        AzqrRecommendation::new(
            definition(
                RESOURCE_TYPE,
                "st-005",
                HighAvailability,
                High,
                "Storage SKU",
                "https://learn.microsoft.com/en-us/rest/api/storagerp/srp_sku_types",
            ),
            |t: &StorageTarget, _ctx: &RuleContext| (false, t.account.sku.name.clone()),
        ),
        AzqrRecommendation::new(
            definition(
                RESOURCE_TYPE,
                "st-006",
                Governance,
                Low,
                "Storage Name should comply with naming conventions",
                CAF_URL,
            ),
            |t: &StorageTarget, _ctx: &RuleContext| {
                (!has_caf_prefix(&t.account.name, "st"), String::new())
            },
        ),
        AzqrRecommendation::new(
            definition(
                RESOURCE_TYPE,
                "st-007",
                Security,
                High,
                "Storage Account should use HTTPS only",
                "https://learn.microsoft.com/en-us/azure/storage/common/storage-require-secure-transfer",
            ),
            |t: &StorageTarget, _ctx: &RuleContext| {
                (
                    t.account.properties.supports_https_traffic_only == Some(false),
                    String::new(),
                )
            },
        ),
        AzqrRecommendation::new(
            definition(
                RESOURCE_TYPE,
                "st-008",
                Governance,
                Low,
                "Storage Account should have tags",
                TAGS_URL,
            ),
            |t: &StorageTarget, _ctx: &RuleContext| (!has_tags(&t.account.tags), String::new()),
        ),
        AzqrRecommendation::new(
            definition(
                RESOURCE_TYPE,
                "st-009",
                Security,
                Low,
                "Storage Account should enforce TLS >= 1.2",
                "https://learn.microsoft.com/en-us/azure/storage/common/transport-layer-security-configure-minimum-version?tabs=portal",
            ),
            |t: &StorageTarget, _ctx: &RuleContext| {
                (
                    !is_tls12(t.account.properties.minimum_tls_version.as_deref()),
                    String::new(),
                )
            },
        ),
        AzqrRecommendation::new(
            definition(
                RESOURCE_TYPE,
                "st-010",
                DisasterRecovery,
                Low,
                "Storage Account should have inmutable storage versioning enabled",
                RELIABILITY_URL,
            ),
            |t: &StorageTarget, _ctx: &RuleContext| {
                (
                    !is_enabled(&t.account.properties.immutable_storage_with_versioning),
                    String::new(),
                )
            },
        ),
        AzqrRecommendation::new(
            definition(
                RESOURCE_TYPE,
                "st-011",
                DisasterRecovery,
                Medium,
                "Storage Account should have soft delete enabled",
                RELIABILITY_URL,
            ),
            |t: &StorageTarget, _ctx: &RuleContext| {
                let broken = t.blob_service.as_ref().is_some_and(|blob| {
                    !is_enabled(&blob.properties.container_delete_retention_policy)
                });
                (broken, String::new())
            },
        ),
    ];

    rules
        .into_iter()
        .map(|rule| (rule.id().to_string(), rule))
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct StorageScanner {
    bound: Option<(ScannerConfig, ArmClient)>,
}

impl StorageScanner {
    pub fn new() -> Self {
        Self::default()
    }

    async fn blob_service(
        client: &ArmClient,
        account: &StorageAccount,
    ) -> Option<BlobServiceProperties> {
        let path = format!("{}/blobServices/default", account.id);
        match client.get(&path, API_VERSION).await {
            Ok(properties) => Some(properties),
            Err(err) => {
                debug!(account = %account.name, error = %err, "Blob service properties unavailable");
                None
            }
        }
    }
}

#[async_trait]
impl Scanner for StorageScanner {
    fn init(&mut self, config: &ScannerConfig) -> Result<(), ScanError> {
        self.bound = Some((config.clone(), ArmClient::new(config)?));
        Ok(())
    }

    async fn scan(&self, ctx: &RuleContext) -> Result<Vec<AzqrServiceResult>, ScanError> {
        let (config, client) = self
            .bound
            .as_ref()
            .ok_or_else(|| ScanError::NotInitialized(RESOURCE_TYPE.to_string()))?;

        info!(
            subscription = %config.subscription_id,
            resource_type = RESOURCE_TYPE,
            "Scanning subscription"
        );

        let accounts: Vec<StorageAccount> = client
            .list("Microsoft.Storage/storageAccounts", API_VERSION)
            .await?;
        let rules = recommendations();
        let mut results = Vec::with_capacity(accounts.len());

        for account in accounts {
            let blob_service = Self::blob_service(client, &account).await;
            let target = StorageTarget {
                account,
                blob_service,
            };
            let evaluated = RecommendationEngine.evaluate_recommendations(&rules, &target, ctx);
            let account = target.account;

            results.push(AzqrServiceResult {
                subscription_id: config.subscription_id.clone(),
                subscription_name: config.subscription_name.clone(),
                resource_group: resource_group_from_resource_id(&account.id),
                location: account.location,
                resource_type: account.resource_type,
                service_name: account.name,
                recommendations: evaluated,
            });
        }

        Ok(results)
    }

    fn resource_types(&self) -> Vec<String> {
        vec![RESOURCE_TYPE.to_string()]
    }

    fn recommendations(&self) -> BTreeMap<String, RecommendationDefinition> {
        recommendations()
            .into_iter()
            .map(|(id, rule)| (id, rule.definition))
            .collect()
    }

    fn clone_box(&self) -> Box<dyn Scanner> {
        Box::new(Self::new())
    }
}
