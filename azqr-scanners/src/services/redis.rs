//! Azure Cache for Redis

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::Value;

use azqr_core::domain::{
    AzqrRecommendation, RecommendationCategory::*, RecommendationImpact::*, ResourceInfo,
    RuleContext, RuleSet, ScanError,
};

use super::{
    CAF_URL, Sku, TAGS_URL, Tags, definition, has_caf_prefix, has_tags, is_tls12, sla_definition,
};
use crate::arm::ArmClient;
use crate::generic::{GenericScanner, GenericScannerConfig};

pub const RESOURCE_TYPE: &str = "Microsoft.Cache/Redis";
const API_VERSION: &str = "2024-03-01";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RedisCache {
    pub id: String,
    pub name: String,
    pub location: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub zones: Vec<String>,
    pub tags: Option<Tags>,
    pub properties: RedisProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RedisProperties {
    pub sku: Sku,
    #[serde(rename = "enableNonSslPort")]
    pub enable_non_ssl_port: Option<bool>,
    pub minimum_tls_version: Option<String>,
    pub private_endpoint_connections: Vec<Value>,
}

pub fn new_scanner() -> GenericScanner<RedisCache, ArmClient> {
    GenericScanner::new(GenericScannerConfig {
        resource_types: vec![RESOURCE_TYPE.to_string()],
        make_client: ArmClient::new,
        list: list_caches,
        recommendations,
        extract: |cache: &RedisCache| ResourceInfo {
            id: cache.id.clone(),
            name: cache.name.clone(),
            location: cache.location.clone(),
            resource_type: cache.resource_type.clone(),
        },
    })
}

fn list_caches<'a>(client: &'a ArmClient) -> BoxFuture<'a, Result<Vec<RedisCache>, ScanError>> {
    async move { Ok(client.list("Microsoft.Cache/redis", API_VERSION).await?) }.boxed()
}

fn sla(cache: &RedisCache) -> &'static str {
    if !cache.zones.is_empty() && cache.properties.sku.name.eq_ignore_ascii_case("Premium") {
        "99.99%"
    } else {
        "99.9%"
    }
}

pub fn recommendations() -> RuleSet<RedisCache> {
    let rules = [
        AzqrRecommendation::new(
            definition(
                RESOURCE_TYPE,
                "redis-001",
                MonitoringAndAlerting,
                Low,
                "Azure Cache for Redis should have diagnostic settings enabled",
                "https://learn.microsoft.com/en-us/azure/azure-cache-for-redis/cache-monitor-diagnostic-settings",
            ),
            |c: &RedisCache, ctx: &RuleContext| {
                (!ctx.has_diagnostic_settings(&c.id), String::new())
            },
        ),
        AzqrRecommendation::new(
            definition(
                RESOURCE_TYPE,
                "redis-002",
                HighAvailability,
                High,
                "Azure Cache for Redis should have availability zones enabled",
                "https://learn.microsoft.com/en-us/azure/azure-cache-for-redis/cache-high-availability",
            ),
            |c: &RedisCache, _ctx: &RuleContext| (c.zones.is_empty(), String::new()),
        ),
        AzqrRecommendation::new(
            sla_definition(
                RESOURCE_TYPE,
                "redis-003",
                "Azure Cache for Redis should have a SLA",
                "https://www.microsoft.com/licensing/docs/view/Service-Level-Agreements-SLA-for-Online-Services?lang=1",
            ),
            |c: &RedisCache, _ctx: &RuleContext| (false, sla(c).to_string()),
        ),
        AzqrRecommendation::new(
            definition(
                RESOURCE_TYPE,
                "redis-004",
                Security,
                Medium,
                "Azure Cache for Redis should have private endpoints enabled",
                "https://learn.microsoft.com/en-us/azure/azure-cache-for-redis/cache-private-link",
            ),
            |c: &RedisCache, ctx: &RuleContext| {
                let private = !c.properties.private_endpoint_connections.is_empty()
                    || ctx.has_private_endpoint(&c.id);
                (!private, String::new())
            },
        ),
        AzqrRecommendation::new(
            definition(
                RESOURCE_TYPE,
                "redis-005",
                HighAvailability,
                High,
                "Azure Cache for Redis SKU",
                "https://azure.microsoft.com/en-gb/pricing/details/cache/",
            ),
            |c: &RedisCache, _ctx: &RuleContext| (false, c.properties.sku.name.clone()),
        ),
        AzqrRecommendation::new(
            definition(
                RESOURCE_TYPE,
                "redis-006",
                Governance,
                Low,
                "Azure Cache for Redis Name should comply with naming conventions",
                CAF_URL,
            ),
            |c: &RedisCache, _ctx: &RuleContext| {
                (!has_caf_prefix(&c.name, "redis"), String::new())
            },
        ),
        AzqrRecommendation::new(
            definition(
                RESOURCE_TYPE,
                "redis-007",
                Governance,
                Low,
                "Azure Cache for Redis should have tags",
                TAGS_URL,
            ),
            |c: &RedisCache, _ctx: &RuleContext| (!has_tags(&c.tags), String::new()),
        ),
        AzqrRecommendation::new(
            definition(
                RESOURCE_TYPE,
                "redis-008",
                Security,
                High,
                "Azure Cache for Redis should not enable non SSL ports",
                "https://learn.microsoft.com/en-us/azure/azure-cache-for-redis/cache-configure#access-ports",
            ),
            |c: &RedisCache, _ctx: &RuleContext| {
                (c.properties.enable_non_ssl_port == Some(true), String::new())
            },
        ),
        AzqrRecommendation::new(
            definition(
                RESOURCE_TYPE,
                "redis-009",
                Security,
                Low,
                "Azure Cache for Redis should enforce TLS >= 1.2",
                "https://learn.microsoft.com/en-us/azure/azure-cache-for-redis/cache-remove-tls-10-11",
            ),
            |c: &RedisCache, _ctx: &RuleContext| {
                (!is_tls12(c.properties.minimum_tls_version.as_deref()), String::new())
            },
        ),
    ];

    rules
        .into_iter()
        .map(|rule| (rule.id().to_string(), rule))
        .collect()
}
