//! Key Vault

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Deserialize;

use azqr_core::domain::{
    AzqrRecommendation, RecommendationCategory, RecommendationImpact, ResourceInfo, RuleContext,
    RuleSet, ScanError,
};

use super::{CAF_URL, TAGS_URL, Tags, definition, has_caf_prefix, has_tags, sla_definition};
use crate::arm::ArmClient;
use crate::generic::{GenericScanner, GenericScannerConfig};

pub const RESOURCE_TYPE: &str = "Microsoft.KeyVault/vaults";
const API_VERSION: &str = "2023-07-01";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Vault {
    pub id: String,
    pub name: String,
    pub location: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub tags: Option<Tags>,
}

pub fn new_scanner() -> GenericScanner<Vault, ArmClient> {
    GenericScanner::new(GenericScannerConfig {
        resource_types: vec![RESOURCE_TYPE.to_string()],
        make_client: ArmClient::new,
        list: list_vaults,
        recommendations,
        extract: |vault: &Vault| ResourceInfo {
            id: vault.id.clone(),
            name: vault.name.clone(),
            location: vault.location.clone(),
            resource_type: vault.resource_type.clone(),
        },
    })
}

fn list_vaults<'a>(client: &'a ArmClient) -> BoxFuture<'a, Result<Vec<Vault>, ScanError>> {
    async move { Ok(client.list("Microsoft.KeyVault/vaults", API_VERSION).await?) }.boxed()
}

pub fn recommendations() -> RuleSet<Vault> {
    let rules = [
        AzqrRecommendation::new(
            definition(
                RESOURCE_TYPE,
                "kv-001",
                RecommendationCategory::MonitoringAndAlerting,
                RecommendationImpact::Low,
                "Key Vault should have diagnostic settings enabled",
                "https://learn.microsoft.com/en-us/azure/key-vault/general/monitor-key-vault",
            ),
            |v: &Vault, ctx: &RuleContext| (!ctx.has_diagnostic_settings(&v.id), String::new()),
        ),
        AzqrRecommendation::new(
            sla_definition(
                RESOURCE_TYPE,
                "kv-003",
                "Key Vault should have a SLA",
                "https://www.azure.cn/en-us/support/sla/key-vault/",
            ),
            |_v: &Vault, _ctx: &RuleContext| (false, "99.99%".to_string()),
        ),
        AzqrRecommendation::new(
            definition(
                RESOURCE_TYPE,
                "kv-006",
                RecommendationCategory::Governance,
                RecommendationImpact::Low,
                "Key Vault Name should comply with naming conventions",
                CAF_URL,
            ),
            |v: &Vault, _ctx: &RuleContext| (!has_caf_prefix(&v.name, "kv"), String::new()),
        ),
        AzqrRecommendation::new(
            definition(
                RESOURCE_TYPE,
                "kv-007",
                RecommendationCategory::Governance,
                RecommendationImpact::Low,
                "Key Vault should have tags",
                TAGS_URL,
            ),
            |v: &Vault, _ctx: &RuleContext| (!has_tags(&v.tags), String::new()),
        ),
    ];

    rules
        .into_iter()
        .map(|rule| (rule.id().to_string(), rule))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use azqr_core::domain::{Filters, RecommendationEngine, RecommendationType};

    #[test]
    fn test_vault_rules() {
        let vault = Vault {
            id: "/subscriptions/s1/resourceGroups/rg/providers/Microsoft.KeyVault/vaults/vault01"
                .into(),
            name: "vault01".into(),
            ..Default::default()
        };
        let results = RecommendationEngine.evaluate_recommendations(
            &recommendations(),
            &vault,
            &RuleContext::new(Filters::default()),
        );

        assert!(results["kv-001"].not_compliant);
        assert!(results["kv-006"].not_compliant);
        assert!(results["kv-007"].not_compliant);
        assert!(!results["kv-003"].not_compliant);
        assert_eq!(results["kv-003"].result, "99.99%");
        assert_eq!(results["kv-003"].recommendation_type, RecommendationType::Sla);
    }
}
