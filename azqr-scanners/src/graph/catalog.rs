use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use tracing::{debug, warn};

use azqr_core::domain::AprlRecommendation;

/// Azure Proactive Resiliency Library
pub const SOURCE_APRL: &str = "APRL";
/// Azure Orphaned Resources
pub const SOURCE_AOR: &str = "AOR";

/// Lowercase resource type, then recommendation id
pub type RecommendationCatalog = BTreeMap<String, BTreeMap<String, AprlRecommendation>>;

const BUNDLED: [(&str, &str, &str); 6] = [
    (SOURCE_APRL, "aks.yaml", include_str!("recommendations/aks.yaml")),
    (SOURCE_APRL, "keyvault.yaml", include_str!("recommendations/keyvault.yaml")),
    (SOURCE_APRL, "redis.yaml", include_str!("recommendations/redis.yaml")),
    (SOURCE_APRL, "storage.yaml", include_str!("recommendations/storage.yaml")),
    (SOURCE_APRL, "vm.yaml", include_str!("recommendations/vm.yaml")),
    (SOURCE_AOR, "orphaned.yaml", include_str!("recommendations/orphaned.yaml")),
];

const SKIP_MARKERS: [&str; 3] = [
    "cannot-be-validated-with-arg",
    "under-development",
    "under development",
];

static BUILTIN: Lazy<RecommendationCatalog> = Lazy::new(load_bundled);

/// Recommendations bundled with the binary
pub fn builtin_recommendations() -> &'static RecommendationCatalog {
    &BUILTIN
}

/// Parse a YAML list of recommendations
pub fn parse_recommendations(raw: &str) -> Result<Vec<AprlRecommendation>, serde_yml::Error> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_yml::from_str(raw)
}

/// Insert under the lowercase resource type, replacing an entry with the same id
pub fn insert_recommendation(
    catalog: &mut RecommendationCatalog,
    recommendation: AprlRecommendation,
) {
    catalog
        .entry(recommendation.resource_type.to_lowercase())
        .or_default()
        .insert(recommendation.recommendation_id.clone(), recommendation);
}

/// Queries marked as not runnable against Resource Graph
pub fn is_unvalidatable_query(query: &str) -> bool {
    SKIP_MARKERS.iter().any(|marker| query.contains(marker))
}

fn load_bundled() -> RecommendationCatalog {
    let mut catalog = RecommendationCatalog::new();

    for (source, file, raw) in BUNDLED {
        match parse_recommendations(raw) {
            Ok(recommendations) => {
                debug!(file, count = recommendations.len(), "Loaded bundled recommendations");
                for mut recommendation in recommendations {
                    recommendation.source = source.to_string();
                    insert_recommendation(&mut catalog, recommendation);
                }
            }
            Err(err) => warn!(file, error = %err, "Skipping malformed bundled recommendations"),
        }
    }

    catalog
}
