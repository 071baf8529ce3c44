//! Explicit bootstrap of the built-in scanners
//!
//! The registry is assembled once, on first use, and never mutated after.

use std::sync::Arc;

use once_cell::sync::Lazy;
use tracing::debug;

use azqr_core::domain::ScannerRegistry;

use crate::services::{keyvault, redis, resource, storage};

static REGISTRY: Lazy<ScannerRegistry> = Lazy::new(bootstrap);

/// Build a registry with every built-in scanner
pub fn bootstrap() -> ScannerRegistry {
    let mut registry = ScannerRegistry::new();
    registry.register("aks", Arc::new(resource::aks_scanner()));
    registry.register("kv", Arc::new(keyvault::new_scanner()));
    registry.register("redis", Arc::new(redis::new_scanner()));
    registry.register("resource", Arc::new(resource::resource_scanner()));
    registry.register("st", Arc::new(storage::StorageScanner::new()));
    registry.register("vm", Arc::new(resource::vm_scanner()));
    debug!(scanners = registry.len(), "Scanner registry bootstrapped");
    registry
}

/// Process-wide registry of built-in scanners
pub fn scanner_registry() -> &'static ScannerRegistry {
    &REGISTRY
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use crate::graph::builtin_recommendations;

    use super::*;

    #[test]
    fn test_bootstrap_registers_every_key() {
        let registry = bootstrap();
        assert_eq!(
            registry.keys(),
            vec!["aks", "kv", "redis", "resource", "st", "vm"]
        );
    }

    #[test]
    fn test_type_lookup() {
        let registry = scanner_registry();
        assert_eq!(
            registry.key_for_resource_type("microsoft.storage/storageaccounts"),
            Some("st")
        );
        assert_eq!(
            registry.key_for_resource_type("Microsoft.Network/publicIPAddresses"),
            Some("resource")
        );
    }

    #[test]
    fn test_every_scanner_has_types() {
        for scanner in scanner_registry().all() {
            assert!(!scanner.resource_types().is_empty());
        }
    }

    #[test]
    fn test_rules_have_unique_ids_and_declared_types() {
        let registry = scanner_registry();
        let mut seen = HashSet::new();
        for key in registry.keys() {
            for scanner in registry.get(&key).unwrap_or_default() {
                let declared: HashSet<String> = scanner
                    .resource_types()
                    .iter()
                    .map(|t| t.to_lowercase())
                    .collect();
                for (id, rule) in scanner.recommendations() {
                    assert_eq!(id, rule.id, "{key}: rule keyed under another id");
                    assert!(seen.insert(id.clone()), "{key}: duplicate rule id {id}");
                    assert!(
                        declared.contains(&rule.resource_type.to_lowercase()),
                        "{key}: rule {id} targets undeclared type {}",
                        rule.resource_type
                    );
                }
            }
        }
        assert!(!seen.is_empty());
    }

    #[test]
    fn test_graph_catalog_ids_are_unique_and_owned_by_a_scanner() {
        let registry = scanner_registry();
        let mut seen = HashSet::new();
        for (resource_type, recommendations) in builtin_recommendations() {
            assert!(
                registry.key_for_resource_type(resource_type).is_some(),
                "no scanner declares {resource_type}"
            );
            for (id, recommendation) in recommendations {
                assert_eq!(id, &recommendation.recommendation_id);
                assert_eq!(resource_type, &recommendation.resource_type.to_lowercase());
                assert!(seen.insert(id.clone()), "duplicate graph recommendation {id}");
            }
        }
        assert!(!seen.is_empty());
    }
}
