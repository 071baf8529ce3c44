//! List-then-evaluate scanner built from callbacks
//!
//! Most services only need four pieces: a client bound to the subscription,
//! a way to list resources with it, a rule set and a way to read identity
//! fields off a resource. [`GenericScanner`] wires those into the
//! [`Scanner`] contract.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::{debug, info};

use azqr_core::domain::{
    AzqrResult, AzqrServiceResult, RecommendationDefinition, RecommendationEngine, ResourceInfo,
    RuleContext, RuleSet, ScanError, Scanner, ScannerConfig, resource_group_from_resource_id,
};

/// Lists every resource visible to the client
pub type ListFn<R, C> = for<'a> fn(&'a C) -> BoxFuture<'a, Result<Vec<R>, ScanError>>;

/// Callbacks describing one service
pub struct GenericScannerConfig<R, C> {
    pub resource_types: Vec<String>,
    pub make_client: fn(&ScannerConfig) -> Result<C, ScanError>,
    pub list: ListFn<R, C>,
    pub recommendations: fn() -> RuleSet<R>,
    pub extract: fn(&R) -> ResourceInfo,
}

struct Bound<C> {
    config: ScannerConfig,
    client: C,
}

pub struct GenericScanner<R, C> {
    spec: Arc<GenericScannerConfig<R, C>>,
    bound: Option<Bound<C>>,
}

impl<R, C> GenericScanner<R, C> {
    pub fn new(spec: GenericScannerConfig<R, C>) -> Self {
        Self {
            spec: Arc::new(spec),
            bound: None,
        }
    }

    fn primary_type(&self) -> &str {
        self.spec
            .resource_types
            .first()
            .map(String::as_str)
            .unwrap_or_default()
    }

    fn build_result(
        &self,
        config: &ScannerConfig,
        info: ResourceInfo,
        recommendations: BTreeMap<String, AzqrResult>,
    ) -> AzqrServiceResult {
        AzqrServiceResult {
            subscription_id: config.subscription_id.clone(),
            subscription_name: config.subscription_name.clone(),
            resource_group: resource_group_from_resource_id(&info.id),
            location: info.location,
            resource_type: info.resource_type,
            service_name: info.name,
            recommendations,
        }
    }
}

impl<R, C> fmt::Debug for GenericScanner<R, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericScanner")
            .field("resource_types", &self.spec.resource_types)
            .field("initialized", &self.bound.is_some())
            .finish()
    }
}

#[async_trait]
impl<R, C> Scanner for GenericScanner<R, C>
where
    R: Send + Sync + 'static,
    C: Send + Sync + 'static,
{
    fn init(&mut self, config: &ScannerConfig) -> Result<(), ScanError> {
        let client = (self.spec.make_client)(config)?;
        self.bound = Some(Bound {
            config: config.clone(),
            client,
        });
        Ok(())
    }

    async fn scan(&self, ctx: &RuleContext) -> Result<Vec<AzqrServiceResult>, ScanError> {
        let bound = self
            .bound
            .as_ref()
            .ok_or_else(|| ScanError::NotInitialized(self.primary_type().to_string()))?;

        info!(
            subscription = %bound.config.subscription_id,
            resource_type = %self.primary_type(),
            "Scanning subscription"
        );

        let resources = (self.spec.list)(&bound.client).await?;
        let rules = (self.spec.recommendations)();
        let engine = RecommendationEngine;

        let results: Vec<AzqrServiceResult> = resources
            .iter()
            .map(|resource| {
                let evaluated = engine.evaluate_recommendations(&rules, resource, ctx);
                self.build_result(&bound.config, (self.spec.extract)(resource), evaluated)
            })
            .collect();

        debug!(
            resource_type = %self.primary_type(),
            resources = results.len(),
            "Service scan finished"
        );
        Ok(results)
    }

    fn resource_types(&self) -> Vec<String> {
        self.spec.resource_types.clone()
    }

    fn recommendations(&self) -> BTreeMap<String, RecommendationDefinition> {
        (self.spec.recommendations)()
            .into_iter()
            .map(|(id, rule)| (id, rule.definition))
            .collect()
    }

    fn clone_box(&self) -> Box<dyn Scanner> {
        Box::new(Self {
            spec: Arc::clone(&self.spec),
            bound: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use azqr_core::domain::{
        AzqrRecommendation, Filters, RecommendationCategory, RecommendationImpact,
        RecommendationType,
    };
    use azqr_core::infrastructure::ClientOptions;
    use futures::FutureExt;
    use tokio_util::sync::CancellationToken;

    struct Widget {
        id: &'static str,
        tagged: bool,
    }

    struct FakeClient {
        widgets: Vec<&'static str>,
    }

    fn rules() -> RuleSet<Widget> {
        let mut rules = RuleSet::new();
        rules.insert(
            "wd-001".into(),
            AzqrRecommendation::new(
                RecommendationDefinition {
                    id: "wd-001".into(),
                    resource_type: "Contoso.Widgets/widgets".into(),
                    category: RecommendationCategory::Governance,
                    recommendation: "Widget should have tags".into(),
                    impact: RecommendationImpact::Low,
                    recommendation_type: RecommendationType::Recommendation,
                    learn_more_url: String::new(),
                },
                |w: &Widget, _ctx: &RuleContext| (!w.tagged, String::new()),
            ),
        );
        rules
    }

    fn list<'a>(client: &'a FakeClient) -> BoxFuture<'a, Result<Vec<Widget>, ScanError>> {
        async move {
            Ok(client
                .widgets
                .iter()
                .map(|&id| Widget {
                    id,
                    tagged: id.ends_with("tagged"),
                })
                .collect())
        }
        .boxed()
    }

    fn scanner() -> GenericScanner<Widget, FakeClient> {
        GenericScanner::new(GenericScannerConfig {
            resource_types: vec!["Contoso.Widgets/widgets".into()],
            make_client: |_config| {
                Ok(FakeClient {
                    widgets: vec![
                        "/subscriptions/s1/resourceGroups/rg-a/providers/Contoso.Widgets/widgets/w-tagged",
                        "/subscriptions/s1/resourceGroups/rg-b/providers/Contoso.Widgets/widgets/w-bare",
                    ],
                })
            },
            list,
            recommendations: rules,
            extract: |w: &Widget| ResourceInfo {
                id: w.id.to_string(),
                name: w.id.rsplit('/').next().unwrap_or_default().to_string(),
                location: "westeurope".into(),
                resource_type: "Contoso.Widgets/widgets".into(),
            },
        })
    }

    fn config() -> ScannerConfig {
        ScannerConfig {
            cancel: CancellationToken::new(),
            credential: None,
            client_options: ClientOptions::default(),
            subscription_id: "s1".into(),
            subscription_name: "Sub One".into(),
        }
    }

    #[tokio::test]
    async fn test_scan_before_init_fails() {
        let err = scanner()
            .scan(&RuleContext::new(Filters::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::NotInitialized(_)));
    }

    #[tokio::test]
    async fn test_one_result_per_resource() {
        let mut scanner = scanner();
        scanner.init(&config()).unwrap();

        let results = scanner
            .scan(&RuleContext::new(Filters::default()))
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].resource_group, "rg-a");
        assert_eq!(results[0].subscription_name, "Sub One");
        assert!(!results[0].recommendations["wd-001"].not_compliant);
        assert!(results[1].recommendations["wd-001"].not_compliant);
    }

    #[test]
    fn test_clone_box_is_uninitialised() {
        let mut scanner = scanner();
        scanner.init(&config()).unwrap();
        let copy = scanner.clone_box();
        assert_eq!(copy.resource_types(), vec!["Contoso.Widgets/widgets"]);
        assert!(copy.recommendations().contains_key("wd-001"));
    }
}
