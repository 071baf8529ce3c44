//! Per-service scans through the registered scanners

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use azqr_core::domain::{
    AzqrServiceResult, RecommendationType, RuleContext, ScanError, Scanner, ScannerConfig,
    mask_subscription_id,
};
use azqr_scanners::discovery::list_private_endpoint_targets;

use crate::domain::context::ScanContext;
use crate::domain::errors::PipelineError;
use crate::domain::stage::{BaseStage, Stage};

/// Attempts and first delay for a failing scanner; the delay doubles per retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScannerRetry {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for ScannerRetry {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_millis(10),
        }
    }
}

/// Run one scanner, retrying failures that are neither skippable nor a cancellation
pub async fn scan_with_retry(
    scanner: &dyn Scanner,
    rule_ctx: &RuleContext,
    retry: ScannerRetry,
    cancel: &CancellationToken,
) -> Result<Vec<AzqrServiceResult>, ScanError> {
    let mut delay = retry.delay;
    let mut attempt = 1;

    loop {
        match scanner.scan(rule_ctx).await {
            Ok(results) => return Ok(results),
            Err(err) if err.is_cancelled() => return Err(err),
            Err(err) if err.is_skippable() => {
                debug!(error = %err, "Skippable scanner error");
                return Ok(Vec::new());
            }
            Err(err) if attempt >= retry.attempts.max(1) => {
                info!(error = %err, "Retry limit reached");
                return Err(err);
            }
            Err(err) => {
                debug!(attempt, error = %err, "Retrying after error");
                tokio::select! {
                    _ = cancel.cancelled() => return Err(ScanError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
                delay *= 2;
                attempt += 1;
            }
        }
    }
}

/// Scanners owning at least one resource type present in the subscription
pub fn scanners_for_subscription(
    scanners: &[Arc<dyn Scanner>],
    type_counts: Option<&HashMap<String, f64>>,
) -> Vec<Arc<dyn Scanner>> {
    let Some(type_counts) = type_counts else {
        return Vec::new();
    };
    scanners
        .iter()
        .filter(|s| {
            s.resource_types()
                .iter()
                .any(|t| type_counts.get(&t.to_lowercase()).copied().unwrap_or(0.0) > 0.0)
        })
        .cloned()
        .collect()
}

/// Run every scanner for one subscription, at most `workers` at a time.
/// Scanners that fail to init or keep failing are logged and left out.
pub async fn run_scanners(
    scanners: Vec<Arc<dyn Scanner>>,
    config: ScannerConfig,
    rule_ctx: RuleContext,
    workers: usize,
    retry: ScannerRetry,
) -> Result<Vec<AzqrServiceResult>, PipelineError> {
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut join_set: JoinSet<Result<Vec<AzqrServiceResult>, ScanError>> = JoinSet::new();

    for prototype in scanners {
        let permit = semaphore.clone();
        let config = config.clone();
        let rule_ctx = rule_ctx.clone();

        join_set.spawn(async move {
            let _permit = permit
                .acquire_owned()
                .await
                .map_err(|e| ScanError::Other(format!("Failed to acquire semaphore: {e}")))?;

            let mut scanner = prototype.clone_box();
            if let Err(err) = scanner.init(&config) {
                error!(error = %err, "Failed to initialize scanner");
                return Ok(Vec::new());
            }

            match scan_with_retry(scanner.as_ref(), &rule_ctx, retry, &config.cancel).await {
                Ok(results) => Ok(results),
                Err(err) if err.is_cancelled() => Err(err),
                Err(err) => {
                    error!(
                        resource_types = ?scanner.resource_types(),
                        error = %err,
                        "Scanner failed after retries"
                    );
                    Ok(Vec::new())
                }
            }
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(Ok(batch)) => results.extend(batch),
            Ok(Err(err)) => {
                join_set.abort_all();
                return Err(err.into());
            }
            Err(err) => warn!(error = %err, "Scanner task aborted"),
        }
    }
    Ok(results)
}

pub struct ServiceScanStage {
    base: BaseStage,
}

impl ServiceScanStage {
    pub fn new() -> Self {
        Self {
            base: BaseStage::new("AZQR Service Scan", true),
        }
    }
}

impl Default for ServiceScanStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for ServiceScanStage {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn skip(&self, ctx: &ScanContext) -> bool {
        !ctx.params.use_azqr_recommendations
    }

    async fn execute(&self, ctx: &mut ScanContext) -> Result<(), PipelineError> {
        let scanners = ctx.filters.scanners().to_vec();

        for scanner in &scanners {
            for (id, definition) in scanner.recommendations() {
                if definition.recommendation_type == RecommendationType::Recommendation
                    && !ctx.filters.is_recommendation_excluded(&id)
                {
                    ctx.report
                        .add_recommendation(definition.to_aprl_recommendation());
                }
            }
        }

        let graph = ctx.graph()?;
        ctx.private_endpoints =
            match list_private_endpoint_targets(graph.as_ref(), &ctx.subscriptions, &ctx.cancel)
                .await
            {
                Ok(ids) => ids,
                Err(err) if err.is_cancelled() => return Err(err.into()),
                Err(err) => {
                    warn!(error = %err, "Failed to list private endpoints");
                    Default::default()
                }
            };

        let rule_ctx = RuleContext {
            filters: ctx.filters.clone(),
            private_endpoints: Arc::new(ctx.private_endpoints.clone()),
            diagnostics_settings: Arc::new(ctx.diagnostics_settings.clone()),
        };
        let retry = ScannerRetry {
            attempts: ctx.scan_config.scanner_retry_attempts,
            delay: Duration::from_millis(ctx.scan_config.scanner_retry_delay_ms),
        };

        let subscriptions: Vec<(String, String)> = ctx
            .subscriptions
            .iter()
            .map(|(id, name)| (id.clone(), name.clone()))
            .collect();

        for (subscription_id, subscription_name) in subscriptions {
            ctx.check_cancelled()?;

            let selected = scanners_for_subscription(
                &scanners,
                ctx.resource_types_by_subscription
                    .get(&subscription_id.to_lowercase()),
            );
            if selected.is_empty() {
                info!(
                    "No scanners needed for subscription {}, skipping AZQR scan",
                    display_subscription(&subscription_id, ctx.params.mask)
                );
                continue;
            }

            let config = ctx.scanner_config(&subscription_id, &subscription_name);
            let results = run_scanners(
                selected,
                config,
                rule_ctx.clone(),
                ctx.scan_config.service_workers,
                retry,
            )
            .await?;

            let filters = ctx.filters.clone();
            let before = ctx.report.azqr.len();
            ctx.report.azqr.extend(
                results
                    .into_iter()
                    .filter(|r| !filters.is_service_excluded(&r.resource_id())),
            );
            debug!(
                subscription = %display_subscription(&subscription_id, ctx.params.mask),
                results = ctx.report.azqr.len() - before,
                "AZQR scan completed for subscription"
            );
        }

        info!(results = ctx.report.azqr.len(), "AZQR service scan completed");
        Ok(())
    }
}

pub(crate) fn display_subscription(subscription_id: &str, mask: bool) -> String {
    if mask {
        mask_subscription_id(subscription_id)
    } else {
        subscription_id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    use azqr_core::domain::RecommendationDefinition;
    use azqr_core::infrastructure::ClientOptions;

    use super::*;

    /// Fails `failures` times with `error`, then returns one result
    #[derive(Clone)]
    struct Flaky {
        calls: Arc<AtomicU32>,
        failures: u32,
        error: fn() -> ScanError,
    }

    #[async_trait]
    impl Scanner for Flaky {
        fn init(&mut self, _config: &ScannerConfig) -> Result<(), ScanError> {
            Ok(())
        }

        async fn scan(&self, _ctx: &RuleContext) -> Result<Vec<AzqrServiceResult>, ScanError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err((self.error)());
            }
            Ok(vec![AzqrServiceResult {
                service_name: "svc".into(),
                ..Default::default()
            }])
        }

        fn resource_types(&self) -> Vec<String> {
            vec!["Microsoft.Cache/Redis".into()]
        }

        fn recommendations(&self) -> BTreeMap<String, RecommendationDefinition> {
            BTreeMap::new()
        }

        fn clone_box(&self) -> Box<dyn Scanner> {
            Box::new(self.clone())
        }
    }

    fn flaky(failures: u32, error: fn() -> ScanError) -> (Flaky, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        (
            Flaky {
                calls: calls.clone(),
                failures,
                error,
            },
            calls,
        )
    }

    fn transient() -> ScanError {
        ScanError::Other("connection reset".into())
    }

    fn skippable() -> ScanError {
        ScanError::Other("MissingSubscriptionRegistration".into())
    }

    #[tokio::test]
    async fn test_retry_recovers_within_attempts() {
        let (scanner, calls) = flaky(2, transient);
        let results = scan_with_retry(
            &scanner,
            &RuleContext::default(),
            ScannerRetry::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_attempts() {
        let (scanner, calls) = flaky(5, transient);
        let err = scan_with_retry(
            &scanner,
            &RuleContext::default(),
            ScannerRetry::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "connection reset");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_skippable_error_yields_empty_result() {
        let (scanner, calls) = flaky(1, skippable);
        let results = scan_with_retry(
            &scanner,
            &RuleContext::default(),
            ScannerRetry::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(results.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_pool_leaves_out_failing_scanners() {
        let (good, _) = flaky(0, transient);
        let (bad, bad_calls) = flaky(10, transient);
        let config = ScannerConfig {
            cancel: CancellationToken::new(),
            credential: None,
            client_options: ClientOptions::default(),
            subscription_id: "sub".into(),
            subscription_name: "Sub".into(),
        };

        let scanners: Vec<Arc<dyn Scanner>> = vec![Arc::new(good), Arc::new(bad)];
        let results = run_scanners(
            scanners,
            config,
            RuleContext::default(),
            1,
            ScannerRetry {
                attempts: 2,
                delay: Duration::from_millis(1),
            },
        )
        .await
        .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(bad_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_scanners_filtered_by_subscription_types() {
        let (scanner, _) = flaky(0, transient);
        let scanners: Vec<Arc<dyn Scanner>> = vec![Arc::new(scanner)];

        let present = HashMap::from([("microsoft.cache/redis".to_string(), 1.0)]);
        let absent = HashMap::from([("microsoft.web/sites".to_string(), 3.0)]);
        assert_eq!(scanners_for_subscription(&scanners, Some(&present)).len(), 1);
        assert!(scanners_for_subscription(&scanners, Some(&absent)).is_empty());
        assert!(scanners_for_subscription(&scanners, None).is_empty());
    }
}
