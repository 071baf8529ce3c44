//! Sequential stage executor

use std::time::{Duration, Instant};

use tracing::{debug, error, info};

use crate::domain::context::ScanContext;
use crate::domain::errors::PipelineError;
use crate::domain::stage::Stage;

/// Timings collected while a pipeline runs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineMetrics {
    pub total_duration: Duration,
    pub executed: usize,
    pub skipped: usize,
    /// Stage name and duration, in execution order
    pub stage_durations: Vec<(String, Duration)>,
    /// Stage name and error message of the stage that stopped the run
    pub failure: Option<(String, String)>,
}

impl PipelineMetrics {
    pub fn stage_duration(&self, name: &str) -> Option<Duration> {
        self.stage_durations
            .iter()
            .find(|(stage, _)| stage == name)
            .map(|(_, d)| *d)
    }

    /// Share of the total run time spent in each executed stage
    pub fn stage_percentages(&self) -> Vec<(String, f64)> {
        let total = self.total_duration.as_secs_f64();
        self.stage_durations
            .iter()
            .map(|(name, d)| {
                let pct = if total > 0.0 {
                    d.as_secs_f64() / total * 100.0
                } else {
                    0.0
                };
                (name.clone(), pct)
            })
            .collect()
    }
}

/// Ordered stages run against one context
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    metrics: PipelineMetrics,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self {
            stages,
            metrics: PipelineMetrics::default(),
        }
    }

    /// Metrics of the last run, kept when a stage failed
    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage in order, stopping at the first error
    pub async fn execute(&mut self, ctx: &mut ScanContext) -> Result<(), PipelineError> {
        let started = Instant::now();
        let metrics = &mut self.metrics;
        *metrics = PipelineMetrics::default();

        for stage in &self.stages {
            if stage.skip(ctx) {
                debug!(stage = stage.name(), "Skipping stage");
                metrics.skipped += 1;
                continue;
            }

            debug!(stage = stage.name(), "Executing stage");
            let stage_started = Instant::now();
            let result = stage.execute(ctx).await;
            let elapsed = stage_started.elapsed();
            metrics.executed += 1;
            metrics
                .stage_durations
                .push((stage.name().to_string(), elapsed));

            if let Err(err) = result {
                error!(stage = stage.name(), error = %err, "Stage failed");
                metrics.failure = Some((stage.name().to_string(), err.to_string()));
                metrics.total_duration = started.elapsed();
                return Err(err);
            }
            debug!(
                stage = stage.name(),
                duration_ms = elapsed.as_millis() as u64,
                "Stage completed"
            );
        }

        metrics.total_duration = started.elapsed();
        Ok(())
    }
}

/// Log total time and each stage's share of it
pub fn log_metrics(metrics: &PipelineMetrics) {
    info!(
        total_ms = metrics.total_duration.as_millis() as u64,
        executed = metrics.executed,
        skipped = metrics.skipped,
        "Pipeline metrics"
    );
    for ((name, duration), (_, pct)) in metrics
        .stage_durations
        .iter()
        .zip(metrics.stage_percentages())
    {
        info!(
            stage = %name,
            duration_ms = duration.as_millis() as u64,
            "{:.1}% of total",
            pct
        );
    }
}
