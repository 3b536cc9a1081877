//! Per-artifact evaluation: shared context, concurrent metrics, NetScore.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tokio::time::Instant;
use tracing::instrument;

use crate::artifact::{ArtifactHandle, Category};
use crate::context::{ArtifactContext, ArtifactFetcher};
use crate::error::EvalError;
use crate::executor::{
    call_with_policy, duration_ms, record_failure, MetricExecutor, MetricOutcome,
};
use crate::metric::{Metric, MetricRegistry, WeightTable};
use crate::obs;
use crate::policy::RunPolicy;
use crate::record::{EvaluationRecord, MetricEntry};
use crate::stats::RUN_STATS;

/// Weighted dot product of metric scores. Failed metrics contribute 0.
pub fn net_score(
    weights: &WeightTable,
    category: Category,
    outcomes: &BTreeMap<String, MetricOutcome>,
) -> f64 {
    let sum: f64 = outcomes
        .iter()
        .map(|(name, outcome)| weights.weight(category, name) * outcome.score())
        .sum();
    sum.clamp(0.0, 1.0)
}

/// Failed outcome for a metric task that died outside the executor. The
/// elapsed time runs from when the task was spawned.
fn join_failure(metric: &str, err: &JoinError, started: Instant) -> MetricOutcome {
    MetricOutcome::failed(
        EvalError::computation(metric, "join", err.to_string()),
        1,
        duration_ms(started.elapsed()),
    )
}

/// Evaluates one artifact at a time; cheap to share behind an `Arc`.
pub struct ArtifactEvaluator {
    registry: MetricRegistry,
    weights: Arc<WeightTable>,
    fetcher: Arc<dyn ArtifactFetcher>,
    executor: MetricExecutor,
}

impl ArtifactEvaluator {
    pub fn new(
        registry: MetricRegistry,
        weights: WeightTable,
        fetcher: Arc<dyn ArtifactFetcher>,
        policy: Arc<RunPolicy>,
    ) -> Self {
        Self {
            registry,
            weights: Arc::new(weights),
            fetcher,
            executor: MetricExecutor::new(policy),
        }
    }

    pub fn policy(&self) -> &RunPolicy {
        self.executor.policy()
    }

    /// Score `handle` with every applicable metric.
    ///
    /// Always returns a complete record: failures inside the fetcher or a
    /// metric degrade the affected entries to score 0 instead of aborting.
    #[instrument(skip(self, handle), fields(identity = %handle.identity(), category = %handle.category()))]
    pub async fn evaluate(&self, handle: ArtifactHandle) -> EvaluationRecord {
        let category = handle.category();
        let metrics = self.registry.applicable(category);

        let mut context_latency_ms = 0;
        let outcomes = if metrics.is_empty() {
            BTreeMap::new()
        } else {
            let fetched = self.build_context(&handle).await;
            context_latency_ms = fetched.elapsed_ms();
            match fetched.result {
                Ok(context) => self.run_metrics(&metrics, handle.clone(), context).await,
                Err(cause) => {
                    tracing::warn!(
                        identity = %handle.identity(),
                        error = %cause,
                        attempts = fetched.attempts,
                        "context construction failed; recording every metric as failed"
                    );
                    metrics
                        .iter()
                        .map(|m| {
                            let outcome = MetricOutcome::failed(
                                cause.clone(),
                                fetched.attempts,
                                context_latency_ms,
                            );
                            record_failure(handle.identity(), m.name(), &outcome);
                            (m.name().to_string(), outcome)
                        })
                        .collect()
                }
            }
        };

        let record = self.aggregate(&handle, outcomes, context_latency_ms);
        RUN_STATS.inc_artifacts_evaluated();
        if record.degraded {
            RUN_STATS.inc_degraded();
            obs::emit_degraded_evaluation(&record);
        }
        obs::emit_artifact_evaluated(&record);
        record
    }

    async fn build_context(
        &self,
        handle: &ArtifactHandle,
    ) -> crate::executor::Attempted<ArtifactContext> {
        let fetcher = &self.fetcher;
        call_with_policy(self.policy(), "fetch_context", handle.identity(), || async move {
            fetcher.fetch(handle).await.map_err(EvalError::from)
        })
        .await
    }

    async fn run_metrics(
        &self,
        metrics: &[Arc<dyn Metric>],
        handle: ArtifactHandle,
        context: ArtifactContext,
    ) -> BTreeMap<String, MetricOutcome> {
        let handle = Arc::new(handle);
        let context = Arc::new(context);
        let metric_slots = self
            .policy()
            .max_concurrent_metrics_per_artifact
            .map(|n| Arc::new(Semaphore::new(n)));

        let mut tasks = Vec::with_capacity(metrics.len());
        for metric in metrics {
            let metric = Arc::clone(metric);
            let handle = Arc::clone(&handle);
            let context = Arc::clone(&context);
            let executor = self.executor.clone();
            let slots = metric_slots.clone();

            let name = metric.name().to_string();
            let started = Instant::now();
            let task = tokio::spawn(async move {
                let _permit = match slots {
                    Some(sem) => sem.acquire_owned().await.ok(),
                    None => None,
                };
                executor.run(metric.as_ref(), &handle, &context).await
            });
            tasks.push((name, started, task));
        }

        let mut outcomes = BTreeMap::new();
        for (name, started, task) in tasks {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    let outcome = join_failure(&name, &e, started);
                    record_failure(handle.identity(), &name, &outcome);
                    outcome
                }
            };
            outcomes.insert(name, outcome);
        }
        outcomes
    }

    fn aggregate(
        &self,
        handle: &ArtifactHandle,
        outcomes: BTreeMap<String, MetricOutcome>,
        context_latency_ms: u64,
    ) -> EvaluationRecord {
        let category = handle.category();
        let net = net_score(&self.weights, category, &outcomes);
        let net_score_latency_ms = outcomes.values().map(|o| o.elapsed_ms()).max().unwrap_or(0);
        let latency_sum_ms = outcomes.values().map(|o| o.elapsed_ms()).sum();
        let degraded = outcomes.values().any(|o| o.is_failed());

        EvaluationRecord {
            identity: handle.identity().to_string(),
            category,
            net_score: net,
            net_score_latency_ms,
            metrics: outcomes
                .iter()
                .map(|(name, o)| (name.clone(), MetricEntry::from(o)))
                .collect(),
            degraded,
            latency_sum_ms,
            context_latency_ms,
        }
    }
}
