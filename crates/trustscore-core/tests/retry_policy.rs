//! Retry, timeout and degradation behavior observed through full evaluations.

use std::sync::Arc;

use trustscore_core::fakes::{FixedMetric, ScriptedMetric, StaticFetcher};
use trustscore_core::{
    ArtifactEvaluator, ArtifactHandle, Category, ErrorKind, EvalError, ExternalCallKind, Metric,
    MetricRegistry, RunPolicy, WeightTable,
};

fn handle() -> ArtifactHandle {
    ArtifactHandle::new(
        Category::Model,
        "huggingface.co",
        "org/model",
        "https://huggingface.co/org/model",
    )
}

fn evaluator(metrics: Vec<Arc<dyn Metric>>, policy: RunPolicy) -> ArtifactEvaluator {
    let mut registry = MetricRegistry::new();
    let mut weights = std::collections::BTreeMap::new();
    for m in metrics {
        weights.insert(m.name().to_string(), 1.0);
        registry.register(m).unwrap();
    }
    let table = WeightTable::new(&registry, &weights).unwrap();
    ArtifactEvaluator::new(
        registry,
        table,
        Arc::new(StaticFetcher::new()),
        Arc::new(policy),
    )
}

fn transient() -> EvalError {
    EvalError::external("hub", "api", ExternalCallKind::RateLimited, "429 too many requests")
        .with_status(429)
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_with_two_retries_makes_three_attempts() {
    let metric = Arc::new(ScriptedMetric::new("flaky").then_fail(transient()));
    let policy = RunPolicy {
        max_retries: 2,
        ..RunPolicy::default()
    };
    let eval = evaluator(vec![metric.clone()], policy);

    let record = eval.evaluate(handle()).await;
    let entry = &record.metrics["flaky"];
    assert!(entry.failed);
    assert_eq!(entry.score, 0.0);
    let error = entry.error.as_ref().unwrap();
    assert_eq!(error.kind, ErrorKind::ExternalCall);
    assert_eq!(error.attempts, 3);
    assert_eq!(metric.calls(), 3);
    // Backoff 500ms then 1000ms.
    assert_eq!(entry.latency_ms, 1_500);
}

#[tokio::test(start_paused = true)]
async fn test_validation_and_computation_failures_are_not_retried() {
    let validation = Arc::new(ScriptedMetric::new("validation").then_fail(EvalError::validation(
        "license",
        "???",
        "SPDX identifier",
        "unparseable license",
    )));
    let computation = Arc::new(
        ScriptedMetric::new("computation").then_fail(EvalError::computation(
            "computation",
            "ratio",
            "division by zero",
        )),
    );
    let eval = evaluator(
        vec![validation.clone(), computation.clone()],
        RunPolicy {
            max_retries: 5,
            ..RunPolicy::default()
        },
    );

    let record = eval.evaluate(handle()).await;
    assert_eq!(validation.calls(), 1);
    assert_eq!(computation.calls(), 1);
    assert_eq!(record.metrics["validation"].error.as_ref().unwrap().attempts, 1);
    assert_eq!(
        record.metrics["computation"].error.as_ref().unwrap().kind,
        ErrorKind::Computation
    );
}

#[tokio::test(start_paused = true)]
async fn test_hanging_metric_fails_at_total_timeout() {
    let policy = RunPolicy {
        total_timeout_ms: 3_000,
        connect_timeout_ms: 1_000,
        ..RunPolicy::default()
    };
    let eval = evaluator(
        vec![
            Arc::new(ScriptedMetric::new("stuck").then_hang()),
            Arc::new(FixedMetric::new("quick", 1.0)),
        ],
        policy,
    );

    let record = eval.evaluate(handle()).await;
    let stuck = &record.metrics["stuck"];
    assert!(stuck.failed);
    assert_eq!(stuck.error.as_ref().unwrap().kind, ErrorKind::ExternalCall);
    let drift = stuck.latency_ms.abs_diff(3_000);
    assert!(drift <= 5, "latency {} not near timeout", stuck.latency_ms);

    // The sibling is unaffected.
    assert!(!record.metrics["quick"].failed);
    assert_eq!(record.net_score, 0.5);
    assert_eq!(record.net_score_latency_ms, stuck.latency_ms);
}

#[tokio::test(start_paused = true)]
async fn test_every_metric_failing_gives_zero_and_degraded() {
    let eval = evaluator(
        vec![
            Arc::new(ScriptedMetric::new("a").then_fail(transient())),
            Arc::new(ScriptedMetric::new("b").then_score(-0.3)),
            Arc::new(ScriptedMetric::new("c").then_panic("bug in heuristic")),
        ],
        RunPolicy {
            max_retries: 1,
            ..RunPolicy::default()
        },
    );

    let record = eval.evaluate(handle()).await;
    assert_eq!(record.net_score, 0.0);
    assert!(record.degraded);
    assert_eq!(record.metrics.len(), 3);
    assert!(record.metrics.values().all(|e| e.failed && e.score == 0.0));
    assert_eq!(
        record.metrics["c"].error.as_ref().unwrap().kind,
        ErrorKind::Computation
    );
}

#[tokio::test(start_paused = true)]
async fn test_recovering_metric_is_not_failed() {
    let metric = Arc::new(
        ScriptedMetric::new("eventually")
            .then_fail(transient())
            .then_score(0.9),
    );
    let eval = evaluator(vec![metric.clone()], RunPolicy::default());

    let record = eval.evaluate(handle()).await;
    assert!(!record.degraded);
    assert_eq!(record.net_score, 0.9);
    assert_eq!(metric.calls(), 2);
    assert_eq!(record.metrics["eventually"].latency_ms, 500);
}
