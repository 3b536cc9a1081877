//! Execution controls: hard deadline, retry with exponential backoff, and
//! conversion of every failure (panics included) into a typed outcome.

use std::any::Any;
use std::collections::BTreeMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::Instant;

use crate::artifact::ArtifactHandle;
use crate::context::ArtifactContext;
use crate::error::{ErrorKind, EvalError};
use crate::metric::{Metric, Score};
use crate::obs;
use crate::policy::RunPolicy;
use crate::stats::RUN_STATS;

/// Result of one policy-controlled call, after every retry.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempted<T> {
    pub result: Result<T, EvalError>,
    /// Number of attempts started (1 = no retries used).
    pub attempts: u32,
    /// Wall-clock time from the first attempt to the last, backoff included.
    pub elapsed: Duration,
}

impl<T> Attempted<T> {
    pub fn elapsed_ms(&self) -> u64 {
        duration_ms(self.elapsed)
    }
}

pub(crate) fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Run `call` under `policy`: one hard deadline of `total_timeout` for the
/// whole sequence, retries only for transient external-call failures, at most
/// `max_retries` of them, and only while the next backoff still fits before
/// the deadline.
///
/// `operation` names the call in logs and in errors raised here (deadline
/// expiry, panics). `identity` is the artifact the call belongs to.
///
/// Never panics and never returns early with a raw error: the outcome always
/// carries the last cause, the attempt count and the elapsed time.
pub async fn call_with_policy<T, F, Fut>(
    policy: &RunPolicy,
    operation: &str,
    identity: &str,
    mut call: F,
) -> Attempted<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EvalError>>,
{
    let start = Instant::now();
    let deadline = start + policy.total_timeout();
    let mut attempts: u32 = 0;

    let result = loop {
        attempts += 1;
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            RUN_STATS.inc_timeouts();
            break Err(EvalError::deadline_exceeded(operation, policy.total_timeout_ms));
        }

        let attempt = AssertUnwindSafe(call()).catch_unwind();
        let err = match tokio::time::timeout(remaining, attempt).await {
            Ok(Ok(Ok(value))) => break Ok(value),
            Ok(Ok(Err(err))) => err,
            Ok(Err(payload)) => {
                break Err(EvalError::computation(
                    operation,
                    "evaluate",
                    format!("panicked: {}", panic_message(payload.as_ref())),
                ))
            }
            Err(_elapsed) => {
                RUN_STATS.inc_timeouts();
                break Err(EvalError::deadline_exceeded(operation, policy.total_timeout_ms));
            }
        };

        let retries_done = attempts - 1;
        if !err.is_retryable() || retries_done >= policy.max_retries {
            break Err(err);
        }

        let delay = policy.backoff_delay(retries_done);
        if Instant::now() + delay >= deadline {
            break Err(err);
        }

        RUN_STATS.inc_retries();
        obs::emit_retry_scheduled(operation, identity, attempts, duration_ms(delay), &err);
        tokio::time::sleep(delay).await;
    };

    Attempted {
        result,
        attempts,
        elapsed: start.elapsed(),
    }
}

/// Terminal result of running one metric against one artifact.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricOutcome {
    Scored(ScoredMetric),
    Failed(MetricFailure),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMetric {
    /// Validated into `[0, 1]`.
    pub score: f64,
    pub breakdown: BTreeMap<String, f64>,
    pub elapsed_ms: u64,
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricFailure {
    pub error: EvalError,
    pub attempts: u32,
    pub elapsed_ms: u64,
}

impl MetricOutcome {
    pub fn failed(error: EvalError, attempts: u32, elapsed_ms: u64) -> Self {
        MetricOutcome::Failed(MetricFailure {
            error,
            attempts,
            elapsed_ms,
        })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, MetricOutcome::Failed(_))
    }

    /// Score contributed to NetScore: 0 for a failure.
    pub fn score(&self) -> f64 {
        match self {
            MetricOutcome::Scored(s) => s.score,
            MetricOutcome::Failed(_) => 0.0,
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        match self {
            MetricOutcome::Scored(s) => s.elapsed_ms,
            MetricOutcome::Failed(f) => f.elapsed_ms,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            MetricOutcome::Scored(s) => s.attempts,
            MetricOutcome::Failed(f) => f.attempts,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            MetricOutcome::Scored(_) => None,
            MetricOutcome::Failed(f) => Some(f.error.kind()),
        }
    }
}

fn in_unit_range(v: f64) -> bool {
    (0.0..=1.0).contains(&v)
}

/// Reject scores outside `[0, 1]` instead of clamping them.
pub fn validate_score(metric: &str, score: Score) -> Result<Score, EvalError> {
    if !in_unit_range(score.value) {
        return Err(EvalError::score_out_of_range(metric, "score", score.value));
    }
    if let Some((part, value)) = score.breakdown.iter().find(|(_, v)| !in_unit_range(**v)) {
        return Err(EvalError::score_out_of_range(
            metric,
            &format!("breakdown.{part}"),
            *value,
        ));
    }
    Ok(score)
}

/// Runs metrics under the shared [`RunPolicy`].
#[derive(Debug, Clone)]
pub struct MetricExecutor {
    policy: Arc<RunPolicy>,
}

impl MetricExecutor {
    pub fn new(policy: Arc<RunPolicy>) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RunPolicy {
        &self.policy
    }

    /// Evaluate `metric` against `handle`/`context`, converting every failure
    /// into [`MetricOutcome::Failed`].
    pub async fn run(
        &self,
        metric: &dyn Metric,
        handle: &ArtifactHandle,
        context: &ArtifactContext,
    ) -> MetricOutcome {
        let name = metric.name();
        let attempted = call_with_policy(&self.policy, name, handle.identity(), || {
            metric.evaluate(handle, context)
        })
        .await;

        let elapsed_ms = attempted.elapsed_ms();
        let attempts = attempted.attempts;
        let outcome = match attempted.result.and_then(|score| validate_score(name, score)) {
            Ok(score) => MetricOutcome::Scored(ScoredMetric {
                score: score.value,
                breakdown: score.breakdown,
                elapsed_ms,
                attempts,
            }),
            Err(error) => MetricOutcome::failed(error, attempts, elapsed_ms),
        };

        record_failure(handle.identity(), name, &outcome);
        outcome
    }
}

/// Count and report `outcome` if it is a failure.
pub(crate) fn record_failure(identity: &str, metric: &str, outcome: &MetricOutcome) {
    if let MetricOutcome::Failed(failure) = outcome {
        RUN_STATS.inc_metric_failures();
        obs::emit_metric_failed(identity, metric, failure);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Category;
    use crate::error::ExternalCallKind;
    use crate::fakes::{FixedMetric, ScriptedMetric};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_retries: u32) -> RunPolicy {
        RunPolicy {
            total_timeout_ms: 10_000,
            connect_timeout_ms: 1_000,
            max_retries,
            backoff_base_ms: 100,
            backoff_factor: 2.0,
            ..RunPolicy::default()
        }
    }

    fn handle() -> ArtifactHandle {
        ArtifactHandle::new(
            Category::Model,
            "huggingface.co",
            "org/model",
            "https://huggingface.co/org/model",
        )
    }

    fn transient() -> EvalError {
        EvalError::external("hub", "fetch", ExternalCallKind::Server, "502 bad gateway")
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_succeeds_first_attempt() {
        let out = call_with_policy(&policy(2), "op", "id", || async { Ok::<_, EvalError>(7) }).await;
        assert_eq!(out.result, Ok(7));
        assert_eq!(out.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_retried_then_succeed() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();
        let out = call_with_policy(&policy(3), "op", "id", move || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(transient())
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(out.result, Ok("done"));
        assert_eq!(out.attempts, 3);
        // 100ms + 200ms of backoff on the paused clock.
        assert_eq!(out.elapsed_ms(), 300);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_transient_errors_never_retried() {
        for err in [
            EvalError::invalid_reference("x", "bad"),
            EvalError::computation("m", "divide", "division by zero"),
            EvalError::external("hub", "fetch", ExternalCallKind::NotFound, "gone"),
        ] {
            let calls = Arc::new(AtomicU32::new(0));
            let c = calls.clone();
            let e = err.clone();
            let out = call_with_policy(&policy(5), "op", "id", move || {
                c.fetch_add(1, Ordering::SeqCst);
                let e = e.clone();
                async move { Err::<(), _>(e) }
            })
            .await;
            assert_eq!(out.result, Err(err));
            assert_eq!(out.attempts, 1);
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_stops_when_backoff_would_cross_deadline() {
        let p = RunPolicy {
            total_timeout_ms: 1_000,
            connect_timeout_ms: 100,
            max_retries: 10,
            backoff_base_ms: 300,
            backoff_factor: 2.0,
            ..RunPolicy::default()
        };
        // Retries at +300ms and +900ms; the next one (1200ms) would not fit.
        let out = call_with_policy(&p, "op", "id", || async { Err::<(), _>(transient()) }).await;
        assert_eq!(out.attempts, 3);
        assert_eq!(out.result.unwrap_err().kind(), ErrorKind::ExternalCall);
        assert!(out.elapsed <= Duration::from_millis(1_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_call_fails_at_deadline() {
        let p = RunPolicy {
            total_timeout_ms: 2_000,
            connect_timeout_ms: 100,
            ..RunPolicy::default()
        };
        let out = call_with_policy(&p, "op", "id", || {
            futures::future::pending::<Result<(), EvalError>>()
        })
        .await;
        let err = out.result.as_ref().unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.context()["call_kind"], "timeout");
        assert_eq!(out.elapsed_ms(), 2_000);
    }

    #[tokio::test]
    async fn test_panic_becomes_computation_failure() {
        let out = call_with_policy(&policy(3), "boom", "id", || async {
            if true {
                panic!("metric exploded");
            }
            Ok::<(), EvalError>(())
        })
        .await;
        let err = out.result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Computation);
        assert!(err.to_string().contains("metric exploded"));
        assert_eq!(out.attempts, 1);
    }

    #[test]
    fn test_validate_score_rejects_out_of_range_and_nan() {
        assert!(validate_score("m", Score::new(0.0)).is_ok());
        assert!(validate_score("m", Score::new(1.0)).is_ok());
        for bad in [-0.01, 1.01, f64::NAN, f64::INFINITY] {
            let err = validate_score("m", Score::new(bad)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Computation);
        }
        let err = validate_score("size_score", Score::new(0.5).with_part("raspberry_pi", 2.0))
            .unwrap_err();
        assert!(err.to_string().contains("breakdown.raspberry_pi"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_executor_scores_metric() {
        let exec = MetricExecutor::new(Arc::new(policy(2)));
        let metric = FixedMetric::new("license", 0.75);
        let outcome = exec.run(&metric, &handle(), &ArtifactContext::default()).await;
        assert_eq!(outcome.score(), 0.75);
        assert!(!outcome.is_failed());
        assert_eq!(outcome.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_executor_out_of_range_score_fails_without_retry() {
        let exec = MetricExecutor::new(Arc::new(policy(3)));
        let metric = ScriptedMetric::new("greedy").then_score(1.5);
        let outcome = exec.run(&metric, &handle(), &ArtifactContext::default()).await;
        assert!(outcome.is_failed());
        assert_eq!(outcome.score(), 0.0);
        assert_eq!(outcome.error_kind(), Some(ErrorKind::Computation));
        assert_eq!(metric.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_executor_exhausts_retries() {
        let exec = MetricExecutor::new(Arc::new(policy(2)));
        let metric = ScriptedMetric::new("flaky").then_fail(transient());
        let outcome = exec.run(&metric, &handle(), &ArtifactContext::default()).await;
        match outcome {
            MetricOutcome::Failed(f) => {
                assert_eq!(f.attempts, 3);
                assert_eq!(f.error.kind(), ErrorKind::ExternalCall);
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(metric.calls(), 3);
    }
}
