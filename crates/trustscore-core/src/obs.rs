//! Structured observability hooks for evaluation run lifecycle events.
//!
//! This module provides:
//! - Run-scoped tracing spans via the `RunSpan` RAII guard
//! - Emission functions for the diagnostic events the engine reports:
//!   run start/finish, retries, metric failures, degraded evaluations and
//!   rejected or skipped references
//!
//! Events are emitted through `tracing`; filtering and formatting are up to
//! the subscriber installed by [`crate::telemetry::init_tracing`].

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::EvalError;
use crate::executor::MetricFailure;
use crate::record::{EvaluationRecord, RejectionRecord, RunSummary, SkipNotice};

/// RAII guard that enters a run-scoped tracing span for the duration of a run.
///
/// # Example
///
/// ```ignore
/// let span = RunSpan::enter_new();
/// // every event logged from here on carries run_id = span.run_id()
/// ```
pub struct RunSpan {
    run_id: String,
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    /// Create and enter a span tagged with `run_id`.
    pub fn enter(run_id: &str) -> Self {
        let span = tracing::info_span!("trustscore.run", run_id = %run_id);
        Self {
            run_id: run_id.to_string(),
            _span: span.entered(),
        }
    }

    /// Enter a span with a fresh random run id.
    pub fn enter_new() -> Self {
        Self::enter(&Uuid::new_v4().to_string())
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}

/// Emit event: run started.
pub fn emit_run_started(run_id: &str, source: &str, max_concurrent_artifacts: usize) {
    info!(
        event = "run.started",
        run_id = %run_id,
        source = %source,
        max_concurrent_artifacts = max_concurrent_artifacts,
    );
}

/// Emit event: run finished with its tallies.
pub fn emit_run_finished(run_id: &str, summary: &RunSummary) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = summary.duration_ms(),
        evaluated = summary.evaluated,
        degraded = summary.degraded,
        rejected = summary.rejected,
        skipped = summary.skipped,
    );
}

/// Emit event: a failed call will be attempted again after `delay_ms`.
pub fn emit_retry_scheduled(
    operation: &str,
    identity: &str,
    attempt: u32,
    delay_ms: u64,
    error: &EvalError,
) {
    warn!(
        event = "call.retry_scheduled",
        operation = %operation,
        identity = %identity,
        attempt = attempt,
        delay_ms = delay_ms,
        error = %error,
    );
}

/// Emit event: a metric ended in failure and contributes 0.
pub fn emit_metric_failed(identity: &str, metric: &str, failure: &MetricFailure) {
    warn!(
        event = "metric.failed",
        identity = %identity,
        metric = %metric,
        kind = %failure.error.kind(),
        attempts = failure.attempts,
        elapsed_ms = failure.elapsed_ms,
        error = %failure.error,
    );
}

/// Emit event: at least one metric of the record failed.
pub fn emit_degraded_evaluation(record: &EvaluationRecord) {
    let failed: Vec<&str> = record.failed_metrics().collect();
    warn!(
        event = "evaluation.degraded",
        identity = %record.identity,
        failed = ?failed,
        total = record.metrics.len(),
        net_score = record.net_score,
    );
}

pub fn emit_artifact_evaluated(record: &EvaluationRecord) {
    debug!(
        event = "evaluation.completed",
        identity = %record.identity,
        category = %record.category,
        net_score = record.net_score,
        latency_max_ms = record.net_score_latency_ms,
        latency_sum_ms = record.latency_sum_ms,
        context_latency_ms = record.context_latency_ms,
    );
}

/// Emit event: a reference was recognized as a URL but not as an artifact.
pub fn emit_reference_skipped(notice: &SkipNotice) {
    warn!(
        event = "reference.skipped",
        line = notice.line,
        reference = %notice.reference,
        reason = notice.reason.as_str(),
        detail = %notice.detail,
    );
}

/// Emit event: a reference failed validation and was recorded as rejected.
pub fn emit_reference_rejected(record: &RejectionRecord) {
    warn!(
        event = "reference.rejected",
        line = record.line,
        reference = %record.reference,
        error = %record.error.message,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_span_create() {
        let span = RunSpan::enter("test-run-id");
        assert_eq!(span.run_id(), "test-run-id");
    }

    #[test]
    fn test_run_span_generates_uuid() {
        let span = RunSpan::enter_new();
        assert!(Uuid::parse_str(span.run_id()).is_ok());
    }
}
