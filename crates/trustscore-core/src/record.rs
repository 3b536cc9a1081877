//! Output records: what the scheduler yields and the CLI serializes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::artifact::Category;
use crate::error::{ErrorKind, EvalError};
use crate::executor::MetricOutcome;

fn is_false(b: &bool) -> bool {
    !*b
}

/// Diagnostic attached to a failed metric entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricErrorSummary {
    pub kind: ErrorKind,
    pub message: String,
    pub attempts: u32,
}

/// One metric's contribution to an [`EvaluationRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEntry {
    pub score: f64,
    pub latency_ms: u64,
    pub failed: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub breakdown: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<MetricErrorSummary>,
}

impl From<&MetricOutcome> for MetricEntry {
    fn from(outcome: &MetricOutcome) -> Self {
        match outcome {
            MetricOutcome::Scored(s) => MetricEntry {
                score: s.score,
                latency_ms: s.elapsed_ms,
                failed: false,
                breakdown: s.breakdown.clone(),
                error: None,
            },
            MetricOutcome::Failed(f) => MetricEntry {
                score: 0.0,
                latency_ms: f.elapsed_ms,
                failed: true,
                breakdown: BTreeMap::new(),
                error: Some(MetricErrorSummary {
                    kind: f.error.kind(),
                    message: f.error.to_string(),
                    attempts: f.attempts,
                }),
            },
        }
    }
}

/// Final result for one artifact. Always holds one entry per applicable metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub identity: String,
    pub category: Category,
    pub net_score: f64,
    /// Slowest metric; metrics run concurrently.
    pub net_score_latency_ms: u64,
    pub metrics: BTreeMap<String, MetricEntry>,
    /// At least one metric failed.
    #[serde(default, skip_serializing_if = "is_false")]
    pub degraded: bool,
    /// Sum of per-metric latencies. Informational.
    #[serde(skip)]
    pub latency_sum_ms: u64,
    /// Time spent building the shared context.
    #[serde(skip)]
    pub context_latency_ms: u64,
}

impl EvaluationRecord {
    pub fn failed_metrics(&self) -> impl Iterator<Item = &str> {
        self.metrics
            .iter()
            .filter(|(_, e)| e.failed)
            .map(|(name, _)| name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectionError {
    pub kind: ErrorKind,
    pub message: String,
    pub expected: String,
}

/// A reference that failed classification, emitted in its input position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectionRecord {
    pub reference: String,
    pub line: usize,
    pub error: RejectionError,
}

impl RejectionRecord {
    pub fn new(reference: impl Into<String>, line: usize, err: &EvalError) -> Self {
        let expected = err.context().remove("expected").unwrap_or_default();
        Self {
            reference: reference.into(),
            line,
            error: RejectionError {
                kind: err.kind(),
                message: err.message().to_string(),
                expected,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Valid URL that no classifier rule recognizes.
    Unsupported,
    /// Invalid reference dropped under the `skip` policy.
    Invalid,
    /// The evaluation task ended without producing a record.
    Aborted,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Unsupported => "unsupported",
            SkipReason::Invalid => "invalid",
            SkipReason::Aborted => "aborted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipNotice {
    pub reference: String,
    pub line: usize,
    pub reason: SkipReason,
    pub detail: String,
}

/// One element of the scheduler's output stream.
#[derive(Debug, Clone, PartialEq)]
pub enum RunItem {
    Evaluated { line: usize, record: EvaluationRecord },
    Rejected(RejectionRecord),
    Skipped(SkipNotice),
}

impl RunItem {
    /// 1-based input line this item answers.
    pub fn line(&self) -> usize {
        match self {
            RunItem::Evaluated { line, .. } => *line,
            RunItem::Rejected(r) => r.line,
            RunItem::Skipped(s) => s.line,
        }
    }

    pub fn as_record(&self) -> Option<&EvaluationRecord> {
        match self {
            RunItem::Evaluated { record, .. } => Some(record),
            _ => None,
        }
    }

    /// NDJSON line for stdout. Skip notices are never written.
    pub fn to_ndjson(&self) -> serde_json::Result<Option<String>> {
        match self {
            RunItem::Evaluated { record, .. } => serde_json::to_string(record).map(Some),
            RunItem::Rejected(r) => serde_json::to_string(r).map(Some),
            RunItem::Skipped(_) => Ok(None),
        }
    }
}

/// Tallies over a completed (or in-progress) run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub evaluated: u64,
    pub degraded: u64,
    pub rejected: u64,
    pub skipped: u64,
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::start()
    }
}

impl RunSummary {
    pub fn start() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            evaluated: 0,
            degraded: 0,
            rejected: 0,
            skipped: 0,
        }
    }

    pub fn observe(&mut self, item: &RunItem) {
        match item {
            RunItem::Evaluated { record, .. } => {
                self.evaluated += 1;
                if record.degraded {
                    self.degraded += 1;
                }
            }
            RunItem::Rejected(_) => self.rejected += 1,
            RunItem::Skipped(_) => self.skipped += 1,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn duration_ms(&self) -> u64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        u64::try_from((end - self.started_at).num_milliseconds()).unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.evaluated + self.rejected + self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExternalCallKind;
    use crate::executor::ScoredMetric;
    use serde_json::{json, Value};

    fn record(degraded: bool) -> EvaluationRecord {
        let mut metrics = BTreeMap::new();
        metrics.insert(
            "license".to_string(),
            MetricEntry::from(&MetricOutcome::Scored(ScoredMetric {
                score: 1.0,
                breakdown: BTreeMap::new(),
                elapsed_ms: 12,
                attempts: 1,
            })),
        );
        metrics.insert(
            "bus_factor".to_string(),
            MetricEntry::from(&MetricOutcome::failed(
                EvalError::external("github", "contributors", ExternalCallKind::Server, "502"),
                4,
                900,
            )),
        );
        EvaluationRecord {
            identity: "org/model".to_string(),
            category: Category::Model,
            net_score: 0.5,
            net_score_latency_ms: 900,
            metrics,
            degraded,
            latency_sum_ms: 912,
            context_latency_ms: 40,
        }
    }

    #[test]
    fn test_evaluated_record_shape() {
        let line = RunItem::Evaluated {
            line: 3,
            record: record(true),
        }
        .to_ndjson()
        .unwrap()
        .unwrap();
        let v: Value = serde_json::from_str(&line).unwrap();

        assert_eq!(v["identity"], "org/model");
        assert_eq!(v["category"], "MODEL");
        assert_eq!(v["net_score"], 0.5);
        assert_eq!(v["net_score_latency_ms"], 900);
        assert_eq!(v["degraded"], true);
        assert_eq!(
            v["metrics"]["license"],
            json!({"score": 1.0, "latency_ms": 12, "failed": false})
        );
        assert_eq!(v["metrics"]["bus_factor"]["failed"], true);
        assert_eq!(v["metrics"]["bus_factor"]["score"], 0.0);
        assert_eq!(v["metrics"]["bus_factor"]["error"]["kind"], "EXTERNAL_CALL");
        assert_eq!(v["metrics"]["bus_factor"]["error"]["attempts"], 4);
        assert!(v.get("latency_sum_ms").is_none());
        assert!(v.get("context_latency_ms").is_none());
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_degraded_flag_omitted_when_false() {
        let v = serde_json::to_value(record(false)).unwrap();
        assert!(v.get("degraded").is_none());
    }

    #[test]
    fn test_rejection_record_shape() {
        let err = EvalError::invalid_reference("not-a-url", "relative URL without a base");
        let item = RunItem::Rejected(RejectionRecord::new("not-a-url", 4, &err));
        let v: Value = serde_json::from_str(&item.to_ndjson().unwrap().unwrap()).unwrap();
        assert_eq!(v["reference"], "not-a-url");
        assert_eq!(v["line"], 4);
        assert_eq!(v["error"]["kind"], "VALIDATION");
        assert_eq!(v["error"]["expected"], "absolute http(s) URL");
        assert_eq!(item.line(), 4);
    }

    #[test]
    fn test_skip_notice_not_serialized() {
        let item = RunItem::Skipped(SkipNotice {
            reference: "https://example.com".into(),
            line: 1,
            reason: SkipReason::Unsupported,
            detail: "no rule matches".into(),
        });
        assert_eq!(item.to_ndjson().unwrap(), None);
    }

    #[test]
    fn test_summary_observes_items() {
        let mut summary = RunSummary::start();
        summary.observe(&RunItem::Evaluated {
            line: 1,
            record: record(true),
        });
        summary.observe(&RunItem::Evaluated {
            line: 2,
            record: record(false),
        });
        summary.observe(&RunItem::Skipped(SkipNotice {
            reference: "x".into(),
            line: 3,
            reason: SkipReason::Invalid,
            detail: String::new(),
        }));
        summary.finish();

        assert_eq!(summary.evaluated, 2);
        assert_eq!(summary.degraded, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.rejected, 0);
        assert_eq!(summary.total(), 3);
        assert!(summary.finished_at.is_some());
    }
}
