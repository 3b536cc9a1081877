//! Trustscore Core Library
//!
//! Classifies artifact references, runs pluggable quality metrics against
//! each artifact under a shared timeout/retry policy, aggregates them into a
//! weighted NetScore, and streams one record per input reference in input
//! order.

pub mod artifact;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod fakes;
pub mod input;
pub mod metric;
pub mod obs;
pub mod policy;
pub mod record;
pub mod scheduler;
pub mod stats;
pub mod telemetry;

pub use artifact::{ArtifactHandle, Category, Classifier, ClassifierRule};
pub use context::{ArtifactContext, ArtifactFetcher, FetchError, FileEntry};
pub use error::{ConfigError, ErrorKind, EvalError, ExternalCallKind, Result};
pub use evaluator::{net_score, ArtifactEvaluator};
pub use executor::{
    call_with_policy, validate_score, Attempted, MetricExecutor, MetricFailure, MetricOutcome,
    ScoredMetric,
};
pub use input::{is_ignorable, reference_lines, split_lines, ReferenceLine};
pub use metric::{Metric, MetricRegistry, Score, WeightTable};
pub use policy::{InvalidReferencePolicy, RunPolicy};
pub use record::{
    EvaluationRecord, MetricEntry, MetricErrorSummary, RejectionError, RejectionRecord, RunItem,
    RunSummary, SkipNotice, SkipReason,
};
pub use scheduler::{OrderedBuffer, RecordStream, RunScheduler};
pub use stats::{RunStats, StatsSnapshot, RUN_STATS};

/// Crate version, reported in run logs.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
