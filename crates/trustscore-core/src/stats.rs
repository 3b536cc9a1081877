//! Global atomic counters for evaluation runs.
//!
//! Counters are incremented silently at the call site. Call
//! [`RunStats::flush`] to emit current values as a single
//! `tracing::info!` event at the end of a run.

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide counters.
pub static RUN_STATS: RunStats = RunStats::new();

/// Lightweight atomic counters: no allocations, no locking.
pub struct RunStats {
    artifacts_evaluated: AtomicU64,
    degraded: AtomicU64,
    metric_failures: AtomicU64,
    retries: AtomicU64,
    timeouts: AtomicU64,
    references_rejected: AtomicU64,
    references_skipped: AtomicU64,
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub artifacts_evaluated: u64,
    pub degraded: u64,
    pub metric_failures: u64,
    pub retries: u64,
    pub timeouts: u64,
    pub references_rejected: u64,
    pub references_skipped: u64,
}

impl RunStats {
    pub const fn new() -> Self {
        Self {
            artifacts_evaluated: AtomicU64::new(0),
            degraded: AtomicU64::new(0),
            metric_failures: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            references_rejected: AtomicU64::new(0),
            references_skipped: AtomicU64::new(0),
        }
    }

    pub fn inc_artifacts_evaluated(&self) {
        self.artifacts_evaluated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_degraded(&self) {
        self.degraded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_metric_failures(&self) {
        self.metric_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_retries(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "retries", "counter incremented");
    }

    pub fn inc_timeouts(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "timeouts", "counter incremented");
    }

    pub fn inc_references_rejected(&self) {
        self.references_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_references_skipped(&self) {
        self.references_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            artifacts_evaluated: self.artifacts_evaluated.load(Ordering::Relaxed),
            degraded: self.degraded.load(Ordering::Relaxed),
            metric_failures: self.metric_failures.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            references_rejected: self.references_rejected.load(Ordering::Relaxed),
            references_skipped: self.references_skipped.load(Ordering::Relaxed),
        }
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        let s = self.snapshot();
        tracing::info!(
            counter = "flush",
            artifacts_evaluated = s.artifacts_evaluated,
            degraded = s.degraded,
            metric_failures = s.metric_failures,
            retries = s.retries,
            timeouts = s.timeouts,
            references_rejected = s.references_rejected,
            references_skipped = s.references_skipped,
        );
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        for counter in [
            &self.artifacts_evaluated,
            &self.degraded,
            &self.metric_failures,
            &self.retries,
            &self.timeouts,
            &self.references_rejected,
            &self.references_skipped,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
