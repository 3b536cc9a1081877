//! Run-wide timeout, retry and concurrency policy.
//!
//! A [`RunPolicy`] is built once at startup, validated, and then shared
//! read-only (`Arc<RunPolicy>`) with every component that needs it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// What the scheduler does with a reference that fails classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReferencePolicy {
    /// Emit a standalone validation-failure record in the reference's position.
    #[default]
    Record,
    /// Emit only a skip notice.
    Skip,
}

/// Immutable configuration for one evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunPolicy {
    /// Time allowed to establish a connection to a remote (milliseconds).
    pub connect_timeout_ms: u64,
    /// Time allowed to read a response once connected (milliseconds).
    pub read_timeout_ms: u64,
    /// Hard wall-clock budget for one call, retries and backoff included (milliseconds).
    pub total_timeout_ms: u64,
    /// Maximum number of retries after the first attempt (0 = run once).
    pub max_retries: u32,
    /// Delay before the first retry (milliseconds).
    pub backoff_base_ms: u64,
    /// Multiplier applied to the delay after every retry. Must be > 1.
    pub backoff_factor: f64,
    /// Maximum number of artifacts evaluated at the same time.
    pub max_concurrent_artifacts: usize,
    /// Maximum number of metrics running at the same time for one artifact.
    /// `None` means every applicable metric starts at once.
    pub max_concurrent_metrics_per_artifact: Option<usize>,
    /// Handling of references that are not valid URLs.
    pub on_invalid_reference: InvalidReferencePolicy,
}

impl Default for RunPolicy {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            read_timeout_ms: 30_000,
            total_timeout_ms: 45_000,
            max_retries: 3,
            backoff_base_ms: 500,
            backoff_factor: 2.0,
            max_concurrent_artifacts: 8,
            max_concurrent_metrics_per_artifact: None,
            on_invalid_reference: InvalidReferencePolicy::Record,
        }
    }
}

impl RunPolicy {
    /// Check every invariant the executor and scheduler rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("read_timeout_ms", self.read_timeout_ms),
            ("total_timeout_ms", self.total_timeout_ms),
            ("backoff_base_ms", self.backoff_base_ms),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidPolicy {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        if self.connect_timeout_ms > self.total_timeout_ms {
            return Err(ConfigError::InvalidPolicy {
                field: "connect_timeout_ms",
                reason: format!(
                    "{}ms exceeds total_timeout_ms ({}ms)",
                    self.connect_timeout_ms, self.total_timeout_ms
                ),
            });
        }

        if !self.backoff_factor.is_finite() || self.backoff_factor <= 1.0 {
            return Err(ConfigError::InvalidPolicy {
                field: "backoff_factor",
                reason: format!("must be a finite number > 1.0, got {}", self.backoff_factor),
            });
        }

        if self.max_concurrent_artifacts == 0 {
            return Err(ConfigError::InvalidPolicy {
                field: "max_concurrent_artifacts",
                reason: "must be at least 1".to_string(),
            });
        }

        if self.max_concurrent_metrics_per_artifact == Some(0) {
            return Err(ConfigError::InvalidPolicy {
                field: "max_concurrent_metrics_per_artifact",
                reason: "must be at least 1 when set".to_string(),
            });
        }

        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn total_timeout(&self) -> Duration {
        Duration::from_millis(self.total_timeout_ms)
    }

    /// Delay before retry number `retry` (0-based):
    /// `backoff_base_ms * backoff_factor^retry`.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let ms = self.backoff_base_ms as f64 * self.backoff_factor.powi(exponent);
        if ms.is_finite() && ms < u64::MAX as f64 {
            Duration::from_millis(ms as u64)
        } else {
            Duration::from_millis(u64::MAX)
        }
    }
}
