//! Error taxonomy shared by every evaluation component.
//!
//! Only three kinds of failure ever cross a component boundary:
//!
//! - [`ErrorKind::Validation`]: malformed or unsupported input. Never retried.
//! - [`ErrorKind::ExternalCall`]: a remote dependency failed. Retried by the
//!   executor when the [`ExternalCallKind`] is transient.
//! - [`ErrorKind::Computation`]: a metric's own logic failed, including
//!   returning a score outside `[0, 1]` or panicking. Never retried.
//!
//! [`ConfigError`] is separate: it is only produced while loading the run
//! configuration, before any evaluation starts, and is fatal to the run.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The three failure classes an evaluation can record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    ExternalCall,
    Computation,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::ExternalCall => "EXTERNAL_CALL",
            ErrorKind::Computation => "COMPUTATION",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What went wrong with a remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalCallKind {
    /// The call did not finish within its time budget.
    Timeout,
    /// The connection could not be established or was reset.
    Connection,
    /// The remote asked us to slow down (HTTP 429).
    RateLimited,
    /// The artifact does not exist on the remote.
    NotFound,
    /// The remote failed on its side (HTTP 5xx).
    Server,
    /// The remote answered with something we could not use.
    Protocol,
}

impl ExternalCallKind {
    /// Transient failures are the only ones worth repeating.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ExternalCallKind::Timeout
                | ExternalCallKind::Connection
                | ExternalCallKind::RateLimited
                | ExternalCallKind::Server
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExternalCallKind::Timeout => "timeout",
            ExternalCallKind::Connection => "connection",
            ExternalCallKind::RateLimited => "rate_limited",
            ExternalCallKind::NotFound => "not_found",
            ExternalCallKind::Server => "server",
            ExternalCallKind::Protocol => "protocol",
        }
    }
}

impl fmt::Display for ExternalCallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified evaluation failure with structured context.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("invalid {field}: {message} (expected {expected})")]
    Validation {
        field: String,
        value: String,
        expected: String,
        message: String,
    },

    #[error("{service} {operation} failed ({kind}): {message}")]
    ExternalCall {
        service: String,
        operation: String,
        kind: ExternalCallKind,
        status: Option<u16>,
        message: String,
    },

    #[error("{metric} failed during {step}: {message}")]
    Computation {
        metric: String,
        step: String,
        message: String,
    },
}

impl EvalError {
    pub fn validation(
        field: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        EvalError::Validation {
            field: field.into(),
            value: value.into(),
            expected: expected.into(),
            message: message.into(),
        }
    }

    /// A reference string that is not a usable absolute URL.
    pub fn invalid_reference(raw: &str, reason: impl Into<String>) -> Self {
        Self::validation("reference", raw, "absolute http(s) URL", reason)
    }

    pub fn external(
        service: impl Into<String>,
        operation: impl Into<String>,
        kind: ExternalCallKind,
        message: impl Into<String>,
    ) -> Self {
        EvalError::ExternalCall {
            service: service.into(),
            operation: operation.into(),
            kind,
            status: None,
            message: message.into(),
        }
    }

    /// Attach an HTTP status to an external-call error. No-op on other kinds.
    pub fn with_status(mut self, code: u16) -> Self {
        if let EvalError::ExternalCall { status, .. } = &mut self {
            *status = Some(code);
        }
        self
    }

    /// The hard deadline for a call expired.
    pub fn deadline_exceeded(operation: impl Into<String>, limit_ms: u64) -> Self {
        Self::external(
            "executor",
            operation,
            ExternalCallKind::Timeout,
            format!("deadline of {limit_ms}ms exceeded"),
        )
    }

    pub fn computation(
        metric: impl Into<String>,
        step: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        EvalError::Computation {
            metric: metric.into(),
            step: step.into(),
            message: message.into(),
        }
    }

    /// A metric produced a score outside `[0, 1]` (or NaN).
    pub fn score_out_of_range(metric: &str, field: &str, score: f64) -> Self {
        Self::computation(
            metric,
            "score_validation",
            format!("{field} must be within [0, 1], got {score}"),
        )
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EvalError::Validation { .. } => ErrorKind::Validation,
            EvalError::ExternalCall { .. } => ErrorKind::ExternalCall,
            EvalError::Computation { .. } => ErrorKind::Computation,
        }
    }

    /// Whether the executor may repeat the call that produced this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            EvalError::ExternalCall { kind, .. } => kind.is_transient(),
            _ => false,
        }
    }

    /// The human-readable message without the structured context.
    pub fn message(&self) -> &str {
        match self {
            EvalError::Validation { message, .. }
            | EvalError::ExternalCall { message, .. }
            | EvalError::Computation { message, .. } => message,
        }
    }

    /// Structured context as flat key/value pairs, for records and logs.
    pub fn context(&self) -> BTreeMap<String, String> {
        let mut ctx = BTreeMap::new();
        match self {
            EvalError::Validation {
                field,
                value,
                expected,
                ..
            } => {
                ctx.insert("field".to_string(), field.clone());
                ctx.insert("value".to_string(), value.clone());
                ctx.insert("expected".to_string(), expected.clone());
            }
            EvalError::ExternalCall {
                service,
                operation,
                kind,
                status,
                ..
            } => {
                ctx.insert("service".to_string(), service.clone());
                ctx.insert("operation".to_string(), operation.clone());
                ctx.insert("call_kind".to_string(), kind.to_string());
                if let Some(code) = status {
                    ctx.insert("status".to_string(), code.to_string());
                }
            }
            EvalError::Computation { metric, step, .. } => {
                ctx.insert("metric".to_string(), metric.clone());
                ctx.insert("step".to_string(), step.clone());
            }
        }
        ctx
    }
}

/// Result type for evaluation operations.
pub type Result<T> = std::result::Result<T, EvalError>;

/// Invalid run configuration. Always fatal, always raised before evaluation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid policy value for {field}: {reason}")]
    InvalidPolicy { field: &'static str, reason: String },

    #[error("metric {metric} has no configured weight")]
    MissingWeight { metric: String },

    #[error("weight configured for unknown metric {metric}")]
    UnknownWeight { metric: String },

    #[error("invalid weight {weight} for metric {metric}")]
    InvalidWeight { metric: String, weight: f64 },

    #[error("weights of metrics applicable to {category} sum to zero")]
    ZeroWeightTotal { category: String },

    #[error("metric registered twice: {0}")]
    DuplicateMetric(String),

    #[error("invalid classifier rule: {0}")]
    InvalidRule(String),
}
