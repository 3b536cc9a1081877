//! Client construction errors and the HTTP-to-[`FetchError`] mapping.

use reqwest::StatusCode;
use thiserror::Error;
use trustscore_core::{ExternalCallKind, FetchError};

pub type Result<T> = std::result::Result<T, ClientError>;

/// The HTTP client could not be built.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),

    #[error("invalid base URL {url}: {reason}")]
    BaseUrl { url: String, reason: String },
}

/// Longest response excerpt carried in an error message.
const EXCERPT_CHARS: usize = 200;

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() > EXCERPT_CHARS {
        let cut: String = trimmed.chars().take(EXCERPT_CHARS).collect();
        format!("{cut}...")
    } else {
        trimmed.to_string()
    }
}

/// Map a non-success status to a [`FetchError`]. `None` for 2xx.
///
/// 404 is NotFound, 429 and 5xx are transient, any other 4xx is a
/// permanent rejection.
pub fn status_error(service: &str, identity: &str, status: StatusCode, body: &str) -> Option<FetchError> {
    if status.is_success() {
        return None;
    }
    let code = status.as_u16();
    let message = if body.trim().is_empty() {
        status.to_string()
    } else {
        format!("{status}: {}", excerpt(body))
    };
    Some(match status {
        StatusCode::NOT_FOUND => FetchError::NotFound {
            service: service.to_string(),
            identity: identity.to_string(),
        },
        StatusCode::TOO_MANY_REQUESTS => FetchError::Transient {
            service: service.to_string(),
            kind: ExternalCallKind::RateLimited,
            status: Some(code),
            message,
        },
        s if s.is_server_error() => FetchError::Transient {
            service: service.to_string(),
            kind: ExternalCallKind::Server,
            status: Some(code),
            message,
        },
        _ => FetchError::Rejected {
            service: service.to_string(),
            status: code,
            message,
        },
    })
}

/// Map a transport-level failure.
pub fn transport_error(service: &str, err: &reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Transient {
            service: service.to_string(),
            kind: ExternalCallKind::Timeout,
            status: None,
            message: err.to_string(),
        }
    } else if err.is_connect() || err.is_request() {
        FetchError::Transient {
            service: service.to_string(),
            kind: ExternalCallKind::Connection,
            status: None,
            message: err.to_string(),
        }
    } else if err.is_decode() || err.is_body() {
        FetchError::Malformed {
            service: service.to_string(),
            message: err.to_string(),
        }
    } else if let Some(status) = err.status() {
        status_error(service, "", status, "").unwrap_or_else(|| FetchError::Malformed {
            service: service.to_string(),
            message: err.to_string(),
        })
    } else {
        FetchError::Transient {
            service: service.to_string(),
            kind: ExternalCallKind::Connection,
            status: None,
            message: err.to_string(),
        }
    }
}

pub fn malformed(service: &str, what: &str, err: impl std::fmt::Display) -> FetchError {
    FetchError::Malformed {
        service: service.to_string(),
        message: format!("{what}: {err}"),
    }
}
