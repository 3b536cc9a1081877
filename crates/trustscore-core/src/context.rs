//! Shared artifact context and the fetcher contract that builds it.
//!
//! An [`ArtifactContext`] is fetched once per artifact and handed read-only
//! (`Arc<ArtifactContext>`) to every metric scoring that artifact.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::artifact::ArtifactHandle;
use crate::error::{EvalError, ExternalCallKind};

/// One file in the artifact's repository listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Repository-relative path using `/` separators.
    pub path: String,
    /// Size in bytes, when the remote reports it.
    pub size: Option<u64>,
}

impl FileEntry {
    pub fn new(path: impl Into<String>, size: Option<u64>) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }

    /// Final path component, lowercased.
    pub fn file_name(&self) -> String {
        self.path
            .rsplit('/')
            .next()
            .unwrap_or(&self.path)
            .to_ascii_lowercase()
    }

    /// Lowercased extension without the dot, if any.
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name();
        name.rsplit_once('.')
            .filter(|(stem, _)| !stem.is_empty())
            .map(|(_, ext)| ext.to_string())
    }
}

/// JSON pointers of the normalized metadata fields fetchers fill in and
/// metrics read. Absent fields mean the remote did not report them.
pub mod fields {
    /// Likes or stars.
    pub const LIKES: &str = "/likes";
    /// Downloads, or forks for code hosts without download counts.
    pub const DOWNLOADS: &str = "/downloads";
    /// Number of distinct contributors.
    pub const CONTRIBUTORS: &str = "/contributors";
    /// License identifier or name as declared by the remote.
    pub const LICENSE: &str = "/license";
    /// Unmodified API response.
    pub const RAW: &str = "/raw";
}

/// Metadata and content fetched for one artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactContext {
    readme: Option<String>,
    files: Vec<FileEntry>,
    metadata: Value,
}

impl ArtifactContext {
    pub fn new(readme: Option<String>, files: Vec<FileEntry>, metadata: Value) -> Self {
        Self {
            readme,
            files,
            metadata,
        }
    }

    pub fn with_readme(mut self, readme: impl Into<String>) -> Self {
        self.readme = Some(readme.into());
        self
    }

    pub fn with_file(mut self, path: impl Into<String>, size: Option<u64>) -> Self {
        self.files.push(FileEntry::new(path, size));
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn readme(&self) -> Option<&str> {
        self.readme.as_deref()
    }

    /// README text, or `""` when the artifact has none.
    pub fn readme_text(&self) -> &str {
        self.readme.as_deref().unwrap_or_default()
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    /// Raw API metadata as returned by the remote.
    pub fn metadata(&self) -> &Value {
        &self.metadata
    }

    /// Look up an unsigned integer by JSON pointer (e.g. `/downloads`).
    pub fn metadata_u64(&self, pointer: &str) -> Option<u64> {
        self.metadata.pointer(pointer).and_then(Value::as_u64)
    }

    /// Look up a string by JSON pointer (e.g. `/cardData/license`).
    pub fn metadata_str(&self, pointer: &str) -> Option<&str> {
        self.metadata.pointer(pointer).and_then(Value::as_str)
    }

    /// Files satisfying `pred`.
    pub fn files_where<'a, F>(&'a self, pred: F) -> impl Iterator<Item = &'a FileEntry> + 'a
    where
        F: Fn(&FileEntry) -> bool + 'a,
    {
        self.files.iter().filter(move |f| pred(f))
    }
}

/// Why a fetcher could not build a context.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("{service}: artifact {identity} not found")]
    NotFound { service: String, identity: String },

    #[error("{service}: transient failure ({kind}): {message}")]
    Transient {
        service: String,
        kind: ExternalCallKind,
        status: Option<u16>,
        message: String,
    },

    #[error("{service}: request rejected with status {status}: {message}")]
    Rejected {
        service: String,
        status: u16,
        message: String,
    },

    #[error("{service}: malformed response: {message}")]
    Malformed { service: String, message: String },

    #[error("no fetcher serves host {host}")]
    UnsupportedHost { host: String },
}

impl From<FetchError> for EvalError {
    fn from(err: FetchError) -> Self {
        const OP: &str = "fetch_context";
        match err {
            FetchError::NotFound { service, identity } => EvalError::external(
                service,
                OP,
                ExternalCallKind::NotFound,
                format!("artifact {identity} not found"),
            )
            .with_status(404),
            FetchError::Transient {
                service,
                kind,
                status,
                message,
            } => {
                let err = EvalError::external(service, OP, kind, message);
                match status {
                    Some(code) => err.with_status(code),
                    None => err,
                }
            }
            FetchError::Rejected {
                service,
                status,
                message,
            } => EvalError::external(service, OP, ExternalCallKind::Protocol, message)
                .with_status(status),
            FetchError::Malformed { service, message } => {
                EvalError::external(service, OP, ExternalCallKind::Protocol, message)
            }
            FetchError::UnsupportedHost { host } => EvalError::validation(
                "host",
                host,
                "host served by a configured fetcher",
                "no fetcher serves this host",
            ),
        }
    }
}

/// Source of artifact metadata and content.
///
/// Implementations perform the network I/O; the evaluator wraps every call in
/// the run's timeout and retry policy, so fetchers must be safe to call again
/// after a failure.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    async fn fetch(&self, handle: &ArtifactHandle) -> Result<ArtifactContext, FetchError>;
}
