//! HTTP [`ArtifactFetcher`]s for the HuggingFace Hub and GitHub.
//!
//! Every fetcher fills the normalized metadata fields in
//! [`trustscore_core::context::fields`] and keeps the unmodified API response
//! under `raw`. Timeouts and retries are enforced by the core executor; the
//! client only carries the connect/read/request timeouts from the policy.
//!
//! [`ArtifactFetcher`]: trustscore_core::ArtifactFetcher

pub mod config;
pub mod error;
pub mod github;
pub mod http;
pub mod hub;
pub mod router;

pub use config::FetchConfig;
pub use error::{status_error, transport_error, ClientError};
pub use github::GitHubFetcher;
pub use http::HttpClient;
pub use hub::HubFetcher;
pub use router::HostRouter;

use trustscore_core::{ArtifactHandle, Category};
use url::Url;

/// Repository id as the remote spells it.
///
/// Handle identities are lowercased, but Hub ids are case-sensitive, so the
/// id is re-read from the original reference when possible.
pub fn remote_id(handle: &ArtifactHandle) -> String {
    let from_reference = Url::parse(handle.source_reference().trim())
        .ok()
        .and_then(|url| {
            let segments: Vec<String> = url
                .path_segments()?
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            let rest = match (handle.category(), segments.first()) {
                (Category::Dataset, Some(first)) if first.eq_ignore_ascii_case("datasets") => &segments[1..],
                _ => &segments[..],
            };
            let take = rest.len().min(2);
            let id = rest[..take]
                .iter()
                .map(|s| s.strip_suffix(".git").unwrap_or(s))
                .collect::<Vec<_>>()
                .join("/");
            Some(id).filter(|id| id.eq_ignore_ascii_case(handle.identity()))
        });
    from_reference.unwrap_or_else(|| handle.identity().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_id_keeps_original_case() {
        let handle = ArtifactHandle::new(
            Category::Model,
            "huggingface.co",
            "qwen/qwen2-7b",
            "https://huggingface.co/Qwen/Qwen2-7B/tree/main",
        );
        assert_eq!(remote_id(&handle), "Qwen/Qwen2-7B");

        let handle = ArtifactHandle::new(
            Category::Dataset,
            "huggingface.co",
            "squad",
            "https://huggingface.co/datasets/squad",
        );
        assert_eq!(remote_id(&handle), "squad");

        let handle = ArtifactHandle::new(
            Category::Code,
            "github.com",
            "owner/repo",
            "https://github.com/Owner/Repo.git",
        );
        assert_eq!(remote_id(&handle), "Owner/Repo");
    }

    #[test]
    fn test_remote_id_falls_back_to_identity() {
        let handle = ArtifactHandle::new(Category::Model, "huggingface.co", "a/b", "not a url");
        assert_eq!(remote_id(&handle), "a/b");
    }
}
