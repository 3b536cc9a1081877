//! Dispatch by artifact host.

use std::sync::Arc;

use async_trait::async_trait;
use trustscore_core::{ArtifactContext, ArtifactFetcher, ArtifactHandle, FetchError};

use crate::config::FetchConfig;
use crate::error::Result;
use crate::github::GitHubFetcher;
use crate::http::HttpClient;
use crate::hub::HubFetcher;

/// Routes each handle to the fetcher registered for its host.
#[derive(Clone, Default)]
pub struct HostRouter {
    routes: Vec<(String, Arc<dyn ArtifactFetcher>)>,
}

impl std::fmt::Debug for HostRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hosts: Vec<&str> = self.routes.iter().map(|(h, _)| h.as_str()).collect();
        f.debug_struct("HostRouter").field("hosts", &hosts).finish()
    }
}

impl HostRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// HuggingFace Hub and GitHub over one shared client.
    pub fn standard(config: FetchConfig) -> Result<Self> {
        let client = HttpClient::new(config)?;
        Ok(Self::new()
            .route("huggingface.co", Arc::new(HubFetcher::new(client.clone())))
            .route("github.com", Arc::new(GitHubFetcher::new(client))))
    }

    /// Serve `host` with `fetcher`. A later route for the same host replaces
    /// the earlier one.
    pub fn route(mut self, host: &str, fetcher: Arc<dyn ArtifactFetcher>) -> Self {
        let host = host.to_ascii_lowercase();
        self.routes.retain(|(h, _)| *h != host);
        self.routes.push((host, fetcher));
        self
    }

    pub fn hosts(&self) -> Vec<&str> {
        self.routes.iter().map(|(h, _)| h.as_str()).collect()
    }
}

#[async_trait]
impl ArtifactFetcher for HostRouter {
    async fn fetch(&self, handle: &ArtifactHandle) -> std::result::Result<ArtifactContext, FetchError> {
        match self.routes.iter().find(|(h, _)| h == handle.host()) {
            Some((_, fetcher)) => fetcher.fetch(handle).await,
            None => Err(FetchError::UnsupportedHost {
                host: handle.host().to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trustscore_core::fakes::StaticFetcher;
    use trustscore_core::Category;

    #[test]
    fn test_standard_routes() {
        let router = HostRouter::standard(FetchConfig::default()).unwrap();
        assert_eq!(router.hosts(), vec!["huggingface.co", "github.com"]);
    }

    #[tokio::test]
    async fn test_dispatch_by_host() {
        let ctx = ArtifactContext::default().with_metadata(json!({"likes": 3}));
        let router = HostRouter::new()
            .route("GitHub.com", Arc::new(StaticFetcher::new().with_context("a/b", ctx.clone())));

        let handle = ArtifactHandle::new(Category::Code, "github.com", "a/b", "https://github.com/a/b");
        assert_eq!(router.fetch(&handle).await.unwrap(), ctx);

        let handle = ArtifactHandle::new(Category::Code, "gitlab.com", "a/b", "https://gitlab.com/a/b");
        assert!(matches!(
            router.fetch(&handle).await,
            Err(FetchError::UnsupportedHost { host }) if host == "gitlab.com"
        ));
    }

    #[test]
    fn test_route_replaces_existing_host() {
        let router = HostRouter::new()
            .route("github.com", Arc::new(StaticFetcher::new()))
            .route("github.com", Arc::new(StaticFetcher::new()));
        assert_eq!(router.hosts(), vec!["github.com"]);
    }
}
