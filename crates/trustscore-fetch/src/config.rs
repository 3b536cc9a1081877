//! HTTP client configuration.

use std::time::Duration;

use trustscore_core::RunPolicy;

pub const DEFAULT_HUB_BASE: &str = "https://huggingface.co";
pub const DEFAULT_GITHUB_API_BASE: &str = "https://api.github.com";

/// Timeouts, credentials and endpoints shared by every fetcher.
#[derive(Clone, PartialEq)]
pub struct FetchConfig {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// Per-request ceiling. The executor enforces the run-wide budget on top.
    pub request_timeout: Duration,
    pub user_agent: String,
    pub huggingface_token: Option<String>,
    pub github_token: Option<String>,
    /// Base of both the Hub API (`/api/...`) and raw file URLs.
    pub hub_base: String,
    pub github_api_base: String,
}

impl std::fmt::Debug for FetchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchConfig")
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("user_agent", &self.user_agent)
            .field("huggingface_token", &self.huggingface_token.as_ref().map(|_| "***"))
            .field("github_token", &self.github_token.as_ref().map(|_| "***"))
            .field("hub_base", &self.hub_base)
            .field("github_api_base", &self.github_api_base)
            .finish()
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::from_policy(&RunPolicy::default())
    }
}

impl FetchConfig {
    /// Client timeouts taken from the run policy.
    pub fn from_policy(policy: &RunPolicy) -> Self {
        Self {
            connect_timeout: policy.connect_timeout(),
            read_timeout: policy.read_timeout(),
            request_timeout: policy.total_timeout(),
            user_agent: format!("trustscore/{}", env!("CARGO_PKG_VERSION")),
            huggingface_token: None,
            github_token: None,
            hub_base: DEFAULT_HUB_BASE.to_string(),
            github_api_base: DEFAULT_GITHUB_API_BASE.to_string(),
        }
    }

    pub fn with_huggingface_token(mut self, token: impl Into<String>) -> Self {
        self.huggingface_token = Some(token.into()).filter(|t: &String| !t.is_empty());
        self
    }

    pub fn with_github_token(mut self, token: impl Into<String>) -> Self {
        self.github_token = Some(token.into()).filter(|t: &String| !t.is_empty());
        self
    }
}
