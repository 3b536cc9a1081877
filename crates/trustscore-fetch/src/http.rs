//! Shared reqwest client with status and transport error mapping.

use std::sync::Arc;

use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use trustscore_core::FetchError;
use url::Url;

use crate::config::FetchConfig;
use crate::error::{malformed, status_error, transport_error, ClientError, Result};

/// Tracing target for HTTP fetch operations.
pub const TRACING_TARGET: &str = "trustscore_fetch::http";

struct HttpClientInner {
    http: Client,
    config: FetchConfig,
}

impl std::fmt::Debug for HttpClientInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClientInner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// One authenticated GET against a remote service.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Request<'a> {
    pub service: &'a str,
    pub identity: &'a str,
    pub token: Option<&'a str>,
    pub accept: Option<&'static str>,
}

/// Cheap-to-clone HTTP client shared by the Hub and GitHub fetchers.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Arc<HttpClientInner>,
}

impl HttpClient {
    /// Build a client with the configured connect, read and request timeouts.
    pub fn new(config: FetchConfig) -> Result<Self> {
        for base in [&config.hub_base, &config.github_api_base] {
            Url::parse(base).map_err(|e| ClientError::BaseUrl {
                url: base.clone(),
                reason: e.to_string(),
            })?;
        }

        tracing::debug!(
            target: TRACING_TARGET,
            connect_timeout_ms = config.connect_timeout.as_millis() as u64,
            read_timeout_ms = config.read_timeout.as_millis() as u64,
            request_timeout_ms = config.request_timeout.as_millis() as u64,
            "creating HTTP client"
        );

        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            inner: Arc::new(HttpClientInner { http, config }),
        })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.inner.config
    }

    async fn send(&self, req: Request<'_>, url: &str) -> std::result::Result<reqwest::Response, FetchError> {
        tracing::debug!(target: TRACING_TARGET, service = req.service, %url, "GET");

        let mut builder = self.inner.http.get(url);
        if let Some(token) = req.token {
            builder = builder.bearer_auth(token);
        }
        if let Some(accept) = req.accept {
            builder = builder.header(ACCEPT, HeaderValue::from_static(accept));
        }
        builder
            .send()
            .await
            .map_err(|e| transport_error(req.service, &e))
    }

    async fn body(req: Request<'_>, response: reqwest::Response) -> std::result::Result<String, FetchError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(req.service, &e))?;
        match status_error(req.service, req.identity, status, &body) {
            Some(err) => Err(err),
            None => Ok(body),
        }
    }

    /// GET `url` and decode the JSON body.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        req: Request<'_>,
        url: &str,
    ) -> std::result::Result<T, FetchError> {
        let response = self.send(req, url).await?;
        let body = Self::body(req, response).await?;
        serde_json::from_str(&body).map_err(|e| malformed(req.service, url, e))
    }

    /// GET `url` as raw JSON.
    pub(crate) async fn get_value(&self, req: Request<'_>, url: &str) -> std::result::Result<Value, FetchError> {
        self.get_json(req, url).await
    }

    /// GET `url` as text. A 404 is `Ok(None)`: optional files such as the
    /// README are allowed to be missing.
    pub(crate) async fn get_optional_text(
        &self,
        req: Request<'_>,
        url: &str,
    ) -> std::result::Result<Option<String>, FetchError> {
        let response = self.send(req, url).await?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(target: TRACING_TARGET, service = req.service, %url, "optional file missing");
            return Ok(None);
        }
        Self::body(req, response).await.map(Some)
    }
}
