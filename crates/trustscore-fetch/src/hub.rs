//! HuggingFace Hub fetcher for models and datasets.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use trustscore_core::{ArtifactContext, ArtifactFetcher, ArtifactHandle, Category, FetchError, FileEntry};

use crate::error::malformed;
use crate::http::{HttpClient, Request};
use crate::remote_id;

pub const SERVICE: &str = "huggingface";

#[derive(Debug, Deserialize)]
struct HubSibling {
    rfilename: String,
    #[serde(default)]
    size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct HubInfo {
    #[serde(default)]
    likes: Option<u64>,
    #[serde(default)]
    downloads: Option<u64>,
    #[serde(default, rename = "cardData")]
    card_data: Option<Value>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    siblings: Vec<HubSibling>,
}

impl HubInfo {
    /// Card license (a string, or the first of a list), else a `license:` tag.
    fn license(&self) -> Option<String> {
        let from_card = self.card_data.as_ref().and_then(|card| match card.get("license") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Array(items)) => items.iter().find_map(|v| v.as_str().map(str::to_string)),
            _ => None,
        });
        from_card.or_else(|| {
            self.tags
                .iter()
                .find_map(|t| t.strip_prefix("license:").map(str::to_string))
        })
    }
}

/// Build the context from a Hub API response and the raw README.
pub fn hub_context(raw: Value, readme: Option<String>) -> Result<ArtifactContext, FetchError> {
    let info: HubInfo =
        serde_json::from_value(raw.clone()).map_err(|e| malformed(SERVICE, "model info", e))?;

    let files = info
        .siblings
        .iter()
        .map(|s| FileEntry::new(s.rfilename.clone(), s.size))
        .collect();

    let mut metadata = json!({ "raw": raw });
    if let Some(likes) = info.likes {
        metadata["likes"] = json!(likes);
    }
    if let Some(downloads) = info.downloads {
        metadata["downloads"] = json!(downloads);
    }
    if let Some(license) = info.license() {
        metadata["license"] = json!(license);
    }

    Ok(ArtifactContext::new(readme, files, metadata))
}

/// Models and datasets on `huggingface.co`.
#[derive(Debug, Clone)]
pub struct HubFetcher {
    client: HttpClient,
}

impl HubFetcher {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    fn kind_path(category: Category) -> &'static str {
        match category {
            Category::Dataset => "datasets",
            _ => "models",
        }
    }

    fn info_url(&self, handle: &ArtifactHandle, id: &str) -> String {
        format!(
            "{}/api/{}/{}?blobs=true",
            self.client.config().hub_base.trim_end_matches('/'),
            Self::kind_path(handle.category()),
            id
        )
    }

    fn readme_url(&self, handle: &ArtifactHandle, id: &str) -> String {
        let prefix = match handle.category() {
            Category::Dataset => "datasets/",
            _ => "",
        };
        format!(
            "{}/{}{}/raw/main/README.md",
            self.client.config().hub_base.trim_end_matches('/'),
            prefix,
            id
        )
    }
}

#[async_trait]
impl ArtifactFetcher for HubFetcher {
    async fn fetch(&self, handle: &ArtifactHandle) -> Result<ArtifactContext, FetchError> {
        let id = remote_id(handle);
        let req = Request {
            service: SERVICE,
            identity: handle.identity(),
            token: self.client.config().huggingface_token.as_deref(),
            accept: None,
        };

        let raw = self.client.get_value(req, &self.info_url(handle, &id)).await?;
        let readme = self
            .client
            .get_optional_text(req, &self.readme_url(handle, &id))
            .await?;

        tracing::debug!(
            service = SERVICE,
            identity = handle.identity(),
            has_readme = readme.is_some(),
            "fetched hub artifact"
        );
        hub_context(raw, readme)
    }
}
