//! GitHub fetcher for code repositories.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use trustscore_core::{ArtifactContext, ArtifactFetcher, ArtifactHandle, FetchError, FileEntry};

use crate::error::malformed;
use crate::http::{HttpClient, Request};
use crate::remote_id;

pub const SERVICE: &str = "github";

const JSON_ACCEPT: &str = "application/vnd.github+json";
const RAW_ACCEPT: &str = "application/vnd.github.raw+json";

/// Contributors counted from the first page only.
const CONTRIBUTOR_PAGE: usize = 100;

#[derive(Debug, Deserialize)]
struct RepoLicense {
    #[serde(default)]
    spdx_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RepoInfo {
    #[serde(default)]
    stargazers_count: Option<u64>,
    #[serde(default)]
    forks_count: Option<u64>,
    #[serde(default)]
    license: Option<RepoLicense>,
    #[serde(default)]
    default_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct Tree {
    #[serde(default)]
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

/// Build the context from the repository, tree and contributor responses.
///
/// Stars map to likes and forks to downloads; the SPDX id (or name, when
/// GitHub reports `NOASSERTION`) becomes the license.
pub fn github_context(
    repo: Value,
    tree: Value,
    contributors: usize,
    readme: Option<String>,
) -> Result<ArtifactContext, FetchError> {
    let info: RepoInfo =
        serde_json::from_value(repo.clone()).map_err(|e| malformed(SERVICE, "repository", e))?;
    let tree: Tree = if tree.is_null() {
        Tree::default()
    } else {
        serde_json::from_value(tree).map_err(|e| malformed(SERVICE, "tree", e))?
    };
    if tree.truncated {
        tracing::warn!(service = SERVICE, "file tree truncated by the API");
    }

    let files = tree
        .tree
        .into_iter()
        .filter(|e| e.kind == "blob")
        .map(|e| FileEntry::new(e.path, e.size))
        .collect();

    let license = info.license.and_then(|l| {
        l.spdx_id
            .filter(|id| !id.eq_ignore_ascii_case("noassertion"))
            .or(l.name)
    });

    let mut metadata = json!({
        "contributors": contributors,
        "raw": repo,
    });
    if let Some(stars) = info.stargazers_count {
        metadata["likes"] = json!(stars);
    }
    if let Some(forks) = info.forks_count {
        metadata["downloads"] = json!(forks);
    }
    if let Some(license) = license {
        metadata["license"] = json!(license);
    }

    Ok(ArtifactContext::new(readme, files, metadata))
}

/// Repositories on `github.com`.
#[derive(Debug, Clone)]
pub struct GitHubFetcher {
    client: HttpClient,
}

impl GitHubFetcher {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    fn api(&self, id: &str, tail: &str) -> String {
        format!(
            "{}/repos/{}{}",
            self.client.config().github_api_base.trim_end_matches('/'),
            id,
            tail
        )
    }
}

#[async_trait]
impl ArtifactFetcher for GitHubFetcher {
    async fn fetch(&self, handle: &ArtifactHandle) -> Result<ArtifactContext, FetchError> {
        let id = remote_id(handle);
        let token = self.client.config().github_token.as_deref();
        let req = Request {
            service: SERVICE,
            identity: handle.identity(),
            token,
            accept: Some(JSON_ACCEPT),
        };

        let repo = self.client.get_value(req, &self.api(&id, "")).await?;
        let branch = repo
            .get("default_branch")
            .and_then(Value::as_str)
            .unwrap_or("HEAD")
            .to_string();

        let readme = self
            .client
            .get_optional_text(
                Request {
                    accept: Some(RAW_ACCEPT),
                    ..req
                },
                &self.api(&id, "/readme"),
            )
            .await?;

        // Empty repositories have no tree; treat that like an empty listing.
        let tree = match self
            .client
            .get_value(req, &self.api(&id, &format!("/git/trees/{branch}?recursive=1")))
            .await
        {
            Ok(tree) => tree,
            Err(FetchError::NotFound { .. }) | Err(FetchError::Rejected { status: 409, .. }) => Value::Null,
            Err(e) => return Err(e),
        };

        let contributors = match self
            .client
            .get_value(
                req,
                &self.api(&id, &format!("/contributors?per_page={CONTRIBUTOR_PAGE}&anon=1")),
            )
            .await
        {
            Ok(Value::Array(items)) => items.len(),
            Ok(_) => 0,
            Err(FetchError::NotFound { .. }) => 0,
            Err(e) => return Err(e),
        };

        tracing::debug!(
            service = SERVICE,
            identity = handle.identity(),
            contributors,
            "fetched github repository"
        );
        github_context(repo, tree, contributors, readme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchConfig;
    use trustscore_core::context::fields;

    #[test]
    fn test_github_context_normalizes_fields() {
        let repo = json!({
            "full_name": "google-research/bert",
            "stargazers_count": 38000,
            "forks_count": 9600,
            "default_branch": "master",
            "license": { "spdx_id": "Apache-2.0", "name": "Apache License 2.0" }
        });
        let tree = json!({
            "tree": [
                { "path": "README.md", "type": "blob", "size": 12 },
                { "path": "tests", "type": "tree" },
                { "path": "tests/test_run.py", "type": "blob", "size": 40 }
            ],
            "truncated": false
        });
        let ctx = github_context(repo, tree, 42, Some("# BERT".into())).unwrap();

        assert_eq!(ctx.metadata_u64(fields::LIKES), Some(38000));
        assert_eq!(ctx.metadata_u64(fields::DOWNLOADS), Some(9600));
        assert_eq!(ctx.metadata_u64(fields::CONTRIBUTORS), Some(42));
        assert_eq!(ctx.metadata_str(fields::LICENSE), Some("Apache-2.0"));
        let paths: Vec<&str> = ctx.files().iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["README.md", "tests/test_run.py"]);
    }

    #[test]
    fn test_noassertion_license_uses_name() {
        let repo = json!({ "license": { "spdx_id": "NOASSERTION", "name": "Other" } });
        let ctx = github_context(repo, Value::Null, 0, None).unwrap();
        assert_eq!(ctx.metadata_str(fields::LICENSE), Some("Other"));
        assert!(ctx.files().is_empty());
    }

    #[test]
    fn test_api_urls() {
        let f = GitHubFetcher::new(HttpClient::new(FetchConfig::default()).unwrap());
        assert_eq!(f.api("a/b", ""), "https://api.github.com/repos/a/b");
        assert_eq!(f.api("a/b", "/readme"), "https://api.github.com/repos/a/b/readme");
    }
}
