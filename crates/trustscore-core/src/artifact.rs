//! Artifact classification.
//!
//! Turns a raw reference string into an [`ArtifactHandle`] using an ordered,
//! first-match-wins list of [`ClassifierRule`]s keyed on URL host and path
//! shape. Classification is pure: no network I/O, no shared state.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ConfigError, EvalError, Result};

/// The kind of artifact a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Model,
    Dataset,
    Code,
    /// A valid URL that no rule recognises. Never evaluated.
    Unsupported,
}

impl Category {
    /// Every category that can be evaluated.
    pub const SUPPORTED: [Category; 3] = [Category::Model, Category::Dataset, Category::Code];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Model => "MODEL",
            Category::Dataset => "DATASET",
            Category::Code => "CODE",
            Category::Unsupported => "UNSUPPORTED",
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Category::Unsupported)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified artifact. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ArtifactHandle {
    category: Category,
    host: String,
    identity: String,
    source_reference: String,
}

impl ArtifactHandle {
    pub fn new(
        category: Category,
        host: impl Into<String>,
        identity: impl Into<String>,
        source_reference: impl Into<String>,
    ) -> Self {
        Self {
            category,
            host: host.into(),
            identity: identity.into(),
            source_reference: source_reference.into(),
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Normalized, lowercase host the artifact lives on (without `www.`).
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Normalized `owner/name` key (or bare `name` for un-namespaced artifacts).
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The reference string exactly as it was read.
    pub fn source_reference(&self) -> &str {
        &self.source_reference
    }
}

/// One host/path pattern and the category it maps to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierRule {
    /// Host to match, compared case-insensitively with any `www.` stripped.
    pub host: String,
    /// Leading path segments that must be present (e.g. `["datasets"]`).
    pub path_prefix: Vec<String>,
    /// Category assigned when the rule matches.
    pub category: Category,
    /// Identity segments required after the prefix: 1 allows bare names,
    /// 2 requires `owner/name`.
    pub min_segments: usize,
}

impl ClassifierRule {
    pub fn new(host: &str, path_prefix: &[&str], category: Category, min_segments: usize) -> Self {
        Self {
            host: host.to_string(),
            path_prefix: path_prefix.iter().map(|s| s.to_string()).collect(),
            category,
            min_segments,
        }
    }

    /// A rule that marks `host/<prefix>/...` as unsupported.
    pub fn reject(host: &str, path_prefix: &[&str]) -> Self {
        Self::new(host, path_prefix, Category::Unsupported, 0)
    }

    fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidRule("host must not be empty".to_string()));
        }
        if self.category.is_supported() && !(1..=2).contains(&self.min_segments) {
            return Err(ConfigError::InvalidRule(format!(
                "{}: min_segments must be 1 or 2, got {}",
                self.host, self.min_segments
            )));
        }
        Ok(())
    }

    fn prefix_matches(&self, segments: &[String]) -> bool {
        segments.len() >= self.path_prefix.len()
            && self
                .path_prefix
                .iter()
                .zip(segments)
                .all(|(want, got)| want.eq_ignore_ascii_case(got))
    }
}

/// Ordered rule set evaluated first-match-wins.
///
/// A valid URL that matches no rule, or matches a rule without enough
/// identity segments, classifies as [`Category::Unsupported`].
#[derive(Debug, Clone, PartialEq)]
pub struct Classifier {
    rules: Vec<ClassifierRule>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            rules: Self::standard_rules(),
        }
    }
}

impl Classifier {
    /// Build a classifier from explicit rules.
    pub fn new(rules: Vec<ClassifierRule>) -> std::result::Result<Self, ConfigError> {
        for rule in &rules {
            rule.validate()?;
        }
        Ok(Self { rules })
    }

    /// HuggingFace models and datasets, GitHub repositories.
    ///
    /// | Pattern                               | Category    |
    /// |---------------------------------------|-------------|
    /// | `huggingface.co/datasets/<id>`        | DATASET     |
    /// | `huggingface.co/<reserved page>/...`  | UNSUPPORTED |
    /// | `huggingface.co/<owner>/<name>`       | MODEL       |
    /// | `github.com/<owner>/<repo>`           | CODE        |
    pub fn standard_rules() -> Vec<ClassifierRule> {
        const HF: &str = "huggingface.co";
        let mut rules = vec![ClassifierRule::new(HF, &["datasets"], Category::Dataset, 1)];
        for reserved in [
            "spaces",
            "docs",
            "blog",
            "api",
            "models",
            "organizations",
            "settings",
            "login",
            "join",
            "pricing",
            "papers",
            "collections",
            "tasks",
        ] {
            rules.push(ClassifierRule::reject(HF, &[reserved]));
        }
        rules.push(ClassifierRule::new(HF, &[], Category::Model, 1));
        rules.push(ClassifierRule::new("github.com", &[], Category::Code, 2));
        rules
    }

    pub fn rules(&self) -> &[ClassifierRule] {
        &self.rules
    }

    /// Classify a raw reference.
    ///
    /// Fails only with a Validation error, for empty input or anything that
    /// is not an absolute `http`/`https` URL with a host. Everything else
    /// yields a handle, possibly [`Category::Unsupported`].
    pub fn classify(&self, raw: &str) -> Result<ArtifactHandle> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(EvalError::invalid_reference(raw, "reference is empty"));
        }

        let url = Url::parse(trimmed).map_err(|e| EvalError::invalid_reference(raw, e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(EvalError::invalid_reference(
                raw,
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }
        let host = match url.host_str() {
            Some(h) if !h.is_empty() => normalize_host(h),
            _ => return Err(EvalError::invalid_reference(raw, "URL has no host")),
        };

        let segments: Vec<String> = url
            .path_segments()
            .map(|parts| {
                parts
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let rule = self
            .rules
            .iter()
            .find(|r| normalize_host(&r.host) == host && r.prefix_matches(&segments));

        let (category, identity) = match rule {
            Some(rule) if rule.category.is_supported() => {
                let rest = &segments[rule.path_prefix.len()..];
                if rest.len() < rule.min_segments {
                    (Category::Unsupported, String::new())
                } else {
                    let take = if rest.len() >= 2 { 2 } else { 1 };
                    (rule.category, normalize_identity(&rest[..take]))
                }
            }
            _ => (Category::Unsupported, String::new()),
        };

        let identity = if category.is_supported() {
            identity
        } else {
            normalize_identity(&segments)
        };

        Ok(ArtifactHandle::new(category, host, identity, raw))
    }
}

fn normalize_host(host: &str) -> String {
    let lower = host.trim().trim_end_matches('.').to_ascii_lowercase();
    lower.strip_prefix("www.").map(str::to_string).unwrap_or(lower)
}

fn normalize_identity(segments: &[String]) -> String {
    segments
        .iter()
        .map(|s| {
            let lower = s.to_lowercase();
            lower.strip_suffix(".git").map(str::to_string).unwrap_or(lower)
        })
        .collect::<Vec<_>>()
        .join("/")
}
