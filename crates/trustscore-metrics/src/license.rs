//! License compatibility with LGPL-2.1.

use async_trait::async_trait;
use regex::Regex;

use trustscore_core::context::fields;
use trustscore_core::{ArtifactContext, ArtifactHandle, Category, Metric, Result, Score};

use crate::text::{compile, section_after};

/// Licenses that may be combined with LGPL-2.1 code.
pub const COMPATIBLE_LICENSES: &[&str] = &[
    "lgpl-2.1",
    "mit",
    "apache-2.0",
    "bsd-2-clause",
    "bsd-3-clause",
    "mpl-2.0",
];

const LICENSE_FILES: &[&str] = &["license", "license.txt", "license.md", "copying"];

/// 1.0 for a compatible license, 0.5 when a license is present but not
/// recognized as compatible, 0.0 when none can be found.
///
/// Sources, first hit wins: the license the remote declares, then the
/// README's License section. A LICENSE file in the listing counts as
/// "present".
pub struct License {
    detectors: Vec<(Regex, &'static str)>,
    heading: Option<Regex>,
}

impl Default for License {
    fn default() -> Self {
        Self::new()
    }
}

impl License {
    pub const NAME: &'static str = "license";

    pub fn new() -> Self {
        let table: &[(&str, &'static str)] = &[
            (r"\blgpl\s*[- ]?v?2\.1\b", "lgpl-2.1"),
            (r"(?s)\bgnu\s+lesser\s+general\s+public\s+license\b.*\b2\.1\b", "lgpl-2.1"),
            (r"(?s)\bapache\b.*\b2\.0\b", "apache-2.0"),
            (r"\bmit\b", "mit"),
            (r"(?s)\bbsd\b.*\b3\b", "bsd-3-clause"),
            (r"(?s)\bbsd\b.*\b2\b", "bsd-2-clause"),
            (r"(?s)\bmozilla public license\b.*\b2\.0\b|\bmpl\s*[- ]?2\.0\b", "mpl-2.0"),
        ];
        let detectors = table
            .iter()
            .filter_map(|(pat, id)| {
                compile(&[&format!("(?i){pat}")])
                    .into_iter()
                    .next()
                    .map(|re| (re, *id))
            })
            .collect();
        Self {
            detectors,
            heading: compile(&[r"(?i)^\s*#+\s*licen[cs]e\b"]).into_iter().next(),
        }
    }

    /// Identify a license from free text. `None` when nothing matches.
    pub fn detect(&self, text: &str) -> Option<&'static str> {
        let lower = text.to_lowercase();
        if let Some(id) = COMPATIBLE_LICENSES.iter().find(|id| lower.trim() == **id) {
            return Some(id);
        }
        self.detectors
            .iter()
            .find(|(re, _)| re.is_match(&lower))
            .map(|(_, id)| *id)
    }

    fn readme_section(&self, readme: &str) -> String {
        match &self.heading {
            Some(re) => section_after(readme, re)
                .lines()
                .skip(1)
                .collect::<Vec<_>>()
                .join("\n"),
            None => String::new(),
        }
    }
}

#[async_trait]
impl Metric for License {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn applicable(&self, category: Category) -> bool {
        category.is_supported()
    }

    async fn evaluate(&self, _handle: &ArtifactHandle, ctx: &ArtifactContext) -> Result<Score> {
        let declared = ctx
            .metadata_str(fields::LICENSE)
            .map(str::trim)
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("noassertion"))
            .map(str::to_string);
        let section = self.readme_section(ctx.readme_text());
        let has_file = ctx
            .files()
            .iter()
            .any(|f| LICENSE_FILES.contains(&f.file_name().as_str()));

        let candidates = declared.iter().chain(std::iter::once(&section));
        for text in candidates {
            if let Some(id) = self.detect(text) {
                tracing::debug!(license = id, "compatible license detected");
                return Ok(Score::new(1.0));
            }
        }

        let present = declared.is_some() || !section.trim().is_empty() || has_file;
        Ok(Score::new(if present { 0.5 } else { 0.0 }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn handle() -> ArtifactHandle {
        ArtifactHandle::new(Category::Code, "github.com", "a/b", "https://github.com/a/b")
    }

    #[test]
    fn test_detect_common_licenses() {
        let l = License::new();
        assert_eq!(l.detect("MIT"), Some("mit"));
        assert_eq!(l.detect("Licensed under the Apache License, Version 2.0"), Some("apache-2.0"));
        assert_eq!(l.detect("GNU LGPL v2.1"), Some("lgpl-2.1"));
        assert_eq!(l.detect("bsd-3-clause"), Some("bsd-3-clause"));
        assert_eq!(l.detect("GPL-3.0"), None);
    }

    #[tokio::test]
    async fn test_declared_compatible_license_scores_one() {
        let ctx = ArtifactContext::default().with_metadata(json!({"license": "apache-2.0"}));
        let score = License::new().evaluate(&handle(), &ctx).await.unwrap();
        assert_eq!(score.value, 1.0);
    }

    #[tokio::test]
    async fn test_readme_section_is_used() {
        let ctx = ArtifactContext::default()
            .with_readme("# Tool\n\n## License\nThis project is MIT licensed.\n\n## Contributing\nPRs welcome");
        let score = License::new().evaluate(&handle(), &ctx).await.unwrap();
        assert_eq!(score.value, 1.0);
    }

    #[tokio::test]
    async fn test_unrecognized_license_scores_half() {
        let ctx = ArtifactContext::default().with_metadata(json!({"license": "gpl-3.0"}));
        assert_eq!(License::new().evaluate(&handle(), &ctx).await.unwrap().value, 0.5);

        let ctx = ArtifactContext::default().with_file("LICENSE", Some(1000));
        assert_eq!(License::new().evaluate(&handle(), &ctx).await.unwrap().value, 0.5);
    }

    #[tokio::test]
    async fn test_missing_license_scores_zero() {
        let ctx = ArtifactContext::default().with_readme("# Tool\nNo legal text here.");
        assert_eq!(License::new().evaluate(&handle(), &ctx).await.unwrap().value, 0.0);
    }
}
