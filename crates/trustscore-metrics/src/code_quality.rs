//! Repository hygiene for code artifacts.

use async_trait::async_trait;
use regex::Regex;

use trustscore_core::context::fields;
use trustscore_core::{ArtifactContext, ArtifactHandle, Category, Metric, Result, Score};

use crate::text::{clamp01, compile, count_matching};

const TEST_CONFIG_FILES: &[&str] = &[
    "pyproject.toml",
    "pytest.ini",
    "tox.ini",
    ".coveragerc",
    "setup.cfg",
];
const MANIFESTS: &[&str] = &["pyproject.toml", "cargo.toml", "package.json", "go.mod"];
const LEGACY_MANIFESTS: &[&str] = &["setup.cfg", "setup.py"];
const PACKAGE_ROOTS: &[&str] = &["__init__.py", "lib.rs", "mod.rs", "index.js", "index.ts"];
const LICENSE_FILES: &[&str] = &["license", "license.md", "license.txt"];

/// Component weights; they sum to 1.
const COMPONENTS: &[(&str, f64)] = &[
    ("tests_and_coverage", 0.30),
    ("structure", 0.20),
    ("readme", 0.20),
    ("governance_and_ci", 0.15),
    ("maintainers", 0.15),
];

/// Tests, packaging layout, governance files, README sections and
/// maintainer count, read from the repository tree and README.
pub struct CodeQuality {
    readme_sections: Vec<Regex>,
    coverage: Option<Regex>,
}

impl Default for CodeQuality {
    fn default() -> Self {
        Self::new()
    }
}

/// Top-level path of `path`, lowercased; `None` for a root file.
fn top_dir(path: &str) -> Option<String> {
    path.split_once('/').map(|(dir, _)| dir.to_ascii_lowercase())
}

fn is_root_file(ctx: &ArtifactContext, names: &[&str]) -> bool {
    ctx.files()
        .iter()
        .any(|f| !f.path.contains('/') && names.contains(&f.file_name().as_str()))
}

impl CodeQuality {
    pub const NAME: &'static str = "code_quality";

    pub fn new() -> Self {
        Self {
            readme_sections: compile(&[
                r"(?i)\binstall(ation)?\b",
                r"(?i)\b(usage|examples?)\b",
                r"(?i)\blicen[cs]e\b",
                r"(?i)\bcontribut(ing|ion)\b",
                r"(?i)\b(coverage|build|ci)\b",
            ]),
            coverage: compile(&[r"(?i)(\d{1,3})\s*%\s*coverage"]).into_iter().next(),
        }
    }

    /// Coverage percentage advertised in the README, capped at 100.
    fn coverage_pct(&self, readme: &str) -> Option<u32> {
        let caps = self.coverage.as_ref()?.captures(readme)?;
        caps.get(1)?.as_str().parse::<u32>().ok().map(|p| p.min(100))
    }

    fn tests_and_coverage(&self, ctx: &ArtifactContext) -> f64 {
        let has_tests = ctx.files().iter().any(|f| {
            let name = f.file_name();
            matches!(top_dir(&f.path).as_deref(), Some("tests") | Some("test"))
                || name.starts_with("test_")
                || name.ends_with("_test.py")
        });
        let coverage = self
            .coverage_pct(ctx.readme_text())
            .map(|p| 0.4 * p as f64 / 100.0)
            .unwrap_or(0.0);
        let configs = TEST_CONFIG_FILES
            .iter()
            .filter(|c| is_root_file(ctx, &[**c]))
            .count() as f64;
        let tests = if has_tests { 0.5 } else { 0.0 };
        clamp01(tests + coverage + 0.1 * configs / TEST_CONFIG_FILES.len() as f64)
    }

    fn structure(ctx: &ArtifactContext) -> f64 {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        let has_src = ctx
            .files()
            .iter()
            .any(|f| top_dir(&f.path).as_deref() == Some("src"));
        let has_package = ctx
            .files()
            .iter()
            .any(|f| PACKAGE_ROOTS.contains(&f.file_name().as_str()));
        0.35 * flag(is_root_file(ctx, MANIFESTS))
            + 0.15 * flag(is_root_file(ctx, LEGACY_MANIFESTS))
            + 0.30 * flag(has_src)
            + 0.20 * flag(has_package)
    }

    fn governance(ctx: &ArtifactContext) -> f64 {
        let has_ci = ctx
            .files()
            .iter()
            .any(|f| f.path.to_ascii_lowercase().starts_with(".github/workflows/"));
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        // Rescaled so a repository with all three files scores 1.
        (0.40 * flag(is_root_file(ctx, LICENSE_FILES))
            + 0.30 * flag(has_ci)
            + 0.15 * flag(is_root_file(ctx, &[".gitignore"])))
            / 0.85
    }

    fn readme(&self, readme: &str) -> f64 {
        if readme.trim().is_empty() || self.readme_sections.is_empty() {
            return 0.0;
        }
        count_matching(readme, &self.readme_sections) as f64 / self.readme_sections.len() as f64
    }

    fn maintainers(ctx: &ArtifactContext) -> f64 {
        clamp01(ctx.metadata_u64(fields::CONTRIBUTORS).unwrap_or(0) as f64 / 5.0)
    }
}

#[async_trait]
impl Metric for CodeQuality {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn applicable(&self, category: Category) -> bool {
        category == Category::Code
    }

    async fn evaluate(&self, _handle: &ArtifactHandle, ctx: &ArtifactContext) -> Result<Score> {
        let parts = [
            self.tests_and_coverage(ctx),
            Self::structure(ctx),
            self.readme(ctx.readme_text()),
            clamp01(Self::governance(ctx)),
            Self::maintainers(ctx),
        ];

        let mut score = Score::default();
        let mut total = 0.0;
        for ((name, weight), value) in COMPONENTS.iter().zip(parts) {
            total += weight * value;
            score = score.with_part(*name, value);
        }
        score.value = clamp01(total);
        Ok(score)
    }
}
