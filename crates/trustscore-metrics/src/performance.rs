//! Evidence backing a model's performance claims.

use async_trait::async_trait;
use regex::Regex;

use trustscore_core::{ArtifactContext, ArtifactHandle, Category, FileEntry, Metric, Result, Score};

use crate::text::{clamp01, compile, count_matching, count_present, section_after};

const BENCHMARK_NAME_HINTS: &[&str] = &[
    "benchmark",
    "eval",
    "results",
    "scores",
    "metrics",
    "performance",
];
const BENCHMARK_EXTENSIONS: &[&str] = &["json", "csv", "txt", "md", "yaml", "yml"];

const EVALUATION_KEYWORDS: &[&str] = &[
    "accuracy",
    "precision",
    "recall",
    "f1",
    "bleu",
    "rouge",
    "perplexity",
    "evaluation",
    "benchmark",
    "test set",
    "validation",
    "metrics",
    "performance",
    "baseline",
    "sota",
    "state-of-the-art",
];

const PERFORMANCE_TOPICS: &[&str] = &[
    "performance",
    "benchmark",
    "evaluation",
    "results",
    "metrics",
    "accuracy",
    "speed",
    "efficiency",
];

const METHODOLOGY_TOPICS: &[&str] = &[
    "dataset",
    "test set",
    "validation",
    "cross-validation",
    "methodology",
    "experimental setup",
    "baseline",
    "hyperparameters",
    "training details",
];

const CREDIBILITY_TOPICS: &[&str] = &[
    "citation",
    "reference",
    "paper",
    "arxiv",
    "doi",
    "published",
    "peer-reviewed",
    "conference",
    "journal",
    "reproducible",
    "code available",
    "open source",
];

/// Component weights; they sum to 1.
const COMPONENTS: &[(&str, f64)] = &[
    ("benchmark_results", 0.30),
    ("evaluation_metrics", 0.25),
    ("comparison_tables", 0.20),
    ("performance_docs", 0.15),
    ("credibility", 0.10),
];

/// Scores how well the README and repository back up performance claims.
///
/// Each component lands in `[0, 1]` and is reported in the breakdown; the
/// headline value is their weighted sum.
pub struct PerformanceClaims {
    quantitative: Vec<Regex>,
    results_heading: Vec<Regex>,
    comparison: Vec<Regex>,
    academic: Vec<Regex>,
    number: Vec<Regex>,
}

impl Default for PerformanceClaims {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceClaims {
    pub const NAME: &'static str = "performance_claims";

    pub fn new() -> Self {
        Self {
            quantitative: compile(&[
                r"\b\d+\.?\d*\s*%",
                r"(?i)\b\d+\.?\d*\s*(accuracy|precision|recall|f1|bleu|rouge)",
                r"(?i)\b\d+\.?\d*\s*(fps|ms|seconds)",
                r"(?i)\b\d+\.?\d*[km]?\s*(flops|params|parameters)",
            ]),
            results_heading: compile(&[r"(?i)#+\s*(evaluation|performance|results|benchmark)"]),
            comparison: compile(&[
                r"(?i)\|\s*model\s*\|",
                r"(?i)\|\s*baseline\s*\|",
                r"(?i)\|\s*method\s*\|",
                r"(?i)vs\.?\s+\w+",
                r"(?i)compared? to",
                r"(?i)outperforms?",
                r"(?i)better than",
                r"(?i)improvement over",
                r"(?i)\bbeats\b",
            ]),
            academic: compile(&[
                r"arxiv:\d+\.\d+",
                r"doi:\S+",
                r"https?://arxiv\.org",
                r"@\w+\{[^}]+\}",
                r"https?://papers\.\w+",
                r"https?://proceedings\.\w+",
            ]),
            number: compile(&[r"\d+\.?\d*"]),
        }
    }

    fn is_benchmark_file(f: &FileEntry) -> bool {
        let name = f.file_name();
        BENCHMARK_NAME_HINTS.iter().any(|h| name.contains(h))
            && f.extension()
                .map(|e| BENCHMARK_EXTENSIONS.contains(&e.as_str()))
                .unwrap_or(false)
    }

    fn benchmark_results(&self, ctx: &ArtifactContext, readme: &str) -> f64 {
        let files = ctx.files_where(Self::is_benchmark_file).count();
        let base = if files > 0 { 0.4 } else { 0.0 };
        let quantitative = count_matching(readme, &self.quantitative) as f64;
        clamp01(base + 0.1 * quantitative + 0.05 * files.min(4) as f64)
    }

    fn evaluation_metrics(&self, readme: &str, lower: &str) -> f64 {
        let heading = if count_matching(readme, &self.results_heading) > 0 {
            0.2
        } else {
            0.0
        };
        let variety = (count_present(lower, EVALUATION_KEYWORDS) as f64 * 0.05).min(0.5);
        clamp01(heading + variety)
    }

    fn has_comparison_table(&self, readme: &str) -> bool {
        let table: Vec<&str> = readme.lines().filter(|l| l.contains('|')).collect();
        table.len() >= 3
            && table[2..]
                .iter()
                .any(|l| count_matching(l, &self.number) > 0)
    }

    fn comparison_tables(&self, readme: &str) -> f64 {
        let indicators = count_matching(readme, &self.comparison) as f64 * 0.1;
        let table = if self.has_comparison_table(readme) {
            0.3
        } else {
            0.0
        };
        clamp01(indicators + table)
    }

    fn performance_docs(&self, readme: &str, lower: &str) -> f64 {
        let topics = (count_present(lower, PERFORMANCE_TOPICS) as f64 * 0.05).min(0.3);
        let methodology = (count_present(lower, METHODOLOGY_TOPICS) as f64 * 0.03).min(0.2);
        let detailed = match self.results_heading.first() {
            Some(re) if section_after(readme, re).len() > 500 => 0.1,
            _ => 0.0,
        };
        clamp01(topics + methodology + detailed)
    }

    fn credibility(&self, readme: &str, lower: &str) -> f64 {
        let topics = (count_present(lower, CREDIBILITY_TOPICS) as f64 * 0.05).min(0.4);
        let academic = if count_matching(readme, &self.academic) > 0 {
            0.1
        } else {
            0.0
        };
        let reproducible = if lower.contains("reproduc") { 0.1 } else { 0.0 };
        clamp01(topics + academic + reproducible)
    }
}

#[async_trait]
impl Metric for PerformanceClaims {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn applicable(&self, category: Category) -> bool {
        category == Category::Model
    }

    async fn evaluate(&self, _handle: &ArtifactHandle, ctx: &ArtifactContext) -> Result<Score> {
        let readme = ctx.readme_text();
        let lower = readme.to_lowercase();

        let parts = [
            self.benchmark_results(ctx, readme),
            self.evaluation_metrics(readme, &lower),
            self.comparison_tables(readme),
            self.performance_docs(readme, &lower),
            self.credibility(readme, &lower),
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

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> ArtifactHandle {
        ArtifactHandle::new(Category::Model, "huggingface.co", "a/b", "https://huggingface.co/a/b")
    }

    const RICH_README: &str = "\
# SuperNet

## Evaluation

| Model | Accuracy | F1 |
|-------|----------|----|
| SuperNet | 92.1% | 0.91 |
| Baseline | 88.4% | 0.86 |

SuperNet outperforms the baseline and is better than prior work on the test set.
See the paper at https://arxiv.org/abs/2101.00001 for our reproducible setup.
";

    #[tokio::test]
    async fn test_empty_readme_scores_zero() {
        let score = PerformanceClaims::new()
            .evaluate(&handle(), &ArtifactContext::default())
            .await
            .unwrap();
        assert_eq!(score.value, 0.0);
        assert_eq!(score.breakdown.len(), 5);
    }

    #[tokio::test]
    async fn test_rich_readme_scores_every_component() {
        let ctx = ArtifactContext::default()
            .with_readme(RICH_README)
            .with_file("eval_results.json", Some(1_000));
        let score = PerformanceClaims::new().evaluate(&handle(), &ctx).await.unwrap();

        for (name, _) in COMPONENTS {
            assert!(score.breakdown[*name] > 0.0, "{name} should be positive");
        }
        assert!(score.value > 0.3 && score.value <= 1.0);
    }

    #[test]
    fn test_comparison_table_needs_numeric_rows() {
        let m = PerformanceClaims::new();
        assert!(m.has_comparison_table("| a | b |\n|---|---|\n| x | 1.5 |"));
        assert!(!m.has_comparison_table("| a | b |\n|---|---|\n| x | y |"));
        assert!(!m.has_comparison_table("| a |\n| 1 |"));
    }
}
