//! README-driven documentation heuristics for models and datasets.

use std::collections::BTreeSet;

use async_trait::async_trait;
use regex::Regex;

use trustscore_core::{ArtifactContext, ArtifactHandle, Category, FileEntry, Metric, Result, Score};

use crate::text::{clamp01, compile, count_matching, count_present};

const DATASET_INDICATORS: &[&str] = &[
    "dataset",
    "training data",
    "data source",
    "data collection",
    "training set",
    "test set",
    "validation set",
    "benchmark",
    "corpus",
    "annotations",
    "labels",
];

const CODE_INDICATORS: &[&str] = &[
    "example",
    "tutorial",
    "how to use",
    "quickstart",
    "getting started",
    "sample code",
    "usage",
    "demonstration",
    "notebook",
    "script",
];

const TECHNICAL_INDICATORS: &[&str] = &[
    "architecture",
    "parameters",
    "epochs",
    "learning rate",
    "batch size",
    "optimizer",
    "loss function",
    "metrics",
    "evaluation",
    "performance",
];

const DATASET_FILE_HINTS: &[&str] = &[
    "dataset",
    "data_info",
    "data.json",
    "train.json",
    "test.json",
    "validation.json",
];

const CODE_EXTENSIONS: &[&str] = &["py", "ipynb", "sh", "r", "js", "ts"];
const EXAMPLE_HINTS: &[&str] = &["example", "demo", "tutorial", "sample", "quickstart"];
const SCRIPT_DIRS: &[&str] = &["examples", "scripts", "demo", "tutorials"];
const TRAINING_HINTS: &[&str] = &["train", "finetune", "eval", "inference"];

/// Component weights; they sum to 1.
const COMPONENTS: &[(&str, f64)] = &[
    ("readme_quality", 0.25),
    ("dataset_documentation", 0.20),
    ("example_code", 0.25),
    ("dataset_links", 0.15),
    ("training_scripts", 0.15),
];

/// How well a model documents its training data and ships runnable code.
pub struct DatasetAndCodeScore {
    sections: Vec<Regex>,
    links: Vec<Regex>,
    dataset_links: Vec<Regex>,
}

impl Default for DatasetAndCodeScore {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetAndCodeScore {
    pub const NAME: &'static str = "dataset_and_code_score";

    pub fn new() -> Self {
        Self {
            sections: compile(&[
                r"(?i)#+\s*(dataset|data)",
                r"(?i)#+\s*(usage|example)",
                r"(?i)#+\s*(quick.*start)",
                r"(?i)#+\s*training",
                r"(?i)#+\s*evaluation",
                r"(?i)#+\s*citation",
            ]),
            links: compile(&[
                r"(?i)https?://[^\s)]+dataset",
                r"(?i)https?://[^\s)]+data",
                r"(?i)https?://huggingface\.co/datasets",
                r"(?i)https?://github\.com/[^\s)]+",
            ]),
            dataset_links: compile(&[
                r"(?i)https?://huggingface\.co/datasets/[^\s)]+",
                r"(?i)https?://kaggle\.com/[^\s)]+",
                r"(?i)https?://[^\s)]*\.(csv|json)\b",
            ]),
        }
    }

    fn readme_quality(&self, readme: &str) -> f64 {
        let lower = readme.to_lowercase();
        let dataset = (count_present(&lower, DATASET_INDICATORS) as f64 * 0.05).min(0.3);
        let code = (count_present(&lower, CODE_INDICATORS) as f64 * 0.05).min(0.25);
        let sections = (count_matching(readme, &self.sections) as f64 * 0.04).min(0.2);
        let links = (count_matching(readme, &self.links) as f64 * 0.03).min(0.15);
        let technical = (count_present(&lower, TECHNICAL_INDICATORS) as f64 * 0.02).min(0.1);
        clamp01(dataset + code + sections + links + technical)
    }

    fn dataset_documentation(ctx: &ArtifactContext) -> f64 {
        let files: Vec<&FileEntry> = ctx
            .files_where(|f| {
                let name = f.file_name();
                DATASET_FILE_HINTS.iter().any(|h| name.contains(h))
            })
            .collect();
        if files.is_empty() {
            return 0.0;
        }
        let with_ext = |ext: &str| {
            files
                .iter()
                .filter(|f| f.extension().as_deref() == Some(ext))
                .count() as f64
        };
        clamp01(0.4 + (with_ext("json") * 0.1).min(0.3) + (with_ext("csv") * 0.1).min(0.2))
    }

    fn example_code(ctx: &ArtifactContext) -> f64 {
        let mut examples = 0usize;
        let mut notebooks = 0usize;
        let mut scripts = 0usize;
        let mut any = 0usize;
        for f in ctx.files() {
            let name = f.file_name();
            let ext = f.extension().unwrap_or_default();
            let is_example = CODE_EXTENSIONS.contains(&ext.as_str())
                && EXAMPLE_HINTS.iter().any(|h| name.contains(h));
            let is_notebook = ext == "ipynb";
            let is_script = ext == "py"
                && f.path
                    .split('/')
                    .any(|part| SCRIPT_DIRS.contains(&part.to_ascii_lowercase().as_str()));
            examples += usize::from(is_example);
            notebooks += usize::from(is_notebook);
            scripts += usize::from(is_script);
            any += usize::from(is_example || is_notebook || is_script);
        }
        if any == 0 {
            return 0.0;
        }
        clamp01(
            0.4 + (notebooks as f64 * 0.1).min(0.3)
                + (examples as f64 * 0.05).min(0.2)
                + (scripts as f64 * 0.03).min(0.1),
        )
    }

    fn dataset_links(&self, readme: &str) -> f64 {
        let found: usize = self
            .dataset_links
            .iter()
            .map(|re| re.find_iter(readme).count())
            .sum();
        if found == 0 {
            0.0
        } else {
            clamp01(0.3 + found as f64 * 0.1)
        }
    }

    fn training_scripts(ctx: &ArtifactContext) -> f64 {
        let mut kinds = BTreeSet::new();
        let mut found = false;
        for f in ctx.files_where(|f| f.extension().as_deref() == Some("py")) {
            let name = f.file_name();
            if !TRAINING_HINTS.iter().any(|h| name.contains(h)) {
                continue;
            }
            found = true;
            if name.contains("train") {
                kinds.insert("training");
            }
            if name.contains("eval") || name.contains("test") {
                kinds.insert("evaluation");
            }
            if name.contains("inference") {
                kinds.insert("inference");
            }
        }
        if !found {
            return 0.0;
        }
        clamp01(0.5 + kinds.len() as f64 * 0.1)
    }
}

#[async_trait]
impl Metric for DatasetAndCodeScore {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn applicable(&self, category: Category) -> bool {
        category == Category::Model
    }

    async fn evaluate(&self, _handle: &ArtifactHandle, ctx: &ArtifactContext) -> Result<Score> {
        let readme = ctx.readme_text();
        let parts = [
            self.readme_quality(readme),
            Self::dataset_documentation(ctx),
            Self::example_code(ctx),
            self.dataset_links(readme),
            Self::training_scripts(ctx),
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

/// Dataset card keywords that signal a usable dataset.
pub const DATASET_CARD_KEYS: &[&str] = &[
    "train",
    "test",
    "validation",
    "split",
    "license",
    "citation",
    "doi",
    "benchmark",
];

/// `0.3 + 0.7 * (card keywords present / 8)`.
#[derive(Debug, Default)]
pub struct DatasetQuality;

impl DatasetQuality {
    pub const NAME: &'static str = "dataset_quality";
}

#[async_trait]
impl Metric for DatasetQuality {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn applicable(&self, category: Category) -> bool {
        category == Category::Dataset
    }

    async fn evaluate(&self, _handle: &ArtifactHandle, ctx: &ArtifactContext) -> Result<Score> {
        let lower = ctx.readme_text().to_lowercase();
        let hits = count_present(&lower, DATASET_CARD_KEYS) as f64;
        Ok(Score::new(clamp01(
            0.3 + 0.7 * hits / DATASET_CARD_KEYS.len() as f64,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(category: Category) -> ArtifactHandle {
        ArtifactHandle::new(category, "huggingface.co", "a/b", "https://huggingface.co/a/b")
    }

    #[tokio::test]
    async fn test_dataset_quality_counts_card_keys() {
        let ctx = ArtifactContext::default()
            .with_readme("Splits: train / test / validation. License: CC-BY. Citation below.");
        let score = DatasetQuality
            .evaluate(&handle(Category::Dataset), &ctx)
            .await
            .unwrap();
        // train, test, validation, split, license, citation
        assert!((score.value - (0.3 + 0.7 * 6.0 / 8.0)).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_dataset_quality_floor() {
        let score = DatasetQuality
            .evaluate(&handle(Category::Dataset), &ArtifactContext::default())
            .await
            .unwrap();
        assert!((score.value - 0.3).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_dataset_and_code_empty_is_zero() {
        let score = DatasetAndCodeScore::new()
            .evaluate(&handle(Category::Model), &ArtifactContext::default())
            .await
            .unwrap();
        assert_eq!(score.value, 0.0);
        assert_eq!(score.breakdown.len(), COMPONENTS.len());
    }

    #[tokio::test]
    async fn test_dataset_and_code_rewards_examples_and_scripts() {
        let ctx = ArtifactContext::default()
            .with_readme(
                "# Model\n## Dataset\nTrained on https://huggingface.co/datasets/squad\n## Usage\nSee the example notebook.",
            )
            .with_file("examples/demo.py", Some(10))
            .with_file("notebooks/walkthrough.ipynb", Some(10))
            .with_file("train.py", Some(10))
            .with_file("evaluate.py", Some(10))
            .with_file("dataset_info.json", Some(10));
        let score = DatasetAndCodeScore::new()
            .evaluate(&handle(Category::Model), &ctx)
            .await
            .unwrap();

        assert!(score.breakdown.values().all(|v| *v > 0.0));
        // demo.py is both an example file and a script under examples/
        assert!((score.breakdown["example_code"] - (0.4 + 0.1 + 0.05 + 0.03)).abs() < 1e-12);
        // training and evaluation kinds
        assert!((score.breakdown["training_scripts"] - 0.7).abs() < 1e-12);
        assert!((score.breakdown["dataset_documentation"] - 0.5).abs() < 1e-12);
        assert!(score.value > 0.0 && score.value <= 1.0);
    }

    #[test]
    fn test_applicability() {
        assert!(DatasetAndCodeScore::new().applicable(Category::Model));
        assert!(!DatasetAndCodeScore::new().applicable(Category::Dataset));
        assert!(DatasetQuality.applicable(Category::Dataset));
        assert!(!DatasetQuality.applicable(Category::Code));
    }
}
