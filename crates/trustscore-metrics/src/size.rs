//! Deployability of model weights on common hardware tiers.

use async_trait::async_trait;

use trustscore_core::{ArtifactContext, ArtifactHandle, Category, Metric, Result, Score};

use crate::text::clamp01;

/// Weight-file extensions counted toward model size.
pub const WEIGHT_EXTENSIONS: &[&str] = &["bin", "safetensors", "h5", "pt", "pth", "ckpt", "onnx", "gguf"];

/// Device name and the weight budget (bytes) it comfortably holds.
pub const DEVICE_CAPACITIES: &[(&str, f64)] = &[
    ("raspberry_pi", 250e6),
    ("jetson_nano", 500e6),
    ("desktop_pc", 4e9),
    ("aws_server", 16e9),
];

/// Device whose score is the headline value.
pub const HEADLINE_DEVICE: &str = "desktop_pc";

/// Per-device `1 - bytes / capacity`, clamped to `[0, 1]`.
#[derive(Debug, Default)]
pub struct SizeScore;

impl SizeScore {
    pub const NAME: &'static str = "size_score";

    /// Total bytes of weight files in the listing. Files without a reported
    /// size count as zero.
    pub fn weight_bytes(ctx: &ArtifactContext) -> u64 {
        ctx.files_where(|f| {
            f.extension()
                .map(|ext| WEIGHT_EXTENSIONS.contains(&ext.as_str()))
                .unwrap_or(false)
        })
        .filter_map(|f| f.size)
        .fold(0u64, u64::saturating_add)
    }
}

#[async_trait]
impl Metric for SizeScore {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn applicable(&self, category: Category) -> bool {
        category == Category::Model
    }

    async fn evaluate(&self, _handle: &ArtifactHandle, ctx: &ArtifactContext) -> Result<Score> {
        let bytes = Self::weight_bytes(ctx) as f64;
        let mut score = Score::default();
        for (device, capacity) in DEVICE_CAPACITIES {
            let value = clamp01(1.0 - bytes / capacity);
            if *device == HEADLINE_DEVICE {
                score.value = value;
            }
            score = score.with_part(*device, value);
        }
        Ok(score)
    }
}
