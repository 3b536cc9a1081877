//! Community-signal heuristics: ramp-up time and bus factor.

use async_trait::async_trait;
use regex::Regex;

use trustscore_core::context::fields;
use trustscore_core::{ArtifactContext, ArtifactHandle, Category, Metric, Result, Score};

use crate::text::{clamp01, compile, count_matching, squash};

/// How quickly a newcomer can start using the artifact.
///
/// Blends community interest (likes or stars, saturating at ~100) with the
/// onboarding sections the README offers. An artifact with nothing to go on
/// still scores the 0.3 floor.
pub struct RampUpTime {
    onboarding: Vec<Regex>,
}

impl Default for RampUpTime {
    fn default() -> Self {
        Self::new()
    }
}

impl RampUpTime {
    pub const NAME: &'static str = "ramp_up_time";

    pub fn new() -> Self {
        Self {
            onboarding: compile(&[
                r"(?i)\binstall(ation)?\b",
                r"(?i)\b(usage|examples?)\b",
                r"(?i)\b(quick\s*start|getting started)\b",
                r"(?im)^\s*```",
            ]),
        }
    }

    fn docs_score(&self, readme: &str) -> f64 {
        if readme.trim().is_empty() || self.onboarding.is_empty() {
            return 0.0;
        }
        count_matching(readme, &self.onboarding) as f64 / self.onboarding.len() as f64
    }
}

#[async_trait]
impl Metric for RampUpTime {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn applicable(&self, category: Category) -> bool {
        category.is_supported()
    }

    async fn evaluate(&self, _handle: &ArtifactHandle, ctx: &ArtifactContext) -> Result<Score> {
        let interest = squash(ctx.metadata_u64(fields::LIKES).unwrap_or(0), 100.0);
        let docs = self.docs_score(ctx.readme_text());
        Ok(Score::new(clamp01(0.3 + 0.7 * (0.6 * interest + 0.4 * docs))))
    }
}

/// Risk of the artifact dying with a single maintainer.
///
/// Uses the stronger of two saturating signals: downloads (half credit at
/// 10k) and distinct contributors (half credit at 5).
#[derive(Debug, Default)]
pub struct BusFactor;

impl BusFactor {
    pub const NAME: &'static str = "bus_factor";
}

#[async_trait]
impl Metric for BusFactor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn applicable(&self, category: Category) -> bool {
        category.is_supported()
    }

    async fn evaluate(&self, _handle: &ArtifactHandle, ctx: &ArtifactContext) -> Result<Score> {
        let downloads = squash(ctx.metadata_u64(fields::DOWNLOADS).unwrap_or(0), 10_000.0);
        let contributors = squash(ctx.metadata_u64(fields::CONTRIBUTORS).unwrap_or(0), 5.0);
        Ok(Score::new(clamp01(0.2 + 0.8 * downloads.max(contributors))))
    }
}
