//! Built-in quality heuristics.
//!
//! Each metric is a pure function of the fetched [`ArtifactContext`]
//! (README text, file listing, normalized metadata) and is registered in
//! [`default_registry`] together with its weight in [`DEFAULT_WEIGHTS`].
//!
//! [`ArtifactContext`]: trustscore_core::ArtifactContext

pub mod code_quality;
pub mod community;
pub mod documentation;
pub mod license;
pub mod performance;
pub mod size;
mod text;

use std::collections::BTreeMap;
use std::sync::Arc;

use trustscore_core::{ConfigError, Metric, MetricRegistry};

pub use code_quality::CodeQuality;
pub use community::{BusFactor, RampUpTime};
pub use documentation::{DatasetAndCodeScore, DatasetQuality};
pub use license::License;
pub use performance::PerformanceClaims;
pub use size::SizeScore;

/// NetScore weight of every built-in metric, before per-category
/// normalization.
pub const DEFAULT_WEIGHTS: &[(&str, f64)] = &[
    (RampUpTime::NAME, 0.15),
    (BusFactor::NAME, 0.15),
    (PerformanceClaims::NAME, 0.10),
    (License::NAME, 0.10),
    (SizeScore::NAME, 0.10),
    (DatasetAndCodeScore::NAME, 0.10),
    (DatasetQuality::NAME, 0.15),
    (CodeQuality::NAME, 0.15),
];

/// Every built-in metric, in output order.
pub fn builtin_metrics() -> Vec<Arc<dyn Metric>> {
    vec![
        Arc::new(RampUpTime::new()),
        Arc::new(BusFactor),
        Arc::new(PerformanceClaims::new()),
        Arc::new(License::new()),
        Arc::new(SizeScore),
        Arc::new(DatasetAndCodeScore::new()),
        Arc::new(DatasetQuality),
        Arc::new(CodeQuality::new()),
    ]
}

/// Registry holding [`builtin_metrics`].
pub fn default_registry() -> Result<MetricRegistry, ConfigError> {
    builtin_metrics()
        .into_iter()
        .try_fold(MetricRegistry::new(), MetricRegistry::with)
}

/// [`DEFAULT_WEIGHTS`] as the map [`trustscore_core::WeightTable::new`] takes.
pub fn default_weights() -> BTreeMap<String, f64> {
    DEFAULT_WEIGHTS
        .iter()
        .map(|(name, w)| (name.to_string(), *w))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_builtin_has_a_default_weight() {
        let registry = default_registry().unwrap();
        let weights = default_weights();
        assert_eq!(registry.len(), DEFAULT_WEIGHTS.len());
        for name in registry.names() {
            assert!(weights.contains_key(name), "{name} has no weight");
        }
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        let total: f64 = DEFAULT_WEIGHTS.iter().map(|(_, w)| w).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }
}
