//! Metric contract, explicit registry and NetScore weight table.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;

use crate::artifact::{ArtifactHandle, Category};
use crate::context::ArtifactContext;
use crate::error::{ConfigError, Result};

/// Value produced by a metric.
///
/// `value` is the headline score that NetScore aggregates. `breakdown` holds
/// optional named sub-scores (e.g. per target device). All of them must lie
/// in `[0, 1]`; the executor enforces this, not the metric.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Score {
    pub value: f64,
    pub breakdown: BTreeMap<String, f64>,
}

impl Score {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            breakdown: BTreeMap::new(),
        }
    }

    pub fn with_part(mut self, name: impl Into<String>, value: f64) -> Self {
        self.breakdown.insert(name.into(), value);
        self
    }
}

impl From<f64> for Score {
    fn from(value: f64) -> Self {
        Score::new(value)
    }
}

/// A pluggable scoring function for one aspect of an artifact.
///
/// `evaluate` must only read `handle` and `context`, must not keep references
/// past the call, and must be safe to repeat: the executor retries it after
/// transient external-call failures. Metrics never set their own timeouts.
#[async_trait]
pub trait Metric: Send + Sync {
    /// Stable name used in output records and the weight table.
    fn name(&self) -> &str;

    /// Whether this metric scores artifacts of `category`.
    fn applicable(&self, category: Category) -> bool;

    async fn evaluate(&self, handle: &ArtifactHandle, context: &ArtifactContext) -> Result<Score>;
}

/// Metrics registered explicitly at startup, in registration order.
#[derive(Clone, Default)]
pub struct MetricRegistry {
    metrics: Vec<Arc<dyn Metric>>,
}

impl std::fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricRegistry")
            .field("metrics", &self.names())
            .finish()
    }
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a metric. Names must be unique.
    pub fn register(&mut self, metric: Arc<dyn Metric>) -> std::result::Result<(), ConfigError> {
        if self.metrics.iter().any(|m| m.name() == metric.name()) {
            return Err(ConfigError::DuplicateMetric(metric.name().to_string()));
        }
        self.metrics.push(metric);
        Ok(())
    }

    /// Builder form of [`MetricRegistry::register`].
    pub fn with(mut self, metric: Arc<dyn Metric>) -> std::result::Result<Self, ConfigError> {
        self.register(metric)?;
        Ok(self)
    }

    /// Metrics that score `category`, in registration order.
    pub fn applicable(&self, category: Category) -> Vec<Arc<dyn Metric>> {
        self.metrics
            .iter()
            .filter(|m| m.applicable(category))
            .cloned()
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.metrics.iter().map(|m| m.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

/// Per-category NetScore weights, normalized once at load time.
///
/// For each supported category, the weights of the metrics applicable to it
/// sum to 1, so aggregation is a plain dot product.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightTable {
    per_category: BTreeMap<Category, BTreeMap<String, f64>>,
}

impl WeightTable {
    /// Validate `weights` against `registry` and normalize per category.
    ///
    /// Every registered metric needs a finite, non-negative weight; weights
    /// for unregistered names are rejected.
    pub fn new(
        registry: &MetricRegistry,
        weights: &BTreeMap<String, f64>,
    ) -> std::result::Result<Self, ConfigError> {
        let registered: BTreeSet<&str> = registry.names().into_iter().collect();

        if let Some(unknown) = weights.keys().find(|k| !registered.contains(k.as_str())) {
            return Err(ConfigError::UnknownWeight {
                metric: unknown.clone(),
            });
        }

        for name in &registered {
            match weights.get(*name) {
                None => {
                    return Err(ConfigError::MissingWeight {
                        metric: name.to_string(),
                    })
                }
                Some(w) if !w.is_finite() || *w < 0.0 => {
                    return Err(ConfigError::InvalidWeight {
                        metric: name.to_string(),
                        weight: *w,
                    })
                }
                Some(_) => {}
            }
        }

        let mut per_category = BTreeMap::new();
        for category in Category::SUPPORTED {
            let applicable = registry.applicable(category);
            if applicable.is_empty() {
                continue;
            }

            let raw: BTreeMap<String, f64> = applicable
                .iter()
                .map(|m| (m.name().to_string(), weights[m.name()]))
                .collect();
            let total: f64 = raw.values().sum();
            if total <= 0.0 {
                return Err(ConfigError::ZeroWeightTotal {
                    category: category.to_string(),
                });
            }

            let normalized = if total == 1.0 {
                raw
            } else {
                raw.into_iter().map(|(k, w)| (k, w / total)).collect()
            };
            per_category.insert(category, normalized);
        }

        Ok(Self { per_category })
    }

    /// Normalized weight of `metric` for `category` (0 when not applicable).
    pub fn weight(&self, category: Category, metric: &str) -> f64 {
        self.per_category
            .get(&category)
            .and_then(|w| w.get(metric))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn for_category(&self, category: Category) -> Option<&BTreeMap<String, f64>> {
        self.per_category.get(&category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FixedMetric;

    fn registry() -> MetricRegistry {
        MetricRegistry::new()
            .with(Arc::new(FixedMetric::new("a", 1.0)))
            .unwrap()
            .with(Arc::new(FixedMetric::new("b", 0.0)))
            .unwrap()
            .with(Arc::new(
                FixedMetric::new("only_code", 0.5).for_categories(&[Category::Code]),
            ))
            .unwrap()
    }

    fn weights(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut reg = registry();
        let err = reg.register(Arc::new(FixedMetric::new("a", 0.3))).unwrap_err();
        assert_eq!(err, ConfigError::DuplicateMetric("a".to_string()));
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn test_applicable_filters_by_category() {
        let reg = registry();
        let names: Vec<String> = reg
            .applicable(Category::Model)
            .iter()
            .map(|m| m.name().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(reg.applicable(Category::Code).len(), 3);
    }

    #[test]
    fn test_weights_normalized_per_category() {
        let table = WeightTable::new(
            &registry(),
            &weights(&[("a", 0.3), ("b", 0.1), ("only_code", 0.6)]),
        )
        .unwrap();

        assert!((table.weight(Category::Model, "a") - 0.75).abs() < 1e-12);
        assert!((table.weight(Category::Model, "b") - 0.25).abs() < 1e-12);
        assert_eq!(table.weight(Category::Model, "only_code"), 0.0);

        let code_total: f64 = table.for_category(Category::Code).unwrap().values().sum();
        assert!((code_total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_weights_that_already_sum_to_one_are_untouched() {
        let reg = MetricRegistry::new()
            .with(Arc::new(FixedMetric::new("x", 1.0)))
            .unwrap()
            .with(Arc::new(FixedMetric::new("y", 0.0)))
            .unwrap();
        let table = WeightTable::new(&reg, &weights(&[("x", 0.6), ("y", 0.4)])).unwrap();
        assert_eq!(table.weight(Category::Dataset, "x"), 0.6);
        assert_eq!(table.weight(Category::Dataset, "y"), 0.4);
    }

    #[test]
    fn test_missing_unknown_and_invalid_weights_rejected() {
        let reg = registry();
        assert!(matches!(
            WeightTable::new(&reg, &weights(&[("a", 0.5), ("b", 0.5)])),
            Err(ConfigError::MissingWeight { metric }) if metric == "only_code"
        ));
        assert!(matches!(
            WeightTable::new(
                &reg,
                &weights(&[("a", 0.5), ("b", 0.5), ("only_code", 0.1), ("ghost", 0.1)])
            ),
            Err(ConfigError::UnknownWeight { metric }) if metric == "ghost"
        ));
        assert!(matches!(
            WeightTable::new(&reg, &weights(&[("a", -0.5), ("b", 0.5), ("only_code", 0.1)])),
            Err(ConfigError::InvalidWeight { .. })
        ));
        assert!(matches!(
            WeightTable::new(&reg, &weights(&[("a", f64::NAN), ("b", 0.5), ("only_code", 0.1)])),
            Err(ConfigError::InvalidWeight { .. })
        ));
    }

    #[test]
    fn test_zero_total_for_category_rejected() {
        let reg = registry();
        let err =
            WeightTable::new(&reg, &weights(&[("a", 0.0), ("b", 0.0), ("only_code", 1.0)]))
                .unwrap_err();
        assert!(matches!(err, ConfigError::ZeroWeightTotal { category } if category == "MODEL"));
    }
}
