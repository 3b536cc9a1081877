//! Layered configuration: defaults, TOML file, environment, flags.
//!
//! Each layer is read into a [`RawConfig`] of optional values, merged so a
//! later layer wins only where it sets something, then finalized into
//! validated [`Settings`].

use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use trustscore_core::{InvalidReferencePolicy, MetricRegistry, RunPolicy, WeightTable};
use trustscore_fetch::FetchConfig;

/// `[policy]` table. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawPolicy {
    pub connect_timeout_ms: Option<u64>,
    pub read_timeout_ms: Option<u64>,
    pub total_timeout_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub backoff_base_ms: Option<u64>,
    pub backoff_factor: Option<f64>,
    pub max_concurrent_artifacts: Option<usize>,
    pub max_concurrent_metrics_per_artifact: Option<usize>,
    pub on_invalid_reference: Option<InvalidReferencePolicy>,
}

/// `[tokens]` table.
#[derive(Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawTokens {
    pub huggingface: Option<String>,
    pub github: Option<String>,
}

impl std::fmt::Debug for RawTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawTokens")
            .field("huggingface", &self.huggingface.as_ref().map(|_| "***"))
            .field("github", &self.github.as_ref().map(|_| "***"))
            .finish()
    }
}

/// One configuration layer.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawConfig {
    pub policy: RawPolicy,
    /// Metric name to weight; overrides the built-in weight per metric.
    pub weights: BTreeMap<String, f64>,
    pub tokens: RawTokens,
}

/// Validated configuration for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub policy: RunPolicy,
    pub registry: MetricRegistry,
    pub weights: WeightTable,
    pub tokens: RawTokens,
}

impl Settings {
    pub fn fetch_config(&self) -> FetchConfig {
        let mut config = FetchConfig::from_policy(&self.policy);
        if let Some(token) = &self.tokens.huggingface {
            config = config.with_huggingface_token(token.clone());
        }
        if let Some(token) = &self.tokens.github {
            config = config.with_github_token(token.clone());
        }
        config
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, then `file`, then the process environment, then `flags`.
    pub fn load(file: Option<&Path>, flags: RawConfig) -> Result<Settings> {
        let mut raw = RawConfig::default();
        if let Some(path) = file {
            raw = Self::merge_raw(raw, Self::read_file(path)?);
        }
        raw = Self::merge_raw(raw, Self::from_env(|key| std::env::var(key).ok())?);
        raw = Self::merge_raw(raw, flags);
        Self::finalize(raw)
    }

    pub fn read_file(path: &Path) -> Result<RawConfig> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Environment layer. `lookup` returns the value of a variable.
    pub fn from_env<F>(lookup: F) -> Result<RawConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let on_invalid = match lookup("TRUSTSCORE_ON_INVALID") {
            None => None,
            Some(v) => Some(parse_invalid_policy(&v).context("TRUSTSCORE_ON_INVALID")?),
        };
        let policy = RawPolicy {
            connect_timeout_ms: parse_var(&lookup, "TRUSTSCORE_CONNECT_TIMEOUT_MS")?,
            read_timeout_ms: parse_var(&lookup, "TRUSTSCORE_READ_TIMEOUT_MS")?,
            total_timeout_ms: parse_var(&lookup, "TRUSTSCORE_TOTAL_TIMEOUT_MS")?,
            max_retries: parse_var(&lookup, "TRUSTSCORE_MAX_RETRIES")?,
            backoff_base_ms: parse_var(&lookup, "TRUSTSCORE_BACKOFF_BASE_MS")?,
            backoff_factor: parse_var(&lookup, "TRUSTSCORE_BACKOFF_FACTOR")?,
            max_concurrent_artifacts: parse_var(&lookup, "TRUSTSCORE_WORKERS")?,
            max_concurrent_metrics_per_artifact: parse_var(&lookup, "TRUSTSCORE_METRIC_WORKERS")?,
            on_invalid_reference: on_invalid,
        };
        let tokens = RawTokens {
            huggingface: lookup("HF_TOKEN").or_else(|| lookup("HUGGINGFACE_TOKEN")),
            github: lookup("GITHUB_TOKEN"),
        };
        Ok(RawConfig {
            policy,
            weights: BTreeMap::new(),
            tokens,
        })
    }

    /// Overlay values replace base values only where the overlay sets them.
    pub fn merge_raw(base: RawConfig, overlay: RawConfig) -> RawConfig {
        let (b, o) = (base.policy, overlay.policy);
        let mut weights = base.weights;
        weights.extend(overlay.weights);
        RawConfig {
            policy: RawPolicy {
                connect_timeout_ms: o.connect_timeout_ms.or(b.connect_timeout_ms),
                read_timeout_ms: o.read_timeout_ms.or(b.read_timeout_ms),
                total_timeout_ms: o.total_timeout_ms.or(b.total_timeout_ms),
                max_retries: o.max_retries.or(b.max_retries),
                backoff_base_ms: o.backoff_base_ms.or(b.backoff_base_ms),
                backoff_factor: o.backoff_factor.or(b.backoff_factor),
                max_concurrent_artifacts: o.max_concurrent_artifacts.or(b.max_concurrent_artifacts),
                max_concurrent_metrics_per_artifact: o
                    .max_concurrent_metrics_per_artifact
                    .or(b.max_concurrent_metrics_per_artifact),
                on_invalid_reference: o.on_invalid_reference.or(b.on_invalid_reference),
            },
            weights,
            tokens: RawTokens {
                huggingface: overlay.tokens.huggingface.or(base.tokens.huggingface),
                github: overlay.tokens.github.or(base.tokens.github),
            },
        }
    }

    /// Apply built-in defaults and validate the policy and weight table.
    pub fn finalize(raw: RawConfig) -> Result<Settings> {
        let d = RunPolicy::default();
        let p = raw.policy;
        let policy = RunPolicy {
            connect_timeout_ms: p.connect_timeout_ms.unwrap_or(d.connect_timeout_ms),
            read_timeout_ms: p.read_timeout_ms.unwrap_or(d.read_timeout_ms),
            total_timeout_ms: p.total_timeout_ms.unwrap_or(d.total_timeout_ms),
            max_retries: p.max_retries.unwrap_or(d.max_retries),
            backoff_base_ms: p.backoff_base_ms.unwrap_or(d.backoff_base_ms),
            backoff_factor: p.backoff_factor.unwrap_or(d.backoff_factor),
            max_concurrent_artifacts: p.max_concurrent_artifacts.unwrap_or(d.max_concurrent_artifacts),
            max_concurrent_metrics_per_artifact: p
                .max_concurrent_metrics_per_artifact
                .or(d.max_concurrent_metrics_per_artifact),
            on_invalid_reference: p.on_invalid_reference.unwrap_or(d.on_invalid_reference),
        };
        policy.validate().context("invalid run policy")?;

        let registry = trustscore_metrics::default_registry().context("invalid metric registry")?;
        let mut weights = trustscore_metrics::default_weights();
        weights.extend(raw.weights);
        let weights = WeightTable::new(&registry, &weights).context("invalid metric weights")?;

        Ok(Settings {
            policy,
            registry,
            weights,
            tokens: raw.tokens,
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(v) if v.trim().is_empty() => Ok(None),
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow!("{key}={v:?}: {e}")),
    }
}

pub fn parse_invalid_policy(value: &str) -> Result<InvalidReferencePolicy> {
    match value.trim().to_ascii_lowercase().as_str() {
        "record" => Ok(InvalidReferencePolicy::Record),
        "skip" => Ok(InvalidReferencePolicy::Skip),
        other => Err(anyhow!("expected 'record' or 'skip', got '{other}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use trustscore_core::Category;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let settings = ConfigLoader::finalize(RawConfig::default()).unwrap();
        assert_eq!(settings.policy, RunPolicy::default());
        assert_eq!(settings.registry.len(), 8);
        let total: f64 = settings
            .weights
            .for_category(Category::Model)
            .unwrap()
            .values()
            .sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_file_layer() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[policy]
max_retries = 1
on_invalid_reference = "skip"

[weights]
license = 0.5

[tokens]
github = "ghp_file"
"#
        )
        .unwrap();
        let raw = ConfigLoader::read_file(file.path()).unwrap();
        assert_eq!(raw.policy.max_retries, Some(1));
        assert_eq!(raw.policy.on_invalid_reference, Some(InvalidReferencePolicy::Skip));
        assert_eq!(raw.weights["license"], 0.5);
        assert_eq!(raw.tokens.github.as_deref(), Some("ghp_file"));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[policy]\nmax_retry = 1").unwrap();
        assert!(ConfigLoader::read_file(file.path()).is_err());
    }

    #[test]
    fn test_env_layer() {
        let raw = ConfigLoader::from_env(env(&[
            ("TRUSTSCORE_WORKERS", "3"),
            ("TRUSTSCORE_BACKOFF_FACTOR", "1.5"),
            ("TRUSTSCORE_ON_INVALID", "Skip"),
            ("HUGGINGFACE_TOKEN", "hf_env"),
        ]))
        .unwrap();
        assert_eq!(raw.policy.max_concurrent_artifacts, Some(3));
        assert_eq!(raw.policy.backoff_factor, Some(1.5));
        assert_eq!(raw.policy.on_invalid_reference, Some(InvalidReferencePolicy::Skip));
        assert_eq!(raw.tokens.huggingface.as_deref(), Some("hf_env"));
        assert_eq!(raw.policy.max_retries, None);

        assert!(ConfigLoader::from_env(env(&[("TRUSTSCORE_MAX_RETRIES", "many")])).is_err());
        assert!(ConfigLoader::from_env(env(&[("TRUSTSCORE_ON_INVALID", "drop")])).is_err());
    }

    #[test]
    fn test_later_layers_win_only_where_set() {
        let file = RawConfig {
            policy: RawPolicy {
                max_retries: Some(1),
                total_timeout_ms: Some(20_000),
                ..RawPolicy::default()
            },
            weights: [("license".to_string(), 0.5)].into(),
            ..RawConfig::default()
        };
        let flags = RawConfig {
            policy: RawPolicy {
                max_retries: Some(5),
                ..RawPolicy::default()
            },
            weights: [("bus_factor".to_string(), 0.3)].into(),
            ..RawConfig::default()
        };
        let merged = ConfigLoader::merge_raw(file, flags);
        assert_eq!(merged.policy.max_retries, Some(5));
        assert_eq!(merged.policy.total_timeout_ms, Some(20_000));
        assert_eq!(merged.weights.len(), 2);
    }

    #[test]
    fn test_invalid_values_fail_before_any_work() {
        let bad_policy = RawConfig {
            policy: RawPolicy {
                backoff_factor: Some(1.0),
                ..RawPolicy::default()
            },
            ..RawConfig::default()
        };
        assert!(ConfigLoader::finalize(bad_policy).is_err());

        let unknown_weight = RawConfig {
            weights: [("popularity".to_string(), 1.0)].into(),
            ..RawConfig::default()
        };
        assert!(ConfigLoader::finalize(unknown_weight).is_err());

        let negative_weight = RawConfig {
            weights: [("license".to_string(), -1.0)].into(),
            ..RawConfig::default()
        };
        assert!(ConfigLoader::finalize(negative_weight).is_err());
    }

    #[test]
    fn test_tokens_reach_fetch_config() {
        let raw = RawConfig {
            tokens: RawTokens {
                huggingface: Some("hf_x".into()),
                github: None,
            },
            ..RawConfig::default()
        };
        let settings = ConfigLoader::finalize(raw).unwrap();
        let fetch = settings.fetch_config();
        assert_eq!(fetch.huggingface_token.as_deref(), Some("hf_x"));
        assert_eq!(fetch.github_token, None);
        assert_eq!(fetch.request_timeout, settings.policy.total_timeout());
    }
}
