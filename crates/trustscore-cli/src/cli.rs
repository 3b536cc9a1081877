//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;
use trustscore_core::InvalidReferencePolicy;

use crate::config::{RawConfig, RawPolicy};

#[derive(Debug, Parser)]
#[command(name = "trustscore")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Score ML models, datasets and code repositories for reuse", long_about = None)]
pub struct Cli {
    /// File with one artifact URL per line, or `-` for stdin
    #[arg(value_name = "URL_FILE")]
    pub url_file: String,

    /// TOML configuration file
    #[arg(short, long, env = "TRUSTSCORE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Artifacts evaluated concurrently
    #[arg(long)]
    pub workers: Option<usize>,

    /// Metrics run concurrently per artifact (default: all at once)
    #[arg(long)]
    pub metric_workers: Option<usize>,

    /// Wall-clock budget per remote call, retries included
    #[arg(long)]
    pub total_timeout_ms: Option<u64>,

    /// Retries after the first attempt for transient failures
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Log invalid references instead of writing a rejection record
    #[arg(long)]
    pub skip_invalid: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    pub json: bool,

    /// Append logs to this file instead of stderr
    #[arg(long, env = "TRUSTSCORE_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// The flag layer of the configuration.
    pub fn overrides(&self) -> RawConfig {
        RawConfig {
            policy: RawPolicy {
                total_timeout_ms: self.total_timeout_ms,
                max_retries: self.max_retries,
                max_concurrent_artifacts: self.workers,
                max_concurrent_metrics_per_artifact: self.metric_workers,
                on_invalid_reference: self.skip_invalid.then_some(InvalidReferencePolicy::Skip),
                ..RawPolicy::default()
            },
            ..RawConfig::default()
        }
    }
}
