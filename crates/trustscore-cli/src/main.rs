//! trustscore - artifact trust scoring CLI
//!
//! Reads a list of HuggingFace model/dataset and GitHub repository URLs,
//! scores each one, and writes one NDJSON record per reference to stdout in
//! input order. Logs go to stderr (or `--log-file`).

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::Level;

use trustscore_cli::{run, Cli, ConfigLoader};
use trustscore_core::telemetry;
use trustscore_fetch::HostRouter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    match &cli.log_file {
        Some(path) => telemetry::init_tracing_to_file(cli.json, level, path)
            .with_context(|| format!("failed to open log file {}", path.display()))?,
        None => telemetry::init_tracing(cli.json, level),
    }

    let settings = ConfigLoader::load(cli.config.as_deref(), cli.overrides())?;
    let lines = run::read_references(&cli.url_file)?;
    let fetcher = HostRouter::standard(settings.fetch_config()).context("failed to set up fetchers")?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let summary = run::evaluate(&settings, Arc::new(fetcher), lines, &cli.url_file, &mut out).await?;

    tracing::info!(
        evaluated = summary.evaluated,
        degraded = summary.degraded,
        rejected = summary.rejected,
        skipped = summary.skipped,
        duration_ms = summary.duration_ms(),
        "run complete"
    );
    Ok(())
}
