//! One evaluation run: reference list in, NDJSON out.

use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;
use trustscore_core::obs::{self, RunSpan};
use trustscore_core::{
    split_lines, ArtifactEvaluator, ArtifactFetcher, Classifier, RunScheduler, RunSummary,
    RUN_STATS,
};

use crate::config::Settings;

/// Read the reference list from `source`, or stdin for `-`.
pub fn read_references(source: &str) -> Result<Vec<String>> {
    let text = if source == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read references from stdin")?;
        text
    } else {
        std::fs::read_to_string(Path::new(source))
            .with_context(|| format!("failed to read reference file {source}"))?
    };
    Ok(split_lines(&text))
}

/// Evaluate `lines` and write one NDJSON line per evaluated or rejected
/// reference to `out`, in input order.
pub async fn evaluate<W: Write>(
    settings: &Settings,
    fetcher: Arc<dyn ArtifactFetcher>,
    lines: Vec<String>,
    source: &str,
    out: &mut W,
) -> Result<RunSummary> {
    let span = RunSpan::enter_new();
    let policy = Arc::new(settings.policy.clone());
    obs::emit_run_started(span.run_id(), source, policy.max_concurrent_artifacts);

    let evaluator = ArtifactEvaluator::new(
        settings.registry.clone(),
        settings.weights.clone(),
        fetcher,
        Arc::clone(&policy),
    );
    let scheduler = RunScheduler::new(
        Arc::new(Classifier::default()),
        Arc::new(evaluator),
        policy,
    );

    let mut summary = RunSummary::start();
    let mut stream = scheduler.run(lines);
    while let Some(item) = stream.next().await {
        summary.observe(&item);
        if let Some(line) = item.to_ndjson().context("failed to serialize record")? {
            writeln!(out, "{line}").context("failed to write output")?;
            out.flush().context("failed to write output")?;
        }
    }
    summary.finish();

    obs::emit_run_finished(span.run_id(), &summary);
    RUN_STATS.flush();
    Ok(summary)
}
