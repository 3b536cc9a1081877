//! Centralised tracing initialisation for trustscore binaries.
//!
//! Call [`init_tracing`] once at program start to configure the global
//! subscriber with an `EnvFilter` and optional JSON formatting. Output goes
//! to stderr, or to an append-only file with [`init_tracing_to_file`];
//! stdout is left for records.
//!
//! Safe to call more than once; later calls are silently ignored.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing::Level;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialise the global tracing subscriber, logging to stderr.
///
/// * `json`: emit newline-delimited JSON log lines.
/// * `level`: default verbosity when `RUST_LOG` is not set.
pub fn init_tracing(json: bool, level: Level) {
    install(json, level, BoxMakeWriter::new(std::io::stderr), true);
}

/// Like [`init_tracing`], but append log lines to `path`.
pub fn init_tracing_to_file(json: bool, level: Level, path: &Path) -> std::io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    install(json, level, BoxMakeWriter::new(Mutex::new(file)), false);
    Ok(())
}

fn install(json: bool, level: Level, writer: BoxMakeWriter, ansi: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(writer).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(ansi)
                    .with_writer(writer),
            )
            .try_init()
            .ok();
    }
}
