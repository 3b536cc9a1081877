//! Library side of the `trustscore` binary: argument parsing, layered
//! configuration and the run loop that writes NDJSON.

pub mod cli;
pub mod config;
pub mod run;

pub use cli::Cli;
pub use config::{ConfigLoader, RawConfig, Settings};
