// src/logging.rs

//! `tracing` subscriber setup.
//!
//! Filter priority:
//! 1. `--log-level` CLI flag
//! 2. `RUST_LOG`
//! 3. `info`
//!
//! Output goes to stderr so that `inspect` can print to stdout.

use anyhow::{anyhow, Result};
use clap::ValueEnum;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Install the global subscriber. Call once, at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = build_filter(cli_level, std::env::var("RUST_LOG").ok().as_deref());
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("initialising logging: {}", e))
}

fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> EnvFilter {
    match (cli_level, env) {
        (Some(level), _) => EnvFilter::new(level.directive()),
        (None, Some(directives)) => {
            EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"))
        }
        (None, None) => EnvFilter::new("info"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flag_wins_over_env() {
        let f = build_filter(Some(LogLevel::Debug), Some("warn"));
        assert_eq!(f.to_string(), "debug");
    }

    #[test]
    fn env_then_default() {
        assert_eq!(build_filter(None, Some("playscraper=trace")).to_string(), "playscraper=trace");
        assert_eq!(build_filter(None, None).to_string(), "info");
    }
}
