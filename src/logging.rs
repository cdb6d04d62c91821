// src/logging.rs

//! Logging for the `hotroute` binary.
//!
//! `--log-level` wins when given. Otherwise `HOTROUTE_LOG` is read as a
//! filter directive, so `HOTROUTE_LOG=hotroute::reload=debug` turns up reload
//! tracing alone while everything else stays at the default. With neither,
//! the level is `info`.
//!
//! Everything goes to stderr; stdout carries the answers to `--request`.

use anyhow::Result;
use tracing::warn;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

pub const LOG_ENV: &str = "HOTROUTE_LOG";

const DEFAULT_DIRECTIVE: &str = "info";

/// Install the global subscriber. Call once, at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV).ok();
    let (filter, rejected) = build_filter(cli_level, env.as_deref());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    if let Some(value) = rejected {
        warn!(var = LOG_ENV, value = %value, "invalid log filter; using {DEFAULT_DIRECTIVE}");
    }
    Ok(())
}

/// The filter to install, plus the env value if it had to be ignored.
fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> (EnvFilter, Option<String>) {
    if let Some(level) = cli_level {
        return (EnvFilter::new(directive(level)), None);
    }
    match env.map(str::trim).filter(|s| !s.is_empty()) {
        None => (EnvFilter::new(DEFAULT_DIRECTIVE), None),
        Some(value) => match EnvFilter::try_new(value) {
            Ok(filter) => (filter, None),
            Err(_) => (EnvFilter::new(DEFAULT_DIRECTIVE), Some(value.to_string())),
        },
    }
}

fn directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
