// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `hotroute`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "hotroute",
    version,
    about = "Serve hot-reloaded request handlers from a directory of projects.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the host config file (TOML).
    ///
    /// Default: `Hotroute.toml` in the current working directory; built-in
    /// defaults apply when that file does not exist.
    #[arg(long, value_name = "PATH", default_value = "Hotroute.toml")]
    pub config: PathBuf,

    /// Projects root; overrides `[server].root`.
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Load every project once and never watch for changes.
    #[arg(long)]
    pub no_hot_reload: bool,

    /// Register `/error/{name}` diagnostics for units that fail to load.
    #[arg(long)]
    pub expose_load_errors: bool,

    /// Keep the last registration of a unit whose file is deleted.
    #[arg(long)]
    pub keep_on_delete: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `HOTROUTE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Exit after loading (and after answering any `--request`) instead of
    /// running until Ctrl+C.
    #[arg(long)]
    pub once: bool,

    /// Dispatch a request line such as `"GET /shop/greet?name=ann"` after
    /// startup and print the response. May be repeated.
    #[arg(long, value_name = "METHOD PATH")]
    pub request: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags_and_repeated_requests() {
        let args = CliArgs::try_parse_from([
            "hotroute",
            "--root",
            "apps",
            "--expose-load-errors",
            "--once",
            "--request",
            "GET /a/greet",
            "--request",
            "POST /a/x",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(args.root, Some(PathBuf::from("apps")));
        assert!(args.expose_load_errors);
        assert!(!args.keep_on_delete);
        assert_eq!(args.request.len(), 2);
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
        assert_eq!(args.config, PathBuf::from("Hotroute.toml"));
    }
}
