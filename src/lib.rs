// src/lib.rs

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod fs;
pub mod handler;
pub mod http;
pub mod loader;
pub mod logging;
pub mod metrics;
pub mod project;
pub mod registry;
pub mod reload;
pub mod script;
pub mod types;
pub mod watch;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::info;

use crate::cli::CliArgs;
use crate::config::load_or_default;
use crate::fs::RealFileSystem;
use crate::http::{BufferedResponse, SimpleRequest};
use crate::metrics::Metrics;
use crate::project::{Supervisor, SupervisorConfig};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - host config loading (file + CLI overrides)
/// - the metrics service
/// - the project supervisor
/// - `--request` smoke dispatches
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let mut cfg = load_or_default(&args.config)?;
    cfg.override_with(
        args.root.clone(),
        args.no_hot_reload,
        args.expose_load_errors,
        args.keep_on_delete,
    );

    let metrics = Arc::new(Metrics::new());
    let supervisor = Supervisor::start(
        SupervisorConfig {
            root: cfg.root().to_path_buf(),
            defaults: cfg.flags(),
        },
        Arc::new(RealFileSystem),
        Arc::clone(&metrics),
    )
    .await?;

    info!(projects = ?supervisor.active_projects(), "hotroute ready");

    for line in &args.request {
        let req = SimpleRequest::parse_line(line)
            .ok_or_else(|| anyhow!("invalid --request {line:?}; expected \"METHOD /path\""))?;
        println!("{}", answer(&supervisor, &req));
    }

    if !args.once {
        tokio::signal::ctrl_c().await?;
        info!("Ctrl+C received; shutting down");
    }

    supervisor.shutdown().await;
    info!(metrics = %serde_json::to_string(&metrics.snapshot())?, "final metrics");
    Ok(())
}

/// Dispatch one request and render the response as a status line plus body.
fn answer(supervisor: &Supervisor, req: &SimpleRequest) -> String {
    let mut resp = BufferedResponse::new();
    if let Err(err) = supervisor.route(req, &mut resp) {
        err.write_to(&mut resp);
    }
    let content_type = resp.content_type.as_deref().unwrap_or("-");
    format!("{} {}\n{}", resp.status, content_type, resp.body_text())
}
