mod common;
use crate::common::builders::{greeting_unit, ProjectsDir};
use crate::common::{init_tracing, TestResult};

use std::fs;

use clap::Parser;
use hotroute::cli::CliArgs;
use hotroute::config::load_and_validate;

fn write_config(dir: &ProjectsDir, body: &str) -> std::io::Result<std::path::PathBuf> {
    let path = dir.temp_path().join("Hotroute.toml");
    fs::write(&path, body)?;
    Ok(path)
}

#[test]
fn config_root_is_relative_to_the_config_file() -> TestResult {
    init_tracing();
    let dir = ProjectsDir::new()?;
    let path = write_config(
        &dir,
        "[server]\nroot = \"projects\"\nexpose_load_errors = true\nunload_on_delete = false\n",
    )?;

    let cfg = load_and_validate(&path)?;
    assert_eq!(cfg.root(), dir.root());
    let flags = cfg.flags();
    assert!(flags.hot_reload);
    assert!(flags.expose_load_errors);
    assert!(!flags.unload_on_delete);
    Ok(())
}

#[test]
fn unknown_config_keys_are_rejected() -> TestResult {
    init_tracing();
    let dir = ProjectsDir::new()?;
    let path = write_config(&dir, "[server]\nroot = \"projects\"\nhot_reloading = true\n")?;
    assert!(load_and_validate(&path).is_err());
    Ok(())
}

#[tokio::test]
async fn run_once_answers_requests_and_exits() -> TestResult {
    init_tracing();
    let dir = ProjectsDir::new()?;
    dir.project("shop").create()?.unit("greet", &greeting_unit("greet", "hello"))?;
    let config = write_config(&dir, "[server]\nroot = \"projects\"\n")?;

    let args = CliArgs::try_parse_from([
        "hotroute",
        "--config",
        config.to_str().ok_or("non-utf8 temp path")?,
        "--no-hot-reload",
        "--once",
        "--request",
        "GET /shop/greet",
        "--request",
        "GET /shop/missing",
    ])?;
    hotroute::run(args).await?;
    Ok(())
}

#[tokio::test]
async fn run_rejects_malformed_request_lines() -> TestResult {
    init_tracing();
    let dir = ProjectsDir::new()?;
    dir.project("shop").create()?;
    let root = dir.root().to_str().ok_or("non-utf8 temp path")?.to_string();
    let config = write_config(&dir, "[server]\n")?;

    let args = CliArgs::try_parse_from([
        "hotroute",
        "--config",
        config.to_str().ok_or("non-utf8 temp path")?,
        "--root",
        root.as_str(),
        "--no-hot-reload",
        "--once",
        "--request",
        "nonsense",
    ])?;
    assert!(hotroute::run(args).await.is_err());
    Ok(())
}

#[tokio::test]
async fn run_fails_when_the_root_is_missing() -> TestResult {
    init_tracing();
    let dir = ProjectsDir::new()?;
    let config = write_config(&dir, "[server]\nroot = \"nowhere\"\n")?;

    let args = CliArgs::try_parse_from([
        "hotroute",
        "--config",
        config.to_str().ok_or("non-utf8 temp path")?,
        "--once",
    ])?;
    assert!(hotroute::run(args).await.is_err());
    Ok(())
}
