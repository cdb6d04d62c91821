// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! Handler-level failures have their own types next to the code that raises
//! them ([`crate::loader::LoadError`], [`crate::dispatch::DispatchError`],
//! [`crate::watch::WatchError`]); this module holds the errors that abort a
//! whole operation such as opening a project or starting the host.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to establish a filesystem watch. Fatal for the project that asked
/// for it: the project never becomes ready.
#[derive(Error, Debug)]
#[error("failed to watch {path:?}: {source}")]
pub struct WatchSetupError {
    pub path: PathBuf,
    #[source]
    pub source: notify::Error,
}

#[derive(Error, Debug)]
pub enum HotrouteError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    WatchSetup(#[from] WatchSetupError),

    #[error("Archive error in {path:?}: {message}")]
    Archive { path: PathBuf, message: String },

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, HotrouteError>;
