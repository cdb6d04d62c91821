// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::types::ProjectFlags;

/// Host configuration as read from `Hotroute.toml`.
///
/// ```toml
/// [server]
/// root = "projects"
/// hot_reload = true
/// expose_load_errors = false
/// unload_on_delete = true
/// ```
///
/// Every key is optional. The flags are host-wide defaults; each project may
/// override them in its `project.properties`.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub server: ServerSection,
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// Directory whose immediate children are projects. Relative paths are
    /// resolved against the directory holding the config file.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    #[serde(default = "default_true")]
    pub hot_reload: bool,

    #[serde(default)]
    pub expose_load_errors: bool,

    #[serde(default = "default_true")]
    pub unload_on_delete: bool,
}

fn default_root() -> PathBuf {
    PathBuf::from("projects")
}

fn default_true() -> bool {
    true
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            root: default_root(),
            hot_reload: true,
            expose_load_errors: false,
            unload_on_delete: true,
        }
    }
}

impl ServerSection {
    pub fn flags(&self) -> ProjectFlags {
        ProjectFlags {
            hot_reload: self.hot_reload,
            expose_load_errors: self.expose_load_errors,
            unload_on_delete: self.unload_on_delete,
        }
    }
}

/// Validated host configuration. Only obtainable through
/// `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    server: ServerSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(server: ServerSection) -> Self {
        Self { server }
    }

    pub fn server(&self) -> &ServerSection {
        &self.server
    }

    pub fn root(&self) -> &std::path::Path {
        &self.server.root
    }

    pub fn flags(&self) -> ProjectFlags {
        self.server.flags()
    }

    /// Resolve a relative root against `base` (usually the config file's
    /// directory).
    pub fn resolve_root(&mut self, base: &std::path::Path) {
        if self.server.root.is_relative() {
            self.server.root = base.join(&self.server.root);
        }
    }

    /// Apply command-line overrides on top of the file values.
    pub fn override_with(
        &mut self,
        root: Option<PathBuf>,
        no_hot_reload: bool,
        expose_load_errors: bool,
        keep_on_delete: bool,
    ) {
        if let Some(root) = root {
            self.server.root = root;
        }
        if no_hot_reload {
            self.server.hot_reload = false;
        }
        if expose_load_errors {
            self.server.expose_load_errors = true;
        }
        if keep_on_delete {
            self.server.unload_on_delete = false;
        }
    }
}
