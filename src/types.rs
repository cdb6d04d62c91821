// src/types.rs

use std::fmt;

/// Normalized kind of a filesystem change.
///
/// Every platform event the watcher accepts is folded into one of these three
/// values before it reaches the reload coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Created => "created",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// Where a project's files come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectOrigin {
    /// A plain directory directly under the projects root.
    Directory,
    /// A `.zip` archive directly under the projects root, extracted to a
    /// staging directory before loading.
    Archive,
}

impl Default for ProjectOrigin {
    fn default() -> Self {
        ProjectOrigin::Directory
    }
}

/// Per-project behaviour switches.
///
/// Host-level defaults come from `Hotroute.toml` / the CLI; each project may
/// override them in its `project.properties`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectFlags {
    /// Watch the project tree and reload units as they change.
    pub hot_reload: bool,
    /// Register an `/error/{name}` diagnostic handler for failed units.
    pub expose_load_errors: bool,
    /// Remove a unit's registration when its file is deleted.
    pub unload_on_delete: bool,
}

impl Default for ProjectFlags {
    fn default() -> Self {
        Self {
            hot_reload: true,
            expose_load_errors: false,
            unload_on_delete: true,
        }
    }
}

/// Parse a boolean the way `project.properties` files spell them.
pub fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}
