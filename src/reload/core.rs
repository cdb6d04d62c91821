// src/reload/core.rs

//! Pure reload decisions.
//!
//! Everything here is synchronous and deterministic: it turns load results
//! and filesystem events into registry operations and reload actions. The
//! async shell (`reload::coordinator`) performs the IO and applies what this
//! module decides, so the rules can be unit tested without Tokio, channels or
//! a filesystem.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::dispatch::ErrorDiagnostic;
use crate::fs::is_hidden;
use crate::handler::Handler;
use crate::loader::{LoadError, SourceUnitId, LIB_DIR};
use crate::registry::{error_key, Registration, RegistryOp};
use crate::types::{ChangeKind, ProjectFlags};
use crate::watch::path_utils::{relative_to, slash_str};

/// File name of the per-project metadata file.
pub const PROPERTIES_FILE: &str = "project.properties";

/// Registry ops for the result of loading `name`.
pub fn plan_load(
    name: &str,
    result: Result<Arc<dyn Handler>, LoadError>,
    flags: &ProjectFlags,
) -> Vec<RegistryOp> {
    let diag_key = error_key(name);
    match result {
        Ok(handler) => vec![
            RegistryOp::Put(name.to_string(), Registration::active(handler)),
            RegistryOp::Remove(diag_key),
        ],
        Err(error) => {
            let diag = if flags.expose_load_errors {
                let handler = ErrorDiagnostic::new(name, error.clone()).into_handler();
                RegistryOp::Put(diag_key, Registration::active(handler))
            } else {
                RegistryOp::Remove(diag_key)
            };
            vec![
                RegistryOp::Put(name.to_string(), Registration::failed(error)),
                diag,
            ]
        }
    }
}

/// Registry ops for the deletion of the unit named `name`.
///
/// With `unload_on_delete` off the last registration stays, whatever its
/// state, until the file comes back.
pub fn plan_delete(name: &str, flags: &ProjectFlags) -> Vec<RegistryOp> {
    if flags.unload_on_delete {
        vec![
            RegistryOp::Remove(name.to_string()),
            RegistryOp::Remove(error_key(name)),
        ]
    } else {
        Vec::new()
    }
}

/// What the coordinator should do about one change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadAction {
    /// (Re)load a single unit, honouring the content hash.
    Load(SourceUnitId),
    /// The unit's file is gone.
    Delete(SourceUnitId),
    /// A support unit changed: reload every known unit, ignoring hashes.
    ReloadAll,
    /// A directory appeared under `scripts/`; walk it for units whose
    /// creation events may have raced the new watch.
    Rescan,
    /// `project.properties` changed.
    ConfigChanged,
}

/// Where a project's files live, for classifying event paths.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    pub root: PathBuf,
    pub scripts_dir: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let scripts_dir = root.join("scripts");
        Self { root, scripts_dir }
    }
}

/// Map one change to the actions it implies.
///
/// `known` is the set of units currently tracked by the coordinator; it is
/// needed because a deleted directory can no longer be listed.
pub fn classify(
    layout: &ProjectLayout,
    kind: ChangeKind,
    path: &Path,
    known: &[SourceUnitId],
) -> Vec<ReloadAction> {
    if let Some(rel) = relative_to(&layout.root, path) {
        if rel == Path::new(PROPERTIES_FILE) {
            return vec![ReloadAction::ConfigChanged];
        }
    }

    let Some(rel) = relative_to(&layout.scripts_dir, path) else {
        return Vec::new();
    };
    if is_hidden(&rel) {
        return Vec::new();
    }

    // Component-wise: `lib.route` is not under `lib`.
    if rel.starts_with(LIB_DIR) {
        return vec![ReloadAction::ReloadAll];
    }

    if let Some(unit) = SourceUnitId::from_relative(&rel) {
        return match kind {
            ChangeKind::Created | ChangeKind::Modified => vec![ReloadAction::Load(unit)],
            ChangeKind::Deleted => vec![ReloadAction::Delete(unit)],
        };
    }

    // Anything else only matters when it is (or was) a directory.
    match kind {
        ChangeKind::Created if rel.extension().is_none() => return vec![ReloadAction::Rescan],
        ChangeKind::Created | ChangeKind::Modified => return Vec::new(),
        ChangeKind::Deleted => {}
    }
    let rel_str = slash_str(&rel);
    let prefix = if rel_str.is_empty() {
        String::new()
    } else {
        format!("{rel_str}/")
    };
    known
        .iter()
        .filter(|u| u.as_str().starts_with(&prefix))
        .cloned()
        .map(ReloadAction::Delete)
        .collect()
}
