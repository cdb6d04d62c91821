// src/watch/event.rs

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use notify::event::{ModifyKind, RenameMode};
use notify::EventKind;

use crate::types::ChangeKind;

/// A normalized filesystem change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub path: PathBuf,
    pub at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            at: Utc::now(),
        }
    }
}

/// A platform event kind the watcher has no mapping for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnrecognizedKind(pub String);

/// Fold one notify event into zero or more `(kind, path)` pairs.
///
/// Access events are recognised and dropped. `Any` and `Other` have no
/// sensible reading and are returned as [`UnrecognizedKind`].
pub fn normalize_kind(
    kind: &EventKind,
    paths: &[PathBuf],
) -> Result<Vec<(ChangeKind, PathBuf)>, UnrecognizedKind> {
    let all = |k: ChangeKind| paths.iter().map(|p| (k, p.clone())).collect();

    let out = match kind {
        EventKind::Create(_) => all(ChangeKind::Created),
        EventKind::Remove(_) => all(ChangeKind::Deleted),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => all(ChangeKind::Deleted),
            RenameMode::To => all(ChangeKind::Created),
            RenameMode::Both => {
                let mut out = Vec::with_capacity(paths.len());
                if let Some(from) = paths.first() {
                    out.push((ChangeKind::Deleted, from.clone()));
                }
                out.extend(paths.iter().skip(1).map(|p| (ChangeKind::Created, p.clone())));
                out
            }
            RenameMode::Any | RenameMode::Other => paths
                .iter()
                .map(|p| (existence_kind(p), p.clone()))
                .collect(),
        },
        EventKind::Modify(_) => all(ChangeKind::Modified),
        EventKind::Access(_) => Vec::new(),
        EventKind::Any | EventKind::Other => {
            return Err(UnrecognizedKind(format!("{kind:?}")));
        }
    };

    Ok(out)
}

/// A rename with no direction is resolved by looking at the disk.
fn existence_kind(path: &Path) -> ChangeKind {
    if path.exists() {
        ChangeKind::Created
    } else {
        ChangeKind::Deleted
    }
}
