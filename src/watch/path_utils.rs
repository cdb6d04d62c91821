// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher.

use std::path::{Path, PathBuf};

/// Express `path` relative to `root`.
///
/// - First we try a direct `strip_prefix(root)`.
/// - If that fails (e.g. `/private/var` vs `/var` on macOS), we canonicalize
///   both and try again. A deleted path cannot be canonicalized, so its
///   parent is canonicalized instead and the file name re-attached.
///
/// Returns `None` if the path cannot be related to `root`.
pub fn relative_to(root: &Path, path: &Path) -> Option<PathBuf> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(rel.to_path_buf());
    }

    let root_canon = root.canonicalize().ok()?;
    let path_canon = match path.canonicalize() {
        Ok(p) => p,
        Err(_) => {
            let parent = path.parent()?.canonicalize().ok()?;
            parent.join(path.file_name()?)
        }
    };
    path_canon.strip_prefix(&root_canon).ok().map(Path::to_path_buf)
}

/// Render a relative path with forward slashes.
pub fn slash_str(rel: &Path) -> String {
    rel.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_a_plain_prefix() {
        assert_eq!(
            relative_to(Path::new("/p/scripts"), Path::new("/p/scripts/a/B.route")),
            Some(PathBuf::from("a/B.route"))
        );
        assert_eq!(relative_to(Path::new("/p/scripts"), Path::new("/q/B.route")), None);
    }

    #[test]
    fn resolves_deleted_paths_through_their_parent() {
        let dir = tempfile::tempdir().unwrap();
        let canon = dir.path().canonicalize().unwrap();
        let sub = canon.join("scripts");
        std::fs::create_dir(&sub).unwrap();

        // Root given in a non-canonical spelling, file never existed.
        let root = dir.path().join(".").join("scripts");
        let rel = relative_to(&root, &sub.join("Gone.route"));
        assert_eq!(rel, Some(PathBuf::from("Gone.route")));
    }
}
