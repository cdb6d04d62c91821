// src/project/discovery.rs

use std::path::{Path, PathBuf};

use tracing::debug;

use super::archive::{extract, is_archive, staging_dir_for};
use super::ProjectDescriptor;
use crate::config::properties::{normalize_context_path, parse_properties, ProjectProperties};
use crate::errors::Result;
use crate::fs::{is_hidden, FileSystem};
use crate::reload::PROPERTIES_FILE;
use crate::types::{ProjectFlags, ProjectOrigin};
use crate::watch::content_hash;

/// A directory entry that looks like a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub source: PathBuf,
    pub origin: ProjectOrigin,
}

impl Candidate {
    /// Classify one path directly under the projects root.
    pub fn from_path(fs: &dyn FileSystem, path: &Path) -> Option<Self> {
        if is_hidden(path) {
            return None;
        }
        if fs.is_dir(path) {
            return Some(Self {
                source: path.to_path_buf(),
                origin: ProjectOrigin::Directory,
            });
        }
        if is_archive(path) && fs.is_file(path) {
            return Some(Self {
                source: path.to_path_buf(),
                origin: ProjectOrigin::Archive,
            });
        }
        None
    }

    /// Name of the entry under the root; the supervisor's key.
    pub fn key(&self) -> String {
        entry_key(&self.source)
    }
}

pub fn entry_key(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Every project candidate directly under `root`, sorted by name.
pub fn discover(fs: &dyn FileSystem, root: &Path) -> Result<Vec<Candidate>> {
    let mut found = Vec::new();
    for entry in fs.read_dir(root)? {
        if let Some(candidate) = Candidate::from_path(fs, &entry) {
            debug!(path = ?candidate.source, origin = ?candidate.origin, "project candidate");
            found.push(candidate);
        }
    }
    Ok(found)
}

/// Turn a candidate into a descriptor, extracting archives first.
pub fn describe(
    fs: &dyn FileSystem,
    projects_root: &Path,
    candidate: &Candidate,
    defaults: ProjectFlags,
) -> Result<ProjectDescriptor> {
    let (root, archive_hash) = match candidate.origin {
        ProjectOrigin::Directory => (candidate.source.clone(), None),
        ProjectOrigin::Archive => {
            let bytes = fs.read(&candidate.source)?;
            let dest = staging_dir_for(projects_root, &candidate.source);
            extract(&candidate.source, &dest)?;
            (dest, Some(content_hash(&bytes)))
        }
    };

    let props_path = root.join(PROPERTIES_FILE);
    let props = if fs.is_file(&props_path) {
        parse_properties(&fs.read_to_string(&props_path)?)?
    } else {
        ProjectProperties::default()
    };

    let default_name = match candidate.origin {
        ProjectOrigin::Directory => entry_key(&candidate.source),
        ProjectOrigin::Archive => candidate
            .source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };

    let mut flags = props.flags(defaults);
    // Archives are immutable once extracted; changes arrive as a new archive.
    if candidate.origin == ProjectOrigin::Archive {
        flags.hot_reload = false;
    }

    Ok(ProjectDescriptor {
        key: candidate.key(),
        name: props.name.unwrap_or_else(|| default_name.clone()),
        version: props.version,
        context_path: props
            .context_path
            .unwrap_or_else(|| normalize_context_path(&default_name)),
        root,
        source: candidate.source.clone(),
        origin: candidate.origin,
        flags,
        archive_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn discovers_dirs_and_archives_sorted_skipping_hidden() {
        let fs = MockFileSystem::new();
        fs.add_file("/root/b/scripts/x.route", "");
        fs.add_file("/root/a/scripts/y.route", "");
        fs.add_file("/root/c.zip", "zip");
        fs.add_file("/root/notes.txt", "");
        fs.add_file("/root/.hotroute/c/scripts/y.route", "");

        let found = discover(&fs, Path::new("/root")).unwrap();
        let keys: Vec<String> = found.iter().map(Candidate::key).collect();
        assert_eq!(keys, vec!["a", "b", "c.zip"]);
        assert_eq!(found[2].origin, ProjectOrigin::Archive);
    }

    #[test]
    fn properties_override_directory_defaults() {
        let fs = MockFileSystem::new();
        fs.add_file("/root/shop/scripts/x.route", "");
        fs.add_file(
            "/root/shop/project.properties",
            "name = store\nversion = 2\ncontext-path = /api/store\nexpose-load-errors = true\n",
        );
        fs.add_file("/root/plain/scripts/x.route", "");

        let shop = describe(
            &fs,
            Path::new("/root"),
            &Candidate::from_path(&fs, Path::new("/root/shop")).unwrap(),
            ProjectFlags::default(),
        )
        .unwrap();
        assert_eq!(shop.name, "store");
        assert_eq!(shop.version.as_deref(), Some("2"));
        assert_eq!(shop.context_path, "/api/store");
        assert!(shop.flags.expose_load_errors);
        assert_eq!(shop.key, "shop");

        let plain = describe(
            &fs,
            Path::new("/root"),
            &Candidate::from_path(&fs, Path::new("/root/plain")).unwrap(),
            ProjectFlags::default(),
        )
        .unwrap();
        assert_eq!(plain.name, "plain");
        assert_eq!(plain.context_path, "/plain");
        assert_eq!(plain.version, None);
    }
}
