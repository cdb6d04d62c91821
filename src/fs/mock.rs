// src/fs/mock.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use parking_lot::Mutex;

use super::FileSystem;

/// In-memory filesystem for tests.
///
/// Only files are stored; a directory exists whenever some stored file lives
/// below it.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    files: Arc<Mutex<BTreeMap<PathBuf, Vec<u8>>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        self.files
            .lock()
            .insert(path.as_ref().to_path_buf(), content.into());
    }

    pub fn remove_file(&self, path: impl AsRef<Path>) -> bool {
        self.files.lock().remove(path.as_ref()).is_some()
    }
}

impl FileSystem for MockFileSystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("File not found: {:?}", path))
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes).map_err(|e| anyhow!("Invalid UTF-8 in {:?}: {}", path, e))
    }

    fn exists(&self, path: &Path) -> bool {
        self.is_file(path) || self.is_dir(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.lock().contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.files
            .lock()
            .keys()
            .any(|p| p != path && p.starts_with(path))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let files = self.files.lock();
        let mut children: Vec<PathBuf> = Vec::new();
        for file in files.keys() {
            let Ok(rest) = file.strip_prefix(path) else {
                continue;
            };
            if let Some(first) = rest.components().next() {
                let child = path.join(first.as_os_str());
                if !children.contains(&child) {
                    children.push(child);
                }
            }
        }
        if children.is_empty() {
            return Err(anyhow!("Not a directory or not found: {:?}", path));
        }
        children.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(children)
    }
}
