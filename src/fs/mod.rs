// src/fs/mod.rs

//! Filesystem seam used by the loader, the initial scan and the
//! specification responder.
//!
//! Production code uses [`RealFileSystem`]; unit tests use
//! [`mock::MockFileSystem`] so handler loading can be exercised without
//! touching disk.

use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub mod mock;

/// Abstract filesystem interface.
pub trait FileSystem: Send + Sync + Debug {
    fn read(&self, path: &Path) -> Result<Vec<u8>>;
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn exists(&self, path: &Path) -> bool;
    fn is_file(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;

    /// Return the entries of a directory as full paths, sorted by file name.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).with_context(|| format!("reading file {:?}", path))
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("reading file {:?}", path))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).with_context(|| format!("reading dir {:?}", path))? {
            let entry = entry?;
            entries.push(entry.path());
        }
        entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(entries)
    }
}

/// True when the final component of `path` starts with a dot.
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

/// Recursively collect every file below `dir` whose extension is `ext`,
/// skipping hidden entries and any directory for which `skip_dir` returns
/// true. Results come back in depth-first, name-sorted order.
pub fn collect_files(
    fs: &dyn FileSystem,
    dir: &Path,
    ext: &str,
    skip_dir: &dyn Fn(&Path) -> bool,
) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    if !fs.is_dir(dir) {
        return Ok(out);
    }
    walk(fs, dir, ext, skip_dir, &mut out)?;
    Ok(out)
}

fn walk(
    fs: &dyn FileSystem,
    dir: &Path,
    ext: &str,
    skip_dir: &dyn Fn(&Path) -> bool,
    out: &mut Vec<PathBuf>,
) -> Result<()> {
    for entry in fs.read_dir(dir)? {
        if is_hidden(&entry) {
            continue;
        }
        if fs.is_dir(&entry) {
            if !skip_dir(&entry) {
                walk(fs, &entry, ext, skip_dir, out)?;
            }
        } else if entry.extension().and_then(|e| e.to_str()) == Some(ext) {
            out.push(entry);
        }
    }
    Ok(())
}
