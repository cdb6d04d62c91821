#![allow(dead_code)]

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use hotroute::loader::LIB_DIR;
use hotroute::project::SPECIFICATION_DIR;
use hotroute::reload::PROPERTIES_FILE;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Source of a handler `name` answering `GET /<name>` with `body`.
pub fn greeting_unit(name: &str, body: &str) -> String {
    format!("handler {name}\non GET /{name}\n  write \"{body}\"\n  done\n")
}

/// Source that declares `name` but does not compile.
pub fn broken_unit(name: &str) -> String {
    format!("handler {name}\non GET /{name}\n  status 999\n  done\n")
}

/// A temporary projects root plus a sibling staging area.
///
/// Files are written into the staging area first and renamed into place, so
/// a watcher never observes a half-written unit.
pub struct ProjectsDir {
    _base: TempDir,
    canonical: PathBuf,
    root: PathBuf,
    staging: PathBuf,
    counter: AtomicUsize,
}

impl ProjectsDir {
    pub fn new() -> io::Result<Self> {
        let base = tempfile::tempdir()?;
        // Canonical so event paths and configured paths agree on platforms
        // where the temp dir sits behind a symlink.
        let canonical = base.path().canonicalize()?;
        let root = canonical.join("projects");
        let staging = canonical.join("staging");
        fs::create_dir_all(&root)?;
        fs::create_dir_all(&staging)?;
        Ok(Self {
            _base: base,
            canonical,
            root,
            staging,
            counter: AtomicUsize::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Handle to the project directory `<root>/<name>` (not created yet).
    pub fn project(&self, name: &str) -> ProjectDir<'_> {
        ProjectDir {
            owner: self,
            dir: self.root.join(name),
        }
    }

    /// Build a whole project off to the side and move it under the root in
    /// one rename.
    pub fn stage_project(
        &self,
        name: &str,
        files: &[(&str, &str)],
    ) -> io::Result<PathBuf> {
        let tmp = self.fresh_staging_path();
        for (rel, contents) in files {
            let path = tmp.join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, contents)?;
        }
        let dest = self.root.join(name);
        fs::rename(&tmp, &dest)?;
        Ok(dest)
    }

    /// Write a zip archive `<root>/<file_name>` atomically.
    pub fn archive(&self, file_name: &str, files: &[(&str, &str)]) -> io::Result<PathBuf> {
        let tmp = self.fresh_staging_path();
        {
            let mut zip = ZipWriter::new(fs::File::create(&tmp)?);
            let opts = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            for (rel, contents) in files {
                zip.start_file(*rel, opts).map_err(io::Error::other)?;
                zip.write_all(contents.as_bytes())?;
            }
            zip.finish().map_err(io::Error::other)?;
        }
        let dest = self.root.join(file_name);
        fs::rename(&tmp, &dest)?;
        Ok(dest)
    }

    pub fn write_atomic(&self, path: &Path, contents: &str) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.fresh_staging_path();
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, path)
    }

    fn fresh_staging_path(&self) -> PathBuf {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        self.staging.join(format!("item-{n}"))
    }

    /// The (canonical) temp directory holding the projects root.
    pub fn temp_path(&self) -> &Path {
        &self.canonical
    }
}

/// One project directory under a [`ProjectsDir`].
pub struct ProjectDir<'a> {
    owner: &'a ProjectsDir,
    dir: PathBuf,
}

impl ProjectDir<'_> {
    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.dir.join("scripts")
    }

    pub fn unit_path(&self, rel: &str) -> PathBuf {
        self.scripts_dir().join(format!("{rel}.route"))
    }

    /// Create the project directory with an empty `scripts/`.
    pub fn create(self) -> io::Result<Self> {
        fs::create_dir_all(self.scripts_dir())?;
        Ok(self)
    }

    /// Write `scripts/<rel>.route`.
    pub fn unit(self, rel: &str, source: &str) -> io::Result<Self> {
        let path = self.unit_path(rel);
        self.owner.write_atomic(&path, source)?;
        Ok(self)
    }

    /// Write `scripts/lib/<name>.route`.
    pub fn library(self, name: &str, source: &str) -> io::Result<Self> {
        let path = self.scripts_dir().join(LIB_DIR).join(format!("{name}.route"));
        self.owner.write_atomic(&path, source)?;
        Ok(self)
    }

    pub fn properties(self, text: &str) -> io::Result<Self> {
        let path = self.dir.join(PROPERTIES_FILE);
        self.owner.write_atomic(&path, text)?;
        Ok(self)
    }

    /// Write `specification/<name>.json`.
    pub fn spec_document(self, name: &str, json: &str) -> io::Result<Self> {
        let path = self.dir.join(SPECIFICATION_DIR).join(format!("{name}.json"));
        self.owner.write_atomic(&path, json)?;
        Ok(self)
    }

    /// Build `scripts/<dir>/` with the given `(stem, source)` units off to
    /// the side and move it in with one rename.
    pub fn unit_dir(self, dir: &str, units: &[(&str, &str)]) -> io::Result<Self> {
        let tmp = self.owner.fresh_staging_path();
        fs::create_dir_all(&tmp)?;
        for (stem, source) in units {
            fs::write(tmp.join(format!("{stem}.route")), source)?;
        }
        fs::create_dir_all(self.scripts_dir())?;
        fs::rename(&tmp, self.scripts_dir().join(dir))?;
        Ok(self)
    }

    /// Move `scripts/<dir>/` out of the project in one rename, so the only
    /// event is for the directory itself.
    pub fn move_out(&self, dir: &str) -> io::Result<()> {
        let tmp = self.owner.fresh_staging_path();
        fs::rename(self.scripts_dir().join(dir), tmp)
    }

    pub fn remove_unit(&self, rel: &str) -> io::Result<()> {
        fs::remove_file(self.unit_path(rel))
    }

    pub fn remove(self) -> io::Result<()> {
        fs::remove_dir_all(&self.dir)
    }
}
