// src/project/archive.rs

//! Archive projects: a `.zip` directly under the projects root is unpacked
//! into `<root>/.hotroute/<stem>/` and loaded from there.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::errors::{HotrouteError, Result};

/// Staging directory, relative to the projects root. Hidden, so discovery
/// and the root watch never mistake it for a project.
pub const STAGING_DIR: &str = ".hotroute";

pub const ARCHIVE_EXTENSION: &str = "zip";

pub fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
}

/// Where `archive` is unpacked.
pub fn staging_dir_for(projects_root: &Path, archive: &Path) -> PathBuf {
    let stem = archive
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    projects_root.join(STAGING_DIR).join(stem)
}

fn archive_error(path: &Path, message: impl Into<String>) -> HotrouteError {
    HotrouteError::Archive {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

/// Unpack `archive` into `dest`, replacing whatever was there.
///
/// Every entry must have an enclosed name (no absolute paths, no `..`
/// escaping `dest`); the first entry that does not aborts the extraction
/// and leaves `dest` removed.
pub fn extract(archive: &Path, dest: &Path) -> Result<usize> {
    let file = File::open(archive)?;
    let mut zip = ZipArchive::new(file).map_err(|e| archive_error(archive, e.to_string()))?;

    remove_staging(dest)?;
    fs::create_dir_all(dest)?;

    let result = (|| -> Result<usize> {
        let mut written = 0;
        for i in 0..zip.len() {
            let mut entry = zip
                .by_index(i)
                .map_err(|e| archive_error(archive, e.to_string()))?;
            let Some(rel) = entry.enclosed_name() else {
                return Err(archive_error(
                    archive,
                    format!("entry `{}` escapes the extraction directory", entry.name()),
                ));
            };
            let out = dest.join(rel);

            if entry.is_dir() {
                fs::create_dir_all(&out)?;
                continue;
            }
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut target = File::create(&out)?;
            io::copy(&mut entry, &mut target)?;
            written += 1;
        }
        Ok(written)
    })();

    match result {
        Ok(written) => {
            info!(archive = ?archive, dest = ?dest, files = written, "archive extracted");
            Ok(written)
        }
        Err(err) => {
            warn!(archive = ?archive, error = %err, "archive extraction failed");
            if let Err(cleanup) = remove_staging(dest) {
                warn!(dest = ?dest, error = %cleanup, "failed to clean staging directory");
            }
            Err(err)
        }
    }
}

/// Remove a staging directory if it exists.
pub fn remove_staging(dest: &Path) -> Result<()> {
    if dest.exists() {
        debug!(dest = ?dest, "removing staging directory");
        fs::remove_dir_all(dest)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        let opts = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, body) in entries {
            zip.start_file(*name, opts).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn extracts_into_the_staging_dir() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("shop.zip");
        write_zip(
            &archive,
            &[("scripts/greet.route", "handler greet\n"), ("project.properties", "name = shop\n")],
        );

        let dest = staging_dir_for(dir.path(), &archive);
        assert_eq!(dest, dir.path().join(".hotroute").join("shop"));
        assert_eq!(extract(&archive, &dest).unwrap(), 2);
        assert_eq!(
            fs::read_to_string(dest.join("scripts/greet.route")).unwrap(),
            "handler greet\n"
        );
    }

    #[test]
    fn escaping_entries_abort_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("evil.zip");
        write_zip(&archive, &[("ok.txt", "x"), ("../escaped.txt", "x")]);

        let dest = staging_dir_for(dir.path(), &archive);
        let err = extract(&archive, &dest).unwrap_err();
        assert!(matches!(err, HotrouteError::Archive { .. }));
        assert!(!dest.exists());
        assert!(!dir.path().join(".hotroute/escaped.txt").exists());
    }

    #[test]
    fn garbage_is_an_archive_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("junk.zip");
        fs::write(&archive, "not a zip").unwrap();
        let err = extract(&archive, &staging_dir_for(dir.path(), &archive)).unwrap_err();
        assert!(matches!(err, HotrouteError::Archive { .. }));
    }
}
