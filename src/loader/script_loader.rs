// src/loader/script_loader.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::{HandlerLoader, LoadError, SourceUnitId, LIB_DIR};
use crate::fs::{is_hidden, FileSystem};
use crate::handler::Handler;
use crate::script::ast::Declaration;
use crate::script::{parse_unit, Diagnostic, Libraries, ScriptHandler, UnitKind, SOURCE_EXTENSION};

/// Library names that would shadow built-in placeholder namespaces.
const RESERVED_LIBRARY_NAMES: &[&str] = &["query", "header"];

/// Loader for `.route` units.
///
/// Every load side-loads the support units in `<scripts>/lib/` first, so a
/// change to a library is picked up by the next reload of any unit.
#[derive(Debug, Clone)]
pub struct ScriptLoader {
    scripts_dir: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl ScriptLoader {
    pub fn new(scripts_dir: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            scripts_dir: scripts_dir.into(),
            fs,
        }
    }

    pub fn lib_dir(&self) -> PathBuf {
        self.scripts_dir.join(LIB_DIR)
    }

    /// Compile every support unit, in file-name order.
    pub fn load_libraries(&self) -> Result<Libraries, LoadError> {
        let mut libraries = Libraries::new();
        let lib_dir = self.lib_dir();
        if !self.fs.is_dir(&lib_dir) {
            return Ok(libraries);
        }

        let entries = self.fs.read_dir(&lib_dir).map_err(|e| LoadError::ContractViolation {
            unit: format!("{LIB_DIR}/"),
            reason: format!("cannot list support units: {e:#}"),
        })?;

        for path in entries {
            if is_hidden(&path)
                || !self.fs.is_file(&path)
                || path.extension().and_then(|e| e.to_str()) != Some(SOURCE_EXTENSION)
            {
                continue;
            }
            let (name, consts) = self.load_library(&path)?;
            libraries.insert(name, consts);
        }

        Ok(libraries)
    }

    fn load_library(
        &self,
        path: &Path,
    ) -> Result<(String, std::collections::BTreeMap<String, String>), LoadError> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let unit = format!("{LIB_DIR}/{stem}.{SOURCE_EXTENSION}");

        let source = self.fs.read_to_string(path).map_err(|e| {
            LoadError::compile(
                unit.clone(),
                "",
                vec![Diagnostic::new(1, 1, format!("cannot read support unit: {e:#}"))],
            )
        })?;

        let parsed = parse_unit(&source, UnitKind::Library, &Libraries::new())
            .map_err(|diags| LoadError::compile(unit.clone(), &source, diags))?;

        match parsed.declaration {
            Some((Declaration::Library(name), _)) if name == stem => {
                if RESERVED_LIBRARY_NAMES.contains(&name.as_str()) {
                    return Err(LoadError::ContractViolation {
                        unit,
                        reason: format!("library name `{name}` is reserved"),
                    });
                }
                debug!(library = %name, constants = parsed.lets.len(), "side-loaded support unit");
                Ok((name, parsed.lets))
            }
            Some((Declaration::Library(name), _)) => Err(LoadError::NamingMismatch {
                unit,
                expected: stem,
                declared: name,
            }),
            Some((Declaration::Handler(_), _)) | None => Err(LoadError::ContractViolation {
                unit,
                reason: "support units must declare `library <name>`".to_string(),
            }),
        }
    }
}

impl HandlerLoader for ScriptLoader {
    fn load(&self, unit: &SourceUnitId, source: &str) -> Result<Arc<dyn Handler>, LoadError> {
        let libraries = self.load_libraries()?;
        let expected = unit.handler_name();

        let parsed = parse_unit(source, UnitKind::Handler, &libraries)
            .map_err(|diags| LoadError::compile(unit.as_str(), source, diags))?;

        let declared = match parsed.declaration {
            Some((Declaration::Handler(name), _)) => name,
            Some((Declaration::Library(_), line)) => {
                return Err(LoadError::ContractViolation {
                    unit: unit.to_string(),
                    reason: format!(
                        "line {line} declares a library; source units must declare `handler {expected}`"
                    ),
                });
            }
            None => {
                return Err(LoadError::ContractViolation {
                    unit: unit.to_string(),
                    reason: format!("missing `handler {expected}` declaration"),
                });
            }
        };

        if declared != expected {
            return Err(LoadError::NamingMismatch {
                unit: unit.to_string(),
                expected,
                declared,
            });
        }

        if parsed.rules.is_empty() {
            return Err(LoadError::ContractViolation {
                unit: unit.to_string(),
                reason: "declares no `on` rules, so it can never handle a request".to_string(),
            });
        }

        debug!(handler = %declared, rules = parsed.rules.len(), "compiled handler");
        Ok(Arc::new(ScriptHandler::new(declared, parsed.rules)))
    }
}
