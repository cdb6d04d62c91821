// src/loader/mod.rs

//! Turning a source unit into an invocable handler.
//!
//! [`HandlerLoader`] is the pluggable seam; [`ScriptLoader`] is the shipped
//! implementation for `.route` units. A loader is pure with respect to the
//! registry: it returns a handler or a [`LoadError`] and the reload
//! coordinator decides what to do with it.

pub mod script_loader;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::handler::Handler;
use crate::script::{Diagnostic, SOURCE_EXTENSION};

pub use script_loader::ScriptLoader;

/// Directory under `scripts/` holding support units.
pub const LIB_DIR: &str = "lib";

/// Identity of a source unit: its path relative to the project's `scripts/`
/// directory, always with `/` separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceUnitId(String);

impl SourceUnitId {
    /// Build an id from a path relative to `scripts/`. Returns `None` for
    /// paths that are not source units: wrong extension, anything under
    /// `lib/`, or a `.` in a directory name or file stem.
    ///
    /// Dots are the separator in handler names, so `a.b.route` and
    /// `a/b.route` would otherwise both claim `a.b`.
    pub fn from_relative(rel: &Path) -> Option<Self> {
        if rel.extension().and_then(|e| e.to_str()) != Some(SOURCE_EXTENSION) {
            return None;
        }
        let parts: Vec<&str> = rel
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        let (file, dirs) = parts.split_last()?;
        let stem = file
            .strip_suffix(SOURCE_EXTENSION)
            .and_then(|s| s.strip_suffix('.'))?;
        if dirs
            .iter()
            .chain(std::iter::once(&stem))
            .any(|s| s.is_empty() || s.contains('.'))
        {
            return None;
        }
        if dirs.first() == Some(&LIB_DIR) {
            return None;
        }
        Some(Self(parts.join("/")))
    }

    /// Build an id for `path`, which must live below `scripts_dir`.
    pub fn from_path(scripts_dir: &Path, path: &Path) -> Option<Self> {
        let rel = path.strip_prefix(scripts_dir).ok()?;
        Self::from_relative(rel)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The handler name this unit must declare: the relative path without
    /// its extension, separators folded into `.`.
    ///
    /// `admin/Users.route` → `admin.Users`
    pub fn handler_name(&self) -> String {
        let stem = self
            .0
            .strip_suffix(SOURCE_EXTENSION)
            .and_then(|s| s.strip_suffix('.'))
            .unwrap_or(&self.0);
        stem.replace('/', ".")
    }

    pub fn path_under(&self, scripts_dir: &Path) -> PathBuf {
        self.0.split('/').fold(scripts_dir.to_path_buf(), |p, c| p.join(c))
    }
}

impl fmt::Display for SourceUnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a unit could not be turned into a handler. `unit` names the file the
/// problem is in, which for support-unit failures is the library file, not
/// the unit being loaded.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("{unit}: declares `{declared}` but its path requires `{expected}`")]
    NamingMismatch {
        unit: String,
        expected: String,
        declared: String,
    },

    #[error("{unit}: {reason}")]
    ContractViolation { unit: String, reason: String },

    #[error("{unit}: {} compile error(s)", .diagnostics.len())]
    CompileError {
        unit: String,
        diagnostics: Vec<Diagnostic>,
        /// Source lines referenced by `diagnostics`, keyed by line number.
        snippets: Vec<(usize, String)>,
    },
}

impl LoadError {
    pub fn kind(&self) -> &'static str {
        match self {
            LoadError::NamingMismatch { .. } => "NamingMismatch",
            LoadError::ContractViolation { .. } => "ContractViolation",
            LoadError::CompileError { .. } => "CompileError",
        }
    }

    pub fn unit(&self) -> &str {
        match self {
            LoadError::NamingMismatch { unit, .. }
            | LoadError::ContractViolation { unit, .. }
            | LoadError::CompileError { unit, .. } => unit,
        }
    }

    /// Build a compile error, keeping the source lines the diagnostics point
    /// at so [`LoadError::render`] can show them.
    pub fn compile(unit: impl Into<String>, source: &str, diagnostics: Vec<Diagnostic>) -> Self {
        let lines: Vec<&str> = source.lines().collect();
        let mut snippets: Vec<(usize, String)> = Vec::new();
        for d in &diagnostics {
            if snippets.iter().any(|(l, _)| *l == d.line) {
                continue;
            }
            if let Some(text) = d.line.checked_sub(1).and_then(|i| lines.get(i)) {
                snippets.push((d.line, (*text).to_string()));
            }
        }
        LoadError::CompileError {
            unit: unit.into(),
            diagnostics,
            snippets,
        }
    }

    /// Human-readable multi-line diagnostic.
    pub fn render(&self) -> String {
        let mut out = format!("{} in {}\n", self.kind(), self.unit());
        match self {
            LoadError::NamingMismatch { expected, declared, .. } => {
                out.push_str(&format!(
                    "  declared name `{declared}` does not match `{expected}` derived from the file path\n"
                ));
            }
            LoadError::ContractViolation { reason, .. } => {
                out.push_str(&format!("  {reason}\n"));
            }
            LoadError::CompileError { diagnostics, snippets, .. } => {
                for d in diagnostics {
                    out.push_str(&format!("  line {}, column {}: {}\n", d.line, d.column, d.message));
                    if let Some((_, text)) = snippets.iter().find(|(l, _)| *l == d.line) {
                        out.push_str(&format!("    | {text}\n"));
                        let pad = " ".repeat(d.column.saturating_sub(1));
                        out.push_str(&format!("    | {pad}^\n"));
                    }
                }
            }
        }
        out
    }
}

/// Produces handlers from source text.
pub trait HandlerLoader: Send + Sync {
    fn load(&self, unit: &SourceUnitId, source: &str) -> Result<Arc<dyn Handler>, LoadError>;
}
