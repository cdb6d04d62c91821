// src/script/mod.rs

//! The `.route` handler language.
//!
//! A source unit looks like:
//!
//! ```text
//! handler Greet
//! let hello = "Hello"
//!
//! on GET /greet/{name}
//!   when query polite
//!   type text/plain
//!   write "{hello}, {name}{common.punct}"
//!   done
//! ```
//!
//! Support units under `scripts/lib/` declare `library <name>` and export
//! `let` constants that source units reference as `{<name>.<constant>}`.
//!
//! This module only compiles and evaluates; identity checks (naming and
//! handler contract) are the loader's job.

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod pattern;
pub mod template;

use std::fmt;

pub use eval::{ScriptHandler, ScriptRaise};
pub use parser::{parse_unit, Libraries, UnitKind};

/// File extension of source and support units.
pub const SOURCE_EXTENSION: &str = "route";

/// A compile problem at a 1-based line/column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl Diagnostic {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}
