// src/script/ast.rs

//! Compiled form of a `.route` unit.

use std::collections::BTreeMap;

/// `handler <Name>` or `library <name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    Handler(String),
    Library(String),
}

/// A parsed source or support unit.
#[derive(Debug, Clone, Default)]
pub struct Unit {
    /// The declaration and the line it appeared on.
    pub declaration: Option<(Declaration, usize)>,
    pub lets: BTreeMap<String, String>,
    pub rules: Vec<Rule>,
}

/// Methods a rule answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Methods {
    Any,
    List(Vec<String>),
}

impl Methods {
    pub fn matches(&self, method: &str) -> bool {
        match self {
            Methods::Any => true,
            Methods::List(list) => list.iter().any(|m| m.eq_ignore_ascii_case(method)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param(String),
    /// Trailing `*`: zero or more segments, exposed as `{tail}`.
    Rest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub raw: String,
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardSource {
    Query,
    Header,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guard {
    pub source: GuardSource,
    pub name: String,
    pub equals: Option<String>,
}

/// A value that is interpolated at request time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Var {
    Param(String),
    Tail,
    Method,
    Path,
    Body,
    Query(String),
    Header(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Text(String),
    Var(Var),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Template {
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Status(u16),
    ContentType(String),
    Header(String, Template),
    Write(Template),
    Done,
    Pass,
    Raise(Template),
    Error(u16, Template),
}

impl Stmt {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Stmt::Done | Stmt::Pass | Stmt::Raise(_) | Stmt::Error(_, _)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub line: usize,
    pub methods: Methods,
    pub pattern: Pattern,
    pub guards: Vec<Guard>,
    pub body: Vec<Stmt>,
}
