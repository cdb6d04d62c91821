// src/script/template.rs

//! `{placeholder}` interpolation in string literals.

use std::collections::BTreeMap;

use super::ast::{Part, Template, Var};
use super::pattern::Captures;
use super::Diagnostic;
use crate::http::Request;

/// Names a template may refer to while it is being compiled.
#[derive(Debug, Default)]
pub struct Scope<'a> {
    /// Path parameters of the enclosing rule.
    pub params: Vec<&'a str>,
    /// Whether the enclosing rule's pattern ends in `*`.
    pub has_tail: bool,
    /// Constants declared in the unit itself.
    pub lets: Option<&'a BTreeMap<String, String>>,
    /// Constants exported by support units, keyed by library name.
    pub libraries: Option<&'a BTreeMap<String, BTreeMap<String, String>>>,
}

/// Compile a string literal into a template.
///
/// `cols[i]` is the source column of `value`'s i-th character; it is used to
/// point diagnostics at the offending placeholder.
pub fn compile_template(
    value: &str,
    cols: &[usize],
    line: usize,
    scope: &Scope<'_>,
) -> Result<Template, Diagnostic> {
    let chars: Vec<char> = value.chars().collect();
    let col_at = |i: usize| cols.get(i).copied().unwrap_or(1);
    let mut parts = Vec::new();
    let mut text = String::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '{' if chars.get(i + 1) == Some(&'{') => {
                text.push('{');
                i += 2;
            }
            '}' if chars.get(i + 1) == Some(&'}') => {
                text.push('}');
                i += 2;
            }
            '}' => {
                return Err(Diagnostic::new(
                    line,
                    col_at(i),
                    "unmatched `}` (write `}}` for a literal brace)",
                ));
            }
            '{' => {
                let open = i;
                let close = chars[open..]
                    .iter()
                    .position(|c| *c == '}')
                    .map(|p| open + p)
                    .ok_or_else(|| {
                        Diagnostic::new(line, col_at(open), "unterminated `{` placeholder")
                    })?;
                let name: String = chars[open + 1..close].iter().collect();
                match resolve(&name, scope) {
                    Ok(Resolved::Var(var)) => {
                        if !text.is_empty() {
                            parts.push(Part::Text(std::mem::take(&mut text)));
                        }
                        parts.push(Part::Var(var));
                    }
                    Ok(Resolved::Const(value)) => text.push_str(&value),
                    Err(message) => return Err(Diagnostic::new(line, col_at(open), message)),
                }
                i = close + 1;
            }
            c => {
                text.push(c);
                i += 1;
            }
        }
    }

    if !text.is_empty() {
        parts.push(Part::Text(text));
    }
    Ok(Template { parts })
}

enum Resolved {
    Var(Var),
    Const(String),
}

fn resolve(name: &str, scope: &Scope<'_>) -> Result<Resolved, String> {
    let name = name.trim();
    if let Some((ns, key)) = name.split_once('.') {
        if key.is_empty() {
            return Err(format!("empty key in placeholder `{{{name}}}`"));
        }
        return match ns {
            "query" => Ok(Resolved::Var(Var::Query(key.to_string()))),
            "header" => Ok(Resolved::Var(Var::Header(key.to_string()))),
            lib => {
                let consts = scope
                    .libraries
                    .and_then(|libs| libs.get(lib))
                    .ok_or_else(|| format!("unknown library `{lib}` in `{{{name}}}`"))?;
                consts
                    .get(key)
                    .map(|v| Resolved::Const(v.clone()))
                    .ok_or_else(|| format!("library `{lib}` has no constant `{key}`"))
            }
        };
    }

    match name {
        "" => Err("empty placeholder `{}`".to_string()),
        "method" => Ok(Resolved::Var(Var::Method)),
        "path" => Ok(Resolved::Var(Var::Path)),
        "body" => Ok(Resolved::Var(Var::Body)),
        "tail" if scope.has_tail => Ok(Resolved::Var(Var::Tail)),
        _ if scope.params.contains(&name) => Ok(Resolved::Var(Var::Param(name.to_string()))),
        _ => scope
            .lets
            .and_then(|lets| lets.get(name))
            .map(|v| Resolved::Const(v.clone()))
            .ok_or_else(|| format!("unknown name `{name}` in placeholder")),
    }
}

impl Template {
    pub fn literal(text: impl Into<String>) -> Self {
        Self {
            parts: vec![Part::Text(text.into())],
        }
    }

    pub fn render(&self, req: &dyn Request, captures: &Captures) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Text(t) => out.push_str(t),
                Part::Var(var) => match var {
                    Var::Param(p) => out.push_str(captures.get(p).map(String::as_str).unwrap_or("")),
                    Var::Tail => out.push_str(captures.get("tail").map(String::as_str).unwrap_or("")),
                    Var::Method => out.push_str(req.method()),
                    Var::Path => out.push_str(req.path()),
                    Var::Body => out.push_str(&req.body_text()),
                    Var::Query(q) => out.push_str(req.query().get(q).unwrap_or("")),
                    Var::Header(h) => out.push_str(req.headers().get(h).unwrap_or("")),
                },
            }
        }
        out
    }
}
