// src/script/parser.rs

//! Line-oriented parser for `.route` units.
//!
//! Parsing does not stop at the first problem: every line is examined and
//! all diagnostics are returned together, so an operator sees the whole list
//! at `/error/{name}`.

use std::collections::BTreeMap;

use super::ast::{Declaration, Guard, GuardSource, Methods, Rule, Stmt, Unit};
use super::lexer::{tokenize_line, Token, TokenKind};
use super::pattern::{is_ident, parse_pattern};
use super::template::{compile_template, Scope};
use super::Diagnostic;
use crate::script::ast::Template;

/// Which kind of unit is being parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// A source unit under `scripts/`.
    Handler,
    /// A support unit under `scripts/lib/`.
    Library,
}

/// Constants exported by support units, keyed by library name.
pub type Libraries = BTreeMap<String, BTreeMap<String, String>>;

struct OpenRule {
    rule: Rule,
    /// Keyword of the terminal statement, once one has been seen.
    terminated_by: Option<String>,
}

struct Parser<'a> {
    kind: UnitKind,
    libraries: &'a Libraries,
    unit: Unit,
    open: Option<OpenRule>,
    diagnostics: Vec<Diagnostic>,
}

pub fn parse_unit(
    source: &str,
    kind: UnitKind,
    libraries: &Libraries,
) -> Result<Unit, Vec<Diagnostic>> {
    let mut parser = Parser {
        kind,
        libraries,
        unit: Unit::default(),
        open: None,
        diagnostics: Vec::new(),
    };

    for (idx, line) in source.lines().enumerate() {
        let line_no = idx + 1;
        match tokenize_line(line, line_no) {
            Ok(tokens) if tokens.is_empty() => {}
            Ok(tokens) => {
                if let Err(diag) = parser.line(&tokens, line_no) {
                    parser.diagnostics.push(diag);
                }
            }
            Err(diag) => parser.diagnostics.push(diag),
        }
    }
    parser.close_rule();

    if parser.diagnostics.is_empty() {
        Ok(parser.unit)
    } else {
        Err(parser.diagnostics)
    }
}

impl Parser<'_> {
    fn line(&mut self, tokens: &[Token], line: usize) -> Result<(), Diagnostic> {
        let head = &tokens[0];
        let Some(keyword) = head.word() else {
            return Err(Diagnostic::new(line, head.column, "expected a keyword, found a string"));
        };

        match keyword {
            "handler" | "library" => self.declaration(keyword, tokens, line),
            "let" => self.constant(tokens, line),
            "on" => self.rule(tokens, line),
            "when" => self.guard(tokens, line),
            "status" | "type" | "header" | "write" | "done" | "pass" | "raise" | "error" => {
                self.statement(keyword, tokens, line)
            }
            other => Err(Diagnostic::new(
                line,
                head.column,
                format!("unknown statement `{other}`"),
            )),
        }
    }

    fn declaration(&mut self, keyword: &str, tokens: &[Token], line: usize) -> Result<(), Diagnostic> {
        self.ensure_top_level(keyword, &tokens[0], line)?;
        expect_len(tokens, 2, line, "expected `<keyword> <name>`")?;
        let name = word_at(tokens, 1, line, "a name")?;
        if !name.split('.').all(is_ident) {
            return Err(Diagnostic::new(
                line,
                tokens[1].column,
                format!("invalid {keyword} name `{name}`"),
            ));
        }
        if let Some((_, first)) = &self.unit.declaration {
            return Err(Diagnostic::new(
                line,
                tokens[0].column,
                format!("duplicate declaration (first declared on line {first})"),
            ));
        }
        let decl = if keyword == "handler" {
            Declaration::Handler(name.to_string())
        } else {
            Declaration::Library(name.to_string())
        };
        self.unit.declaration = Some((decl, line));
        Ok(())
    }

    fn constant(&mut self, tokens: &[Token], line: usize) -> Result<(), Diagnostic> {
        self.ensure_top_level("let", &tokens[0], line)?;
        expect_len(tokens, 4, line, "expected `let <name> = \"<value>\"`")?;
        let name = word_at(tokens, 1, line, "a constant name")?;
        if !is_ident(name) {
            return Err(Diagnostic::new(line, tokens[1].column, format!("invalid constant name `{name}`")));
        }
        if word_at(tokens, 2, line, "`=`")? != "=" {
            return Err(Diagnostic::new(line, tokens[2].column, "expected `=`"));
        }
        let (value, _) = string_at(tokens, 3, line)?;
        if self.unit.lets.contains_key(name) {
            return Err(Diagnostic::new(line, tokens[1].column, format!("constant `{name}` is already defined")));
        }
        self.unit.lets.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn rule(&mut self, tokens: &[Token], line: usize) -> Result<(), Diagnostic> {
        self.close_rule();
        if self.kind == UnitKind::Library {
            return Err(Diagnostic::new(line, tokens[0].column, "libraries cannot declare rules"));
        }
        expect_len(tokens, 3, line, "expected `on <METHODS> <path>`")?;

        let methods_raw = word_at(tokens, 1, line, "a method list")?;
        let methods = if methods_raw == "*" {
            Methods::Any
        } else {
            let mut list = Vec::new();
            for m in methods_raw.split(',') {
                if m.is_empty() || !m.chars().all(|c| c.is_ascii_alphabetic()) {
                    return Err(Diagnostic::new(
                        line,
                        tokens[1].column,
                        format!("invalid method list `{methods_raw}`"),
                    ));
                }
                list.push(m.to_ascii_uppercase());
            }
            Methods::List(list)
        };

        let raw = word_at(tokens, 2, line, "a path pattern")?;
        let pattern = parse_pattern(raw)
            .map_err(|(offset, msg)| Diagnostic::new(line, tokens[2].column + offset, msg))?;

        self.open = Some(OpenRule {
            rule: Rule {
                line,
                methods,
                pattern,
                guards: Vec::new(),
                body: Vec::new(),
            },
            terminated_by: None,
        });
        Ok(())
    }

    fn guard(&mut self, tokens: &[Token], line: usize) -> Result<(), Diagnostic> {
        let open = self.open_rule("when", &tokens[0], line)?;
        if !open.rule.body.is_empty() {
            return Err(Diagnostic::new(line, tokens[0].column, "`when` guards must come before statements"));
        }
        if tokens.len() != 3 && tokens.len() != 5 {
            return Err(Diagnostic::new(
                line,
                tokens[0].column,
                "expected `when query|header <name> [= \"<value>\"]`",
            ));
        }
        let source = match word_at(tokens, 1, line, "`query` or `header`")? {
            "query" => GuardSource::Query,
            "header" => GuardSource::Header,
            other => {
                return Err(Diagnostic::new(
                    line,
                    tokens[1].column,
                    format!("unknown guard source `{other}` (expected `query` or `header`)"),
                ));
            }
        };
        let name = word_at(tokens, 2, line, "a name")?.to_string();
        let equals = if tokens.len() == 5 {
            if word_at(tokens, 3, line, "`=`")? != "=" {
                return Err(Diagnostic::new(line, tokens[3].column, "expected `=`"));
            }
            Some(string_at(tokens, 4, line)?.0.to_string())
        } else {
            None
        };
        open.rule.guards.push(Guard { source, name, equals });
        Ok(())
    }

    fn statement(&mut self, keyword: &str, tokens: &[Token], line: usize) -> Result<(), Diagnostic> {
        let libraries = self.libraries;
        let lets = self.unit.lets.clone();
        let open = self.open_rule(keyword, &tokens[0], line)?;
        if let Some(terminal) = &open.terminated_by {
            return Err(Diagnostic::new(
                line,
                tokens[0].column,
                format!("unreachable statement after `{terminal}`"),
            ));
        }

        let params: Vec<String> = open.rule.pattern.param_names().map(str::to_string).collect();
        let scope = Scope {
            params: params.iter().map(String::as_str).collect(),
            has_tail: open.rule.pattern.has_rest(),
            lets: Some(&lets),
            libraries: Some(libraries),
        };
        let template_at = |idx: usize| -> Result<Template, Diagnostic> {
            let (value, cols) = string_at(tokens, idx, line)?;
            compile_template(value, cols, line, &scope)
        };

        let stmt = match keyword {
            "status" => {
                expect_len(tokens, 2, line, "expected `status <code>`")?;
                Stmt::Status(status_at(tokens, 1, line)?)
            }
            "type" => {
                expect_len(tokens, 2, line, "expected `type <content-type>`")?;
                let ct = match &tokens[1].kind {
                    TokenKind::Word(w) => w.clone(),
                    TokenKind::Str { value, .. } => value.clone(),
                };
                Stmt::ContentType(ct)
            }
            "header" => {
                expect_len(tokens, 3, line, "expected `header <Name> \"<value>\"`")?;
                let name = word_at(tokens, 1, line, "a header name")?.to_string();
                Stmt::Header(name, template_at(2)?)
            }
            "write" => {
                expect_len(tokens, 2, line, "expected `write \"<text>\"`")?;
                Stmt::Write(template_at(1)?)
            }
            "done" => {
                expect_len(tokens, 1, line, "`done` takes no arguments")?;
                Stmt::Done
            }
            "pass" => {
                expect_len(tokens, 1, line, "`pass` takes no arguments")?;
                Stmt::Pass
            }
            "raise" => {
                expect_len(tokens, 2, line, "expected `raise \"<message>\"`")?;
                Stmt::Raise(template_at(1)?)
            }
            _ => {
                expect_len(tokens, 3, line, "expected `error <code> \"<message>\"`")?;
                Stmt::Error(status_at(tokens, 1, line)?, template_at(2)?)
            }
        };

        if stmt.is_terminal() {
            open.terminated_by = Some(keyword.to_string());
        }
        open.rule.body.push(stmt);
        Ok(())
    }

    fn ensure_top_level(&self, keyword: &str, head: &Token, line: usize) -> Result<(), Diagnostic> {
        if self.open.is_some() || !self.unit.rules.is_empty() {
            return Err(Diagnostic::new(
                line,
                head.column,
                format!("`{keyword}` must appear before the first rule"),
            ));
        }
        Ok(())
    }

    fn open_rule(&mut self, keyword: &str, head: &Token, line: usize) -> Result<&mut OpenRule, Diagnostic> {
        self.open.as_mut().ok_or_else(|| {
            Diagnostic::new(
                line,
                head.column,
                format!("`{keyword}` is only allowed inside an `on` rule"),
            )
        })
    }

    fn close_rule(&mut self) {
        if let Some(open) = self.open.take() {
            self.unit.rules.push(open.rule);
        }
    }
}

fn expect_len(tokens: &[Token], n: usize, line: usize, usage: &str) -> Result<(), Diagnostic> {
    if tokens.len() == n {
        return Ok(());
    }
    let column = tokens.get(n).or_else(|| tokens.last()).map(|t| t.column).unwrap_or(1);
    Err(Diagnostic::new(line, column, usage))
}

fn word_at<'t>(tokens: &'t [Token], idx: usize, line: usize, what: &str) -> Result<&'t str, Diagnostic> {
    let tok = &tokens[idx];
    tok.word()
        .ok_or_else(|| Diagnostic::new(line, tok.column, format!("expected {what}, found a string")))
}

fn string_at(tokens: &[Token], idx: usize, line: usize) -> Result<(&str, &[usize]), Diagnostic> {
    match &tokens[idx].kind {
        TokenKind::Str { value, cols } => Ok((value, cols)),
        TokenKind::Word(w) => Err(Diagnostic::new(
            line,
            tokens[idx].column,
            format!("expected a quoted string, found `{w}`"),
        )),
    }
}

fn status_at(tokens: &[Token], idx: usize, line: usize) -> Result<u16, Diagnostic> {
    let raw = word_at(tokens, idx, line, "a status code")?;
    match raw.parse::<u16>() {
        Ok(code) if (100..=599).contains(&code) => Ok(code),
        _ => Err(Diagnostic::new(
            line,
            tokens[idx].column,
            format!("invalid status code `{raw}`"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::ast::Segment;

    fn parse(src: &str) -> Result<Unit, Vec<Diagnostic>> {
        parse_unit(src, UnitKind::Handler, &Libraries::new())
    }

    #[test]
    fn parses_a_complete_handler() {
        let unit = parse(
            r#"
# greeting handler
handler Greet
let hello = "Hello"

on GET,HEAD /greet/{name}
  when query polite = "yes"
  status 200
  type text/plain
  header X-Greeter "hotroute"
  write "{hello}, {name}"
  done

on * /greet
  pass
"#,
        )
        .unwrap();

        assert_eq!(unit.declaration, Some((Declaration::Handler("Greet".into()), 3)));
        assert_eq!(unit.rules.len(), 2);
        let first = &unit.rules[0];
        assert_eq!(first.methods, Methods::List(vec!["GET".into(), "HEAD".into()]));
        assert_eq!(first.pattern.segments[1], Segment::Param("name".into()));
        assert_eq!(first.guards.len(), 1);
        assert_eq!(first.body.len(), 5);
        assert_eq!(unit.rules[1].methods, Methods::Any);
    }

    #[test]
    fn collects_every_diagnostic_with_positions() {
        let errs = parse(
            "handler X\non GET /a\n  write \"{nope}\"\n  frobnicate\non GET b\n",
        )
        .unwrap_err();

        let positions: Vec<(usize, usize)> = errs.iter().map(|d| (d.line, d.column)).collect();
        assert_eq!(positions, vec![(3, 10), (4, 3), (5, 8)]);
        assert!(errs[1].message.contains("frobnicate"));
    }

    #[test]
    fn statements_after_a_terminal_are_unreachable() {
        let errs = parse("handler X\non GET /a\n  done\n  write \"late\"\n").unwrap_err();
        assert_eq!(errs.len(), 1);
        assert!(errs[0].message.contains("unreachable"));
    }

    #[test]
    fn statements_outside_rules_and_late_declarations_are_rejected() {
        let errs = parse("write \"x\"\non GET /a\n  done\nhandler X\nlet y = \"z\"\n").unwrap_err();
        assert_eq!(errs.len(), 3);
        assert!(errs[0].message.contains("only allowed inside"));
        assert!(errs[1].message.contains("before the first rule"));
    }

    #[test]
    fn libraries_export_constants_and_reject_rules() {
        let lib = parse_unit("library common\nlet sig = \"-- hr\"\n", UnitKind::Library, &Libraries::new())
            .unwrap();
        assert_eq!(lib.declaration, Some((Declaration::Library("common".into()), 1)));
        assert_eq!(lib.lets.get("sig").map(String::as_str), Some("-- hr"));

        let errs = parse_unit("library common\non GET /x\n", UnitKind::Library, &Libraries::new())
            .unwrap_err();
        assert!(errs[0].message.contains("cannot declare rules"));
    }

    #[test]
    fn library_constants_resolve_in_templates() {
        let mut libs = Libraries::new();
        libs.insert("common".into(), BTreeMap::from([("sig".into(), "!".into())]));
        let unit = parse_unit(
            "handler X\non GET /a\n  write \"hi{common.sig}\"\n  done\n",
            UnitKind::Handler,
            &libs,
        )
        .unwrap();
        assert_eq!(
            unit.rules[0].body[0],
            Stmt::Write(Template::literal("hi!"))
        );
    }
}
