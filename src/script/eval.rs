// src/script/eval.rs

//! Request-time evaluation of compiled rules.

use thiserror::Error;

use super::ast::{Guard, GuardSource, Rule, Stmt};
use super::pattern::Captures;
use crate::handler::{Handler, Outcome};
use crate::http::{Request, Response};

/// The message of a `raise` statement.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ScriptRaise(pub String);

/// A handler compiled from a `.route` source unit.
#[derive(Debug)]
pub struct ScriptHandler {
    name: String,
    rules: Vec<Rule>,
}

impl ScriptHandler {
    pub fn new(name: impl Into<String>, rules: Vec<Rule>) -> Self {
        Self {
            name: name.into(),
            rules,
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

/// Response mutations recorded while a rule runs. They only reach the real
/// response once the rule ends in `done` or `error`.
enum Effect {
    Status(u16),
    ContentType(String),
    Header(String, String),
    Write(String),
}

impl Handler for ScriptHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, req: &dyn Request, resp: &mut dyn Response) -> Outcome {
        for rule in &self.rules {
            if !rule.methods.matches(req.method()) {
                continue;
            }
            let Some(captures) = rule.pattern.matches(req.path()) else {
                continue;
            };
            if !rule.guards.iter().all(|g| guard_holds(g, req)) {
                continue;
            }
            return self.run(rule, &captures, req, resp);
        }
        Outcome::NotHandled
    }
}

impl ScriptHandler {
    fn run(
        &self,
        rule: &Rule,
        captures: &Captures,
        req: &dyn Request,
        resp: &mut dyn Response,
    ) -> Outcome {
        let mut effects = Vec::new();

        for stmt in &rule.body {
            match stmt {
                Stmt::Status(code) => effects.push(Effect::Status(*code)),
                Stmt::ContentType(ct) => effects.push(Effect::ContentType(ct.clone())),
                Stmt::Header(name, value) => {
                    effects.push(Effect::Header(name.clone(), value.render(req, captures)))
                }
                Stmt::Write(t) => effects.push(Effect::Write(t.render(req, captures))),
                Stmt::Done => {
                    apply(effects, resp);
                    return Outcome::Handled;
                }
                Stmt::Pass => return Outcome::NotHandled,
                Stmt::Raise(t) => {
                    let err = anyhow::Error::new(ScriptRaise(t.render(req, captures)))
                        .context(format!(
                            "handler `{}` raised in rule `{}` at line {}",
                            self.name, rule.pattern.raw, rule.line
                        ));
                    return Outcome::Raised(err);
                }
                Stmt::Error(code, t) => {
                    apply(effects, resp);
                    resp.send_error(*code, &t.render(req, captures));
                    return Outcome::Handled;
                }
            }
        }

        Outcome::Undefined
    }
}

fn guard_holds(guard: &Guard, req: &dyn Request) -> bool {
    let value = match guard.source {
        GuardSource::Query => req.query().get(&guard.name),
        GuardSource::Header => req.headers().get(&guard.name),
    };
    match (&guard.equals, value) {
        (None, Some(_)) => true,
        (Some(expected), Some(actual)) => expected == actual,
        (_, None) => false,
    }
}

fn apply(effects: Vec<Effect>, resp: &mut dyn Response) {
    for effect in effects {
        match effect {
            Effect::Status(code) => resp.set_status(code),
            Effect::ContentType(ct) => resp.set_content_type(&ct),
            Effect::Header(name, value) => resp.add_header(&name, &value),
            Effect::Write(text) => resp.write_text(&text),
        }
    }
}
