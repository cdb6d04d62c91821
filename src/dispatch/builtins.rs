// src/dispatch/builtins.rs

//! Handlers the crate provides itself: the load-error diagnostic registered
//! for failed units, and the two documentation responders tried after every
//! project handler declined.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::fs::FileSystem;
use crate::handler::{Handler, Outcome};
use crate::http::{Request, Response};
use crate::loader::LoadError;
use crate::registry::{error_key, FunctionRegistry, Registration, ERROR_PREFIX};

/// Serves the rendered [`LoadError`] of one unit at `GET /error/{name}`.
#[derive(Debug)]
pub struct ErrorDiagnostic {
    key: String,
    target: String,
    error: LoadError,
}

impl ErrorDiagnostic {
    pub fn new(name: &str, error: LoadError) -> Self {
        Self {
            key: error_key(name),
            target: name.to_string(),
            error,
        }
    }

    pub fn into_handler(self) -> Arc<dyn Handler> {
        Arc::new(self)
    }
}

impl Handler for ErrorDiagnostic {
    fn name(&self) -> &str {
        &self.key
    }

    fn handle(&self, req: &dyn Request, resp: &mut dyn Response) -> Outcome {
        if !req.method().eq_ignore_ascii_case("GET") {
            return Outcome::NotHandled;
        }
        let Some(requested) = req.path().strip_prefix(ERROR_PREFIX) else {
            return Outcome::NotHandled;
        };
        if !requested.eq_ignore_ascii_case(&self.target) {
            return Outcome::NotHandled;
        }

        resp.set_status(200);
        resp.set_content_type("text/plain");
        resp.set_charset("utf-8");
        resp.write_text(&self.error.render());
        Outcome::Handled
    }
}

/// `GET /doc/{name}.json` → `<project>/specification/{name}.json`.
#[derive(Debug)]
pub struct ApiSpecResponder {
    spec_dir: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl ApiSpecResponder {
    pub const NAME: &'static str = "builtin:api-spec";

    pub fn new(spec_dir: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            spec_dir: spec_dir.into(),
            fs,
        }
    }
}

/// A specification name may only name a file directly inside the
/// specification directory.
fn is_safe_spec_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl Handler for ApiSpecResponder {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn handle(&self, req: &dyn Request, resp: &mut dyn Response) -> Outcome {
        if !req.method().eq_ignore_ascii_case("GET") {
            return Outcome::NotHandled;
        }
        let Some(name) = req
            .path()
            .strip_prefix("/doc/")
            .and_then(|rest| rest.strip_suffix(".json"))
        else {
            return Outcome::NotHandled;
        };

        if !is_safe_spec_name(name) {
            warn!(name = %name, "rejected specification request outside the specification directory");
            resp.send_error(400, "invalid specification name");
            return Outcome::Handled;
        }

        let path = self.spec_dir.join(format!("{name}.json"));
        if !self.fs.is_file(&path) {
            return Outcome::NotHandled;
        }
        match self.fs.read(&path) {
            Ok(bytes) => {
                resp.set_status(200);
                resp.set_content_type("application/json");
                resp.write_bytes(&bytes);
                Outcome::Handled
            }
            Err(err) => Outcome::Raised(err.context(format!("reading specification `{name}`"))),
        }
    }
}

/// `GET /doc` and `GET /doc/*`: JSON index of the project's handlers.
#[derive(Debug)]
pub struct DocResponder {
    project: String,
    registry: Arc<FunctionRegistry>,
}

#[derive(Debug, Serialize)]
struct DocIndex<'a> {
    project: &'a str,
    handlers: Vec<DocEntry>,
}

#[derive(Debug, Serialize)]
struct DocEntry {
    name: String,
    state: &'static str,
    since: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl DocResponder {
    pub const NAME: &'static str = "builtin:doc";

    pub fn new(project: impl Into<String>, registry: Arc<FunctionRegistry>) -> Self {
        Self {
            project: project.into(),
            registry,
        }
    }

    fn index(&self) -> DocIndex<'_> {
        let snapshot = self.registry.snapshot();
        let handlers = snapshot
            .iter()
            .filter(|(name, _)| !name.starts_with(ERROR_PREFIX))
            .map(|(name, reg)| DocEntry {
                name: name.clone(),
                state: reg.state(),
                since: reg.changed_at().to_rfc3339(),
                error: match reg {
                    Registration::Failed { error, .. } => Some(error.to_string()),
                    Registration::Active { .. } => None,
                },
            })
            .collect();
        DocIndex {
            project: &self.project,
            handlers,
        }
    }
}

impl Handler for DocResponder {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn handle(&self, req: &dyn Request, resp: &mut dyn Response) -> Outcome {
        if !req.method().eq_ignore_ascii_case("GET") {
            return Outcome::NotHandled;
        }
        let path = req.path();
        if path != "/doc" && !path.starts_with("/doc/") {
            return Outcome::NotHandled;
        }

        let body = match serde_json::to_vec_pretty(&self.index()) {
            Ok(body) => body,
            Err(err) => return Outcome::Raised(anyhow::Error::new(err).context("rendering doc index")),
        };
        debug!(project = %self.project, "serving doc index");
        resp.set_status(200);
        resp.set_content_type("application/json");
        resp.write_bytes(&body);
        Outcome::Handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::handler::FnHandler;
    use crate::http::{BufferedResponse, SimpleRequest};

    #[test]
    fn diagnostic_matches_name_case_insensitively() {
        let diag = ErrorDiagnostic::new(
            "greet",
            LoadError::ContractViolation {
                unit: "greet.route".into(),
                reason: "missing `handler greet` declaration".into(),
            },
        );
        assert_eq!(diag.name(), "/error/greet");

        let mut resp = BufferedResponse::new();
        assert!(diag.handle(&SimpleRequest::get("/error/GREET"), &mut resp).is_handled());
        assert_eq!(resp.status, 200);
        assert_eq!(resp.content_type.as_deref(), Some("text/plain"));
        assert_eq!(resp.charset.as_deref(), Some("utf-8"));
        assert!(resp.body_text().starts_with("ContractViolation in greet.route"));

        let mut resp = BufferedResponse::new();
        assert!(!diag.handle(&SimpleRequest::get("/error/other"), &mut resp).is_handled());
        assert!(!diag.handle(&SimpleRequest::new("POST", "/error/greet"), &mut resp).is_handled());
    }

    #[test]
    fn api_spec_serves_documents_and_rejects_traversal() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/specification/greet.json", r#"{"openapi":"3.0.0"}"#);
        let spec = ApiSpecResponder::new("/p/specification", Arc::new(fs));

        let mut resp = BufferedResponse::new();
        assert!(spec.handle(&SimpleRequest::get("/doc/greet.json"), &mut resp).is_handled());
        assert_eq!(resp.content_type.as_deref(), Some("application/json"));
        assert_eq!(resp.body_text(), r#"{"openapi":"3.0.0"}"#);

        let mut resp = BufferedResponse::new();
        assert!(!spec.handle(&SimpleRequest::get("/doc/missing.json"), &mut resp).is_handled());

        let mut resp = BufferedResponse::new();
        assert!(spec.handle(&SimpleRequest::get("/doc/..secret.json"), &mut resp).is_handled());
        assert_eq!(resp.status, 400);

        let mut resp = BufferedResponse::new();
        assert!(spec.handle(&SimpleRequest::get("/doc/a/../../b.json"), &mut resp).is_handled());
        assert_eq!(resp.status, 400);
    }

    #[test]
    fn doc_index_lists_handlers_and_failures() {
        let registry = Arc::new(FunctionRegistry::new());
        registry.insert_or_replace(
            "greet",
            Registration::active(Arc::new(FnHandler::new("greet", |_, _| Outcome::NotHandled))),
        );
        let err = LoadError::ContractViolation {
            unit: "broken.route".into(),
            reason: "no rules".into(),
        };
        registry.insert_or_replace("broken", Registration::failed(err.clone()));
        registry.insert_or_replace(
            error_key("broken"),
            Registration::active(ErrorDiagnostic::new("broken", err).into_handler()),
        );

        let doc = DocResponder::new("demo", registry);
        let mut resp = BufferedResponse::new();
        assert!(doc.handle(&SimpleRequest::get("/doc/anything"), &mut resp).is_handled());

        let json: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(json["project"], "demo");
        let handlers = json["handlers"].as_array().unwrap();
        assert_eq!(handlers.len(), 2);
        assert_eq!(handlers[0]["name"], "greet");
        assert_eq!(handlers[0]["state"], "active");
        assert_eq!(handlers[1]["state"], "failed");
        assert_eq!(handlers[1]["error"], "broken.route: no rules");

        let mut resp = BufferedResponse::new();
        assert!(!doc.handle(&SimpleRequest::get("/docs"), &mut resp).is_handled());
    }
}
