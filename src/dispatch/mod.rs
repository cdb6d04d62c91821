// src/dispatch/mod.rs

//! Ordered first-match request dispatch for one project.
//!
//! Project handlers are tried in registration order against the registry
//! snapshot taken when the request arrives; a reload that lands mid-request
//! is only seen by the next request. When every handler declines, the
//! built-in responders get a turn before the request is reported missing.

pub mod builtins;

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::fs::FileSystem;
use crate::handler::{Handler, Outcome};
use crate::http::{Request, Response};
use crate::metrics::Metrics;
use crate::registry::FunctionRegistry;

pub use builtins::{ApiSpecResponder, DocResponder, ErrorDiagnostic};

/// Why a request produced no normal response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// A handler raised while handling. `message` is the innermost cause.
    #[error("handler `{handler}` failed: {message}")]
    Fault { handler: String, message: String },

    /// A handler returned no result at all.
    #[error("handler `{handler}` produced no result")]
    Defect { handler: String },

    #[error("no route for {method} {path}")]
    MissingRoute { method: String, path: String },
}

impl DispatchError {
    pub fn status(&self) -> u16 {
        match self {
            DispatchError::MissingRoute { .. } => 404,
            DispatchError::Fault { .. } | DispatchError::Defect { .. } => 500,
        }
    }

    /// Write this error through the response's structured-error writer.
    pub fn write_to(&self, resp: &mut dyn Response) {
        resp.send_error(self.status(), &self.to_string());
    }

    pub fn missing(req: &dyn Request) -> Self {
        DispatchError::MissingRoute {
            method: req.method().to_string(),
            path: req.path().to_string(),
        }
    }
}

/// Which handler answered a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    pub handler: String,
    /// True when a built-in responder answered rather than a project handler.
    pub builtin: bool,
}

#[derive(Debug)]
pub struct Dispatcher {
    project: String,
    registry: Arc<FunctionRegistry>,
    builtins: Vec<Arc<dyn Handler>>,
    metrics: Arc<Metrics>,
}

impl Dispatcher {
    pub fn new(
        project: impl Into<String>,
        registry: Arc<FunctionRegistry>,
        spec_dir: impl Into<PathBuf>,
        fs: Arc<dyn FileSystem>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let project = project.into();
        let builtins: Vec<Arc<dyn Handler>> = vec![
            Arc::new(ApiSpecResponder::new(spec_dir, fs)),
            Arc::new(DocResponder::new(project.clone(), Arc::clone(&registry))),
        ];
        Self {
            project,
            registry,
            builtins,
            metrics,
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        &self.registry
    }

    pub fn dispatch(
        &self,
        req: &dyn Request,
        resp: &mut dyn Response,
    ) -> Result<Dispatched, DispatchError> {
        let snapshot = self.registry.snapshot();
        let project_handlers = snapshot
            .iter()
            .filter_map(|(name, reg)| reg.handler().map(|h| (name.as_str(), h, false)));
        let builtins = self.builtins.iter().map(|h| (h.name(), h, true));

        for (name, handler, builtin) in project_handlers.chain(builtins) {
            match handler.handle(req, resp) {
                Outcome::Handled => {
                    debug!(
                        project = %self.project,
                        handler = %name,
                        method = %req.method(),
                        path = %req.path(),
                        "request handled"
                    );
                    self.metrics.record_handled();
                    return Ok(Dispatched {
                        handler: name.to_string(),
                        builtin,
                    });
                }
                Outcome::NotHandled => continue,
                Outcome::Raised(err) => {
                    let message = err.root_cause().to_string();
                    warn!(
                        project = %self.project,
                        handler = %name,
                        error = %format!("{err:#}"),
                        "handler raised"
                    );
                    self.metrics.record_fault();
                    return Err(DispatchError::Fault {
                        handler: name.to_string(),
                        message,
                    });
                }
                Outcome::Undefined => {
                    error!(
                        project = %self.project,
                        handler = %name,
                        path = %req.path(),
                        "handler produced no result"
                    );
                    self.metrics.record_defect();
                    return Err(DispatchError::Defect {
                        handler: name.to_string(),
                    });
                }
            }
        }

        self.metrics.record_not_found();
        Err(DispatchError::missing(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::handler::FnHandler;
    use crate::http::{BufferedResponse, SimpleRequest};
    use crate::registry::Registration;

    fn dispatcher(registry: Arc<FunctionRegistry>) -> Dispatcher {
        Dispatcher::new(
            "demo",
            registry,
            "/p/specification",
            Arc::new(MockFileSystem::new()),
            Arc::new(Metrics::new()),
        )
    }

    fn put(registry: &FunctionRegistry, name: &str, f: fn(&dyn Request, &mut dyn Response) -> Outcome) {
        registry.insert_or_replace(name, Registration::active(Arc::new(FnHandler::new(name, f))));
    }

    #[test]
    fn first_handler_that_accepts_wins() {
        let registry = Arc::new(FunctionRegistry::new());
        put(&registry, "decline", |_, _| Outcome::NotHandled);
        put(&registry, "first", |_, resp| {
            resp.write_text("first");
            Outcome::Handled
        });
        put(&registry, "second", |_, resp| {
            resp.write_text("second");
            Outcome::Handled
        });

        let d = dispatcher(registry);
        let mut resp = BufferedResponse::new();
        let out = d.dispatch(&SimpleRequest::get("/x"), &mut resp).unwrap();
        assert_eq!(out.handler, "first");
        assert!(!out.builtin);
        assert_eq!(resp.body_text(), "first");
    }

    #[test]
    fn raised_errors_report_the_root_cause() {
        let registry = Arc::new(FunctionRegistry::new());
        put(&registry, "boom", |_, _| {
            let err = anyhow::anyhow!("disk on fire").context("layer one").context("layer two");
            Outcome::Raised(err)
        });

        let d = dispatcher(registry);
        let err = d.dispatch(&SimpleRequest::get("/x"), &mut BufferedResponse::new()).unwrap_err();
        assert_eq!(
            err,
            DispatchError::Fault {
                handler: "boom".into(),
                message: "disk on fire".into(),
            }
        );
        assert_eq!(err.status(), 500);
    }

    #[test]
    fn undefined_is_a_defect_not_a_decline() {
        let registry = Arc::new(FunctionRegistry::new());
        put(&registry, "broken", |_, _| Outcome::Undefined);
        put(&registry, "fallback", |_, _| Outcome::Handled);

        let d = dispatcher(registry);
        let err = d.dispatch(&SimpleRequest::get("/x"), &mut BufferedResponse::new()).unwrap_err();
        assert_eq!(err, DispatchError::Defect { handler: "broken".into() });
    }

    #[test]
    fn builtins_run_after_project_handlers_then_missing_route() {
        let registry = Arc::new(FunctionRegistry::new());
        put(&registry, "decline", |_, _| Outcome::NotHandled);
        let d = dispatcher(registry);

        let mut resp = BufferedResponse::new();
        let out = d.dispatch(&SimpleRequest::get("/doc"), &mut resp).unwrap();
        assert_eq!(out.handler, DocResponder::NAME);
        assert!(out.builtin);

        let mut resp = BufferedResponse::new();
        let err = d.dispatch(&SimpleRequest::get("/nope"), &mut resp).unwrap_err();
        assert_eq!(err.status(), 404);
        err.write_to(&mut resp);
        assert_eq!(resp.status, 404);
        assert_eq!(resp.error.as_deref(), Some("no route for GET /nope"));
    }
}
