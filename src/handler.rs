// src/handler.rs

//! The handler capability every loaded unit must provide.

use std::fmt;

use crate::http::{Request, Response};

/// Result of one "attempt to handle" call.
#[derive(Debug)]
pub enum Outcome {
    /// The handler claimed the request and wrote the response.
    Handled,
    /// The handler declined; dispatch continues with the next handler.
    NotHandled,
    /// The handler failed while handling. The error may be wrapped in any
    /// number of context layers; the dispatcher reports the innermost cause.
    Raised(anyhow::Error),
    /// The handler produced no result at all. This is a broken handler, never
    /// a decline.
    Undefined,
}

impl Outcome {
    pub fn is_handled(&self) -> bool {
        matches!(self, Outcome::Handled)
    }
}

/// An invocable unit produced by a [`crate::loader::HandlerLoader`].
pub trait Handler: Send + Sync {
    fn name(&self) -> &str;

    fn handle(&self, req: &dyn Request, resp: &mut dyn Response) -> Outcome;
}

impl fmt::Debug for dyn Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").field("name", &self.name()).finish()
    }
}

type HandleFn = dyn Fn(&dyn Request, &mut dyn Response) -> Outcome + Send + Sync;

/// Handler backed by a closure. Used for native handlers embedded by a host
/// and in tests.
pub struct FnHandler {
    name: String,
    f: Box<HandleFn>,
}

impl FnHandler {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&dyn Request, &mut dyn Response) -> Outcome + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            f: Box::new(f),
        }
    }
}

impl Handler for FnHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, req: &dyn Request, resp: &mut dyn Response) -> Outcome {
        (self.f)(req, resp)
    }
}
