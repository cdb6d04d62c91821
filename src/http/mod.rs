// src/http/mod.rs

//! The narrow request/response contract handlers and the dispatcher depend
//! on.
//!
//! Transport adapters implement [`Request`] and [`Response`] over their own
//! types. [`SimpleRequest`] and [`BufferedResponse`] are the in-crate
//! implementations used by the host binary and by tests.

pub mod request;
pub mod response;

pub use request::{Headers, QueryParams, Request, SimpleRequest};
pub use response::{BufferedResponse, Response};
