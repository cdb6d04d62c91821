#![allow(dead_code)]

pub use hotroute_test_utils::builders;
pub use hotroute_test_utils::{init_tracing, wait_until, with_timeout, SETTLE};

use std::path::Path;
use std::sync::Arc;

use hotroute::dispatch::{DispatchError, Dispatched};
use hotroute::fs::RealFileSystem;
use hotroute::http::{BufferedResponse, SimpleRequest};
use hotroute::metrics::Metrics;
use hotroute::project::{Supervisor, SupervisorConfig};
use hotroute::types::ProjectFlags;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub fn flags(hot_reload: bool, expose_load_errors: bool, unload_on_delete: bool) -> ProjectFlags {
    ProjectFlags {
        hot_reload,
        expose_load_errors,
        unload_on_delete,
    }
}

pub async fn start(root: &Path, defaults: ProjectFlags) -> (Supervisor, Arc<Metrics>) {
    let metrics = Arc::new(Metrics::new());
    let supervisor = Supervisor::start(
        SupervisorConfig {
            root: root.to_path_buf(),
            defaults,
        },
        Arc::new(RealFileSystem),
        Arc::clone(&metrics),
    )
    .await
    .expect("supervisor starts");
    (supervisor, metrics)
}

/// Route `GET <target>` and return the outcome with the response.
pub fn get(
    supervisor: &Supervisor,
    target: &str,
) -> (Result<Dispatched, DispatchError>, BufferedResponse) {
    let mut resp = BufferedResponse::new();
    let result = supervisor.route(&SimpleRequest::get(target), &mut resp);
    (result, resp)
}

/// Body of a handled `GET <target>`, `None` when nothing handled it.
pub fn body_of(supervisor: &Supervisor, target: &str) -> Option<String> {
    match get(supervisor, target) {
        (Ok(_), resp) => Some(resp.body_text()),
        (Err(_), _) => None,
    }
}
