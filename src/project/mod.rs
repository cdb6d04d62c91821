// src/project/mod.rs

//! Logical projects and their lifecycle.
//!
//! A [`Project`] owns everything scoped to one project directory: its
//! registry, loader, reload coordinator, dispatcher and (with hot reload) its
//! watch. Nothing is shared between projects, so a broken unit or a failed
//! watch in one project never affects another.

pub mod archive;
pub mod discovery;
pub mod supervisor;

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::dispatch::{Dispatched, DispatchError, Dispatcher};
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::http::{Request, Response};
use crate::loader::ScriptLoader;
use crate::metrics::Metrics;
use crate::registry::FunctionRegistry;
use crate::reload::{ProjectLayout, ProjectSignal, ReloadContext, ReloadCoordinator};
use crate::types::{ProjectFlags, ProjectOrigin};
use crate::watch::{ChangeWatcher, WatchHandle};

pub use discovery::{discover, Candidate};
pub use supervisor::{Supervisor, SupervisorConfig};

/// Directory under a project root holding `<name>.json` documents.
pub const SPECIFICATION_DIR: &str = "specification";

/// Everything known about a project before it is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDescriptor {
    /// File name of the entry under the projects root (`shop`, `shop.zip`).
    pub key: String,
    pub name: String,
    pub version: Option<String>,
    pub context_path: String,
    /// Directory the project is loaded from; the staging directory for
    /// archives.
    pub root: PathBuf,
    /// The entry under the projects root.
    pub source: PathBuf,
    pub origin: ProjectOrigin,
    pub flags: ProjectFlags,
    /// blake3 of the archive bytes, for archive projects.
    pub archive_hash: Option<String>,
}

/// Shared services handed to every project.
#[derive(Debug, Clone)]
pub struct ProjectContext {
    pub fs: Arc<dyn FileSystem>,
    pub metrics: Arc<Metrics>,
    pub signals: mpsc::UnboundedSender<ProjectSignal>,
}

#[derive(Debug)]
pub struct Project {
    descriptor: ProjectDescriptor,
    registry: Arc<FunctionRegistry>,
    dispatcher: Dispatcher,
    coordinator: ReloadCoordinator,
    cancel: CancellationToken,
    watch: Mutex<Option<(WatchHandle, JoinHandle<()>)>>,
}

impl Project {
    /// Build the project's components, run the initial scan and, when hot
    /// reload is on, start watching the project root.
    ///
    /// The project is ready (fully scanned) when this returns. Hot reload
    /// requires a tokio runtime.
    pub fn open(descriptor: ProjectDescriptor, ctx: &ProjectContext) -> Result<Self> {
        let registry = Arc::new(FunctionRegistry::new());
        let layout = ProjectLayout::new(&descriptor.root);
        let cancel = CancellationToken::new();

        let coordinator = ReloadCoordinator::new(ReloadContext {
            project: descriptor.name.clone(),
            key: descriptor.key.clone(),
            layout: layout.clone(),
            flags: descriptor.flags,
            registry: Arc::clone(&registry),
            loader: Arc::new(ScriptLoader::new(&layout.scripts_dir, Arc::clone(&ctx.fs))),
            fs: Arc::clone(&ctx.fs),
            metrics: Arc::clone(&ctx.metrics),
            cancel: cancel.clone(),
        });

        let dispatcher = Dispatcher::new(
            descriptor.name.clone(),
            Arc::clone(&registry),
            descriptor.root.join(SPECIFICATION_DIR),
            Arc::clone(&ctx.fs),
            Arc::clone(&ctx.metrics),
        );

        // Watch before scanning so nothing written during the scan is lost;
        // events that repeat what the scan saw are dropped by the hash check.
        let pending = if descriptor.flags.hot_reload {
            Some(ChangeWatcher::watch(&[descriptor.root.clone()], true)?)
        } else {
            None
        };

        coordinator.initial_scan()?;

        let watch = pending.map(|(handle, stream)| {
            let task = coordinator.spawn(stream, ctx.signals.clone());
            (handle, task)
        });

        info!(
            project = %descriptor.name,
            context_path = %descriptor.context_path,
            version = descriptor.version.as_deref().unwrap_or("-"),
            handlers = registry.len(),
            hot_reload = descriptor.flags.hot_reload,
            "project ready"
        );

        Ok(Self {
            descriptor,
            registry,
            dispatcher,
            coordinator,
            cancel,
            watch: Mutex::new(watch),
        })
    }

    pub fn descriptor(&self) -> &ProjectDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn context_path(&self) -> &str {
        &self.descriptor.context_path
    }

    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        &self.registry
    }

    pub fn coordinator(&self) -> &ReloadCoordinator {
        &self.coordinator
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn dispatch(
        &self,
        req: &dyn Request,
        resp: &mut dyn Response,
    ) -> std::result::Result<Dispatched, DispatchError> {
        self.dispatcher.dispatch(req, resp)
    }

    /// Stop watching, discard in-flight reload results and drop every
    /// registration. Idempotent.
    pub fn close(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        if let Some((handle, _task)) = self.watch.lock().take() {
            handle.close();
        }
        self.registry.clear();
        info!(project = %self.descriptor.name, "project closed");
    }
}

impl Drop for Project {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
