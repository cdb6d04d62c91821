// src/project/supervisor.rs

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::archive::{is_archive, remove_staging};
use super::discovery::{describe, discover, entry_key, Candidate};
use super::{Project, ProjectContext};
use crate::dispatch::{DispatchError, Dispatched};
use crate::errors::{HotrouteError, Result};
use crate::fs::{is_hidden, FileSystem};
use crate::http::{Headers, QueryParams, Request, Response};
use crate::metrics::Metrics;
use crate::reload::ProjectSignal;
use crate::types::{ChangeKind, ProjectFlags, ProjectOrigin};
use crate::watch::{content_hash, ChangeEvent, ChangeStream, ChangeWatcher, WatchHandle};

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Directory whose immediate children are projects.
    pub root: PathBuf,
    /// Host defaults; `hot_reload` also controls the root watch.
    pub defaults: ProjectFlags,
}

struct Inner {
    config: SupervisorConfig,
    ctx: ProjectContext,
    /// Active projects keyed by their entry name under the root.
    projects: RwLock<BTreeMap<String, Arc<Project>>>,
}

/// Owns every project under one root.
pub struct Supervisor {
    inner: Arc<Inner>,
    cancel: CancellationToken,
    root_watch: Mutex<Option<WatchHandle>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("root", &self.inner.config.root)
            .field("projects", &self.active_projects())
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    /// Open every project under the root, then (with hot reload) watch the
    /// root for projects appearing, changing and disappearing.
    ///
    /// A project that fails to open is logged and left out; it does not stop
    /// the others.
    pub async fn start(
        config: SupervisorConfig,
        fs: Arc<dyn FileSystem>,
        metrics: Arc<Metrics>,
    ) -> Result<Self> {
        if !fs.is_dir(&config.root) {
            return Err(HotrouteError::ConfigError(format!(
                "projects root {:?} is not a directory",
                config.root
            )));
        }

        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            ctx: ProjectContext {
                fs,
                metrics,
                signals: signals_tx,
            },
            config,
            projects: RwLock::new(BTreeMap::new()),
        });

        for candidate in discover(inner.ctx.fs.as_ref(), &inner.config.root)? {
            inner.open_candidate(&candidate);
        }

        let cancel = CancellationToken::new();
        let (root_watch, task) = if inner.config.defaults.hot_reload {
            let (handle, stream) = ChangeWatcher::watch(&[inner.config.root.clone()], false)?;
            let task = tokio::spawn(supervise(Arc::clone(&inner), stream, signals_rx, cancel.clone()));
            (Some(handle), Some(task))
        } else {
            (None, None)
        };

        info!(
            root = ?inner.config.root,
            projects = inner.projects.read().len(),
            hot_reload = inner.config.defaults.hot_reload,
            "supervisor started"
        );

        Ok(Self {
            inner,
            cancel,
            root_watch: Mutex::new(root_watch),
            task: Mutex::new(task),
        })
    }

    /// Names of the active projects, in entry-name order.
    pub fn active_projects(&self) -> Vec<String> {
        self.inner
            .projects
            .read()
            .values()
            .map(|p| p.name().to_string())
            .collect()
    }

    /// The first active project declaring `name`, in entry-name order.
    /// Names come from `project.properties` and may repeat; use
    /// [`Supervisor::entry`] to address one entry exactly.
    pub fn project(&self, name: &str) -> Option<Arc<Project>> {
        self.inner
            .projects
            .read()
            .values()
            .find(|p| p.name() == name)
            .cloned()
    }

    /// The project opened from the root entry `key` (`shop`, `shop.zip`).
    pub fn entry(&self, key: &str) -> Option<Arc<Project>> {
        self.inner.projects.read().get(key).cloned()
    }

    /// Route a request to the project whose context path is the longest
    /// prefix of the request path, with that prefix stripped.
    pub fn route(
        &self,
        req: &dyn Request,
        resp: &mut dyn Response,
    ) -> std::result::Result<Dispatched, DispatchError> {
        let project = {
            let projects = self.inner.projects.read();
            projects
                .values()
                .filter_map(|p| strip_context(p.context_path(), req.path()).map(|rest| (p, rest)))
                .max_by_key(|(p, _)| p.context_path().len())
                .map(|(p, rest)| (Arc::clone(p), rest.into_owned()))
        };

        let Some((project, rest)) = project else {
            debug!(path = %req.path(), "no project for path");
            self.inner.ctx.metrics.record_not_found();
            return Err(DispatchError::missing(req));
        };

        let scoped = ScopedRequest { inner: req, path: rest };
        project.dispatch(&scoped, resp)
    }

    /// Close every project and stop the root watch.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.root_watch.lock().take() {
            handle.close();
        }
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                warn!(error = %err, "supervisor task ended abnormally");
            }
        }

        let projects = std::mem::take(&mut *self.inner.projects.write());
        for project in projects.values() {
            project.close();
        }
        info!(projects = projects.len(), "supervisor shut down");
    }
}

/// `Some(rest)` when `context` is a segment-aligned prefix of `path`.
fn strip_context<'p>(context: &str, path: &'p str) -> Option<Cow<'p, str>> {
    if context == "/" {
        return Some(Cow::Borrowed(path));
    }
    let rest = path.strip_prefix(context)?;
    if rest.is_empty() {
        Some(Cow::Borrowed("/"))
    } else if rest.starts_with('/') {
        Some(Cow::Borrowed(rest))
    } else {
        None
    }
}

impl Inner {
    fn open_candidate(&self, candidate: &Candidate) {
        let key = candidate.key();
        let descriptor = match describe(
            self.ctx.fs.as_ref(),
            &self.config.root,
            candidate,
            self.config.defaults,
        ) {
            Ok(d) => d,
            Err(err) => {
                error!(entry = %key, error = %err, "cannot describe project");
                return;
            }
        };

        {
            let projects = self.projects.read();
            if let Some(clash) = projects
                .values()
                .find(|p| p.context_path() == descriptor.context_path)
            {
                warn!(
                    project = %descriptor.name,
                    other = %clash.name(),
                    context_path = %descriptor.context_path,
                    "context path already in use"
                );
            }
        }

        match Project::open(descriptor, &self.ctx) {
            Ok(project) => {
                if let Some(old) = self.projects.write().insert(key, Arc::new(project)) {
                    old.close();
                }
            }
            Err(err) => error!(entry = %key, error = %err, "project failed to open"),
        }
    }

    /// Close the project under `key`, then drop it from the active set.
    fn close_key(&self, key: &str) -> Option<Arc<Project>> {
        let project = self.projects.read().get(key).cloned()?;
        project.close();
        {
            let mut projects = self.projects.write();
            if projects.get(key).is_some_and(|p| Arc::ptr_eq(p, &project)) {
                projects.remove(key);
            }
        }
        if project.descriptor().origin == ProjectOrigin::Archive {
            if let Err(err) = remove_staging(&project.descriptor().root) {
                warn!(entry = %key, error = %err, "failed to remove staging directory");
            }
        }
        Some(project)
    }

    fn is_active(&self, key: &str) -> bool {
        self.projects.read().contains_key(key)
    }

    fn on_root_event(&self, event: ChangeEvent) {
        let path = &event.path;
        if path == &self.config.root || is_hidden(path) {
            return;
        }
        // Non-recursive watch: only direct children are interesting.
        if path.parent() != Some(self.config.root.as_path()) {
            return;
        }
        let key = entry_key(path);

        match event.kind {
            ChangeKind::Created => {
                if self.is_active(&key) {
                    // An archive renamed over an active one.
                    if is_archive(path) {
                        self.reopen_archive(&key, path);
                    }
                    return;
                }
                if let Some(candidate) = Candidate::from_path(self.ctx.fs.as_ref(), path) {
                    info!(entry = %key, "project appeared");
                    self.open_candidate(&candidate);
                }
            }
            ChangeKind::Deleted => {
                if self.close_key(&key).is_some() {
                    info!(entry = %key, "project removed");
                }
            }
            ChangeKind::Modified => {
                if is_archive(path) {
                    self.reopen_archive(&key, path);
                }
            }
        }
    }

    fn reopen_archive(&self, key: &str, path: &Path) {
        let Some(candidate) = Candidate::from_path(self.ctx.fs.as_ref(), path) else {
            return;
        };
        let current = self.projects.read().get(key).cloned();
        if let Some(current) = current {
            let unchanged = match self.ctx.fs.read(path) {
                Ok(bytes) => current.descriptor().archive_hash.as_deref() == Some(&content_hash(&bytes)),
                // Probably mid-write; the next event will retry.
                Err(_) => true,
            };
            if unchanged {
                return;
            }
            info!(entry = %key, "archive changed; reopening project");
            self.close_key(key);
        }
        self.open_candidate(&candidate);
    }

    fn on_signal(&self, signal: ProjectSignal) {
        match signal {
            ProjectSignal::ConfigChanged { key } => {
                let source = match self.projects.read().get(&key) {
                    Some(p) if !p.is_closed() => p.descriptor().source.clone(),
                    _ => return,
                };
                info!(entry = %key, "recreating project after properties change");
                self.close_key(&key);
                if let Some(candidate) = Candidate::from_path(self.ctx.fs.as_ref(), &source) {
                    self.open_candidate(&candidate);
                }
            }
        }
    }
}

async fn supervise(
    inner: Arc<Inner>,
    mut stream: ChangeStream,
    mut signals: mpsc::UnboundedReceiver<ProjectSignal>,
    cancel: CancellationToken,
) {
    let mut watching = true;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            item = stream.next(), if watching => match item {
                Some(Ok(event)) => inner.on_root_event(event),
                Some(Err(err)) if err.is_fatal() => {
                    error!(error = %err, "root watch failed; new projects will not be picked up");
                    watching = false;
                }
                Some(Err(err)) => warn!(error = %err, "root watch error"),
                None => {
                    warn!(root = ?inner.config.root, "root watch ended");
                    watching = false;
                }
            },
            signal = signals.recv() => match signal {
                Some(signal) => inner.on_signal(signal),
                // Inner holds a sender, so this only happens on teardown.
                None => break,
            },
        }
    }
    debug!("supervisor loop finished");
}

/// A request seen through a project's context path.
struct ScopedRequest<'a> {
    inner: &'a dyn Request,
    path: String,
}

impl Request for ScopedRequest<'_> {
    fn method(&self) -> &str {
        self.inner.method()
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn headers(&self) -> &Headers {
        self.inner.headers()
    }

    fn query(&self) -> &QueryParams {
        self.inner.query()
    }

    fn body(&self) -> &[u8] {
        self.inner.body()
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.inner.remote_addr()
    }

    fn charset(&self) -> Option<&str> {
        self.inner.charset()
    }

    fn content_type(&self) -> Option<&str> {
        self.inner.content_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn greet(name: &str) -> String {
        format!("handler {name}\non GET /{name}\n  write \"{name}\"\n  done\n")
    }

    async fn start_on(fs: &MockFileSystem) -> Supervisor {
        Supervisor::start(
            SupervisorConfig {
                root: PathBuf::from("/projects"),
                defaults: ProjectFlags {
                    hot_reload: false,
                    ..ProjectFlags::default()
                },
            },
            Arc::new(fs.clone()),
            Arc::new(Metrics::new()),
        )
        .await
        .unwrap()
    }

    fn context_paths(sup: &Supervisor) -> Vec<String> {
        sup.inner
            .projects
            .read()
            .values()
            .map(|p| p.context_path().to_string())
            .collect()
    }

    #[tokio::test]
    async fn properties_change_recreates_the_entry_that_sent_it() {
        let fs = MockFileSystem::new();
        fs.add_file("/projects/a/project.properties", "name = demo\ncontext-path = /a\n");
        fs.add_file("/projects/a/scripts/greet.route", greet("greet"));
        fs.add_file("/projects/b/project.properties", "name = demo\ncontext-path = /b\n");
        fs.add_file("/projects/b/scripts/greet.route", greet("greet"));
        let sup = start_on(&fs).await;
        assert_eq!(context_paths(&sup), vec!["/a", "/b"]);
        let a = sup.entry("a").unwrap();

        fs.add_file("/projects/b/project.properties", "name = demo\ncontext-path = /b2\n");
        sup.inner.on_signal(ProjectSignal::ConfigChanged { key: "b".into() });

        assert_eq!(context_paths(&sup), vec!["/a", "/b2"]);
        let same_a = sup.entry("a").unwrap();
        assert!(Arc::ptr_eq(&a, &same_a));
        assert!(!a.is_closed());
        sup.shutdown().await;
    }

    #[tokio::test]
    async fn closing_an_entry_closes_before_removing() {
        let fs = MockFileSystem::new();
        fs.add_file("/projects/shop/scripts/greet.route", greet("greet"));
        let sup = start_on(&fs).await;
        let shop = sup.entry("shop").unwrap();

        let closed = sup.inner.close_key("shop").unwrap();
        assert!(Arc::ptr_eq(&shop, &closed));
        assert!(shop.is_closed());
        assert!(shop.registry().is_empty());
        assert!(sup.entry("shop").is_none());
        assert!(sup.inner.close_key("shop").is_none());
        sup.shutdown().await;
    }

    #[test]
    fn context_prefix_must_end_at_a_segment() {
        assert_eq!(strip_context("/shop", "/shop/greet").as_deref(), Some("/greet"));
        assert_eq!(strip_context("/shop", "/shop").as_deref(), Some("/"));
        assert_eq!(strip_context("/shop", "/shopping"), None);
        assert_eq!(strip_context("/", "/x").as_deref(), Some("/x"));
    }
}
