// src/reload/coordinator.rs

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::core::{classify, plan_delete, plan_load, ProjectLayout, ReloadAction};
use crate::fs::{collect_files, FileSystem};
use crate::loader::{HandlerLoader, SourceUnitId, LIB_DIR};
use crate::metrics::Metrics;
use crate::registry::FunctionRegistry;
use crate::script::SOURCE_EXTENSION;
use crate::types::ProjectFlags;
use crate::watch::{content_hash, ChangeStream, UnitHashes};

/// Messages a project's coordinator sends up to the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectSignal {
    /// `project.properties` changed; the project should be recreated.
    /// `key` is the project's entry name under the projects root.
    ConfigChanged { key: String },
}

/// Everything a coordinator needs from its project.
pub struct ReloadContext {
    pub project: String,
    /// Entry name under the projects root. Unlike `project` it is unique.
    pub key: String,
    pub layout: ProjectLayout,
    pub flags: ProjectFlags,
    pub registry: Arc<FunctionRegistry>,
    pub loader: Arc<dyn HandlerLoader>,
    pub fs: Arc<dyn FileSystem>,
    pub metrics: Arc<Metrics>,
    /// Cancelled when the project closes. Results that finish afterwards are
    /// discarded.
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone, Copy)]
enum LaneJob {
    Load { force: bool },
    Delete,
}

struct Inner {
    ctx: ReloadContext,
    hashes: UnitHashes,
    known: Mutex<BTreeSet<SourceUnitId>>,
    lanes: Mutex<HashMap<SourceUnitId, mpsc::UnboundedSender<LaneJob>>>,
}

/// Keeps one project's registry in step with its source tree.
///
/// Reloads of one unit are serialized through that unit's lane (an mpsc
/// channel drained by a dedicated task); different units reload
/// concurrently. Loader calls run on the blocking pool.
#[derive(Clone)]
pub struct ReloadCoordinator {
    inner: Arc<Inner>,
}

impl fmt::Debug for ReloadCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReloadCoordinator")
            .field("project", &self.inner.ctx.project)
            .field("known_units", &self.inner.known.lock().len())
            .finish_non_exhaustive()
    }
}

impl ReloadCoordinator {
    pub fn new(ctx: ReloadContext) -> Self {
        Self {
            inner: Arc::new(Inner {
                ctx,
                hashes: UnitHashes::new(),
                known: Mutex::new(BTreeSet::new()),
                lanes: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn project(&self) -> &str {
        &self.inner.ctx.project
    }

    /// Units seen so far, in path order.
    pub fn known_units(&self) -> Vec<SourceUnitId> {
        self.inner.known.lock().iter().cloned().collect()
    }

    /// Load every unit under `scripts/` in sorted path order and apply the
    /// results in that order. Registration order of a fresh project is
    /// therefore the scan order.
    pub fn initial_scan(&self) -> crate::errors::Result<usize> {
        let units = self.inner.scan_units()?;
        if units.is_empty() {
            warn!(project = %self.inner.ctx.project, "no source units found");
        }
        for unit in &units {
            self.inner.load_unit(unit, false);
        }
        info!(
            project = %self.inner.ctx.project,
            units = units.len(),
            registered = self.inner.ctx.registry.len(),
            "initial scan complete"
        );
        Ok(units.len())
    }

    /// Consume `stream` until it ends or the project is cancelled.
    pub fn spawn(
        &self,
        mut stream: ChangeStream,
        signals: mpsc::UnboundedSender<ProjectSignal>,
    ) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let cancel = this.inner.ctx.cancel.clone();
            loop {
                let item = tokio::select! {
                    _ = cancel.cancelled() => break,
                    item = stream.next() => match item {
                        Some(item) => item,
                        None => break,
                    },
                };

                match item {
                    Ok(event) => {
                        debug!(project = %this.project(), kind = %event.kind, path = ?event.path, "change event");
                        let known = this.known_units();
                        for action in classify(&this.inner.ctx.layout, event.kind, &event.path, &known) {
                            this.act(action, &signals);
                        }
                    }
                    Err(err) if err.is_fatal() => {
                        error!(project = %this.project(), error = %err, "watch failed; hot reload stopped");
                        break;
                    }
                    Err(err) => warn!(project = %this.project(), error = %err, "watch error"),
                }
            }
            // Dropping the lane senders ends the lane tasks.
            this.inner.lanes.lock().clear();
            debug!(project = %this.project(), "reload coordinator finished");
        })
    }

    fn act(&self, action: ReloadAction, signals: &mpsc::UnboundedSender<ProjectSignal>) {
        match action {
            ReloadAction::Load(unit) => self.enqueue(unit, LaneJob::Load { force: false }),
            ReloadAction::Delete(unit) => self.enqueue(unit, LaneJob::Delete),
            ReloadAction::ReloadAll => {
                info!(project = %self.project(), "support unit changed; reloading all units");
                for unit in self.known_units() {
                    self.enqueue(unit, LaneJob::Load { force: true });
                }
            }
            ReloadAction::Rescan => match self.inner.scan_units() {
                Ok(units) => {
                    for unit in units {
                        self.enqueue(unit, LaneJob::Load { force: false });
                    }
                }
                Err(err) => warn!(project = %self.project(), error = %err, "rescan failed"),
            },
            ReloadAction::ConfigChanged => {
                info!(project = %self.project(), "project properties changed");
                let _ = signals.send(ProjectSignal::ConfigChanged {
                    key: self.inner.ctx.key.clone(),
                });
            }
        }
    }

    fn enqueue(&self, unit: SourceUnitId, job: LaneJob) {
        let mut lanes = self.inner.lanes.lock();
        if let Some(tx) = lanes.get(&unit) {
            if tx.send(job).is_ok() {
                return;
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        // Fresh channel, receiver alive: cannot fail.
        let _ = tx.send(job);
        lanes.insert(unit.clone(), tx);
        tokio::spawn(run_lane(Arc::clone(&self.inner), unit, rx));
    }
}

async fn run_lane(inner: Arc<Inner>, unit: SourceUnitId, mut rx: mpsc::UnboundedReceiver<LaneJob>) {
    let cancel = inner.ctx.cancel.clone();
    loop {
        let job = tokio::select! {
            _ = cancel.cancelled() => break,
            job = rx.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        let worker = Arc::clone(&inner);
        let lane_unit = unit.clone();
        let res = tokio::task::spawn_blocking(move || match job {
            LaneJob::Load { force } => worker.load_unit(&lane_unit, force),
            LaneJob::Delete => worker.delete_unit(&lane_unit),
        })
        .await;

        if let Err(err) = res {
            error!(unit = %unit, error = %err, "reload job panicked");
        }

        // Retire the lane of a deleted unit once its queue is drained. The
        // lanes lock keeps `enqueue` from sending in between.
        if matches!(job, LaneJob::Delete) {
            let mut lanes = inner.lanes.lock();
            if rx.is_empty() {
                lanes.remove(&unit);
                break;
            }
        }
    }
    debug!(unit = %unit, "lane closed");
}

impl Inner {
    fn scan_units(&self) -> crate::errors::Result<Vec<SourceUnitId>> {
        let scripts = &self.ctx.layout.scripts_dir;
        let lib = scripts.join(LIB_DIR);
        let files = collect_files(self.ctx.fs.as_ref(), scripts, SOURCE_EXTENSION, &|d: &Path| d == lib)?;
        Ok(files
            .iter()
            .filter_map(|p| {
                let unit = SourceUnitId::from_path(scripts, p);
                if unit.is_none() {
                    warn!(project = %self.ctx.project, path = ?p, "dotted unit path ignored");
                }
                unit
            })
            .collect())
    }

    /// Read, hash, load and apply one unit. Runs on a blocking thread.
    fn load_unit(&self, unit: &SourceUnitId, force: bool) {
        let project = &self.ctx.project;
        let path = unit.path_under(&self.ctx.layout.scripts_dir);
        let source = match self.ctx.fs.read_to_string(&path) {
            Ok(source) => source,
            Err(err) => {
                // Usually a delete racing the event; its own event follows.
                debug!(project = %project, unit = %unit, error = %err, "unit unreadable; skipping");
                return;
            }
        };

        let hash = content_hash(source.as_bytes());
        if !force && self.hashes.is_unchanged(unit.as_str(), &hash) {
            self.ctx.metrics.record_skip();
            return;
        }

        let name = unit.handler_name();
        let result = self.ctx.loader.load(unit, &source);
        let ok = result.is_ok();
        if let Err(err) = &result {
            warn!(project = %project, unit = %unit, kind = err.kind(), error = %err, "unit failed to load");
        }
        let ops = plan_load(&name, result, &self.ctx.flags);

        if self.ctx.cancel.is_cancelled() {
            debug!(project = %project, unit = %unit, "project closed; discarding load result");
            return;
        }
        self.ctx.registry.apply(ops);
        self.hashes.record(unit.as_str(), hash);
        self.known.lock().insert(unit.clone());
        self.ctx.metrics.record_load(ok);
        if ok {
            info!(project = %project, handler = %name, "handler loaded");
        }
    }

    fn delete_unit(&self, unit: &SourceUnitId) {
        let project = &self.ctx.project;
        let path = unit.path_under(&self.ctx.layout.scripts_dir);
        if self.ctx.fs.is_file(&path) {
            // Deleted and recreated before this job ran.
            debug!(project = %project, unit = %unit, "unit exists again; ignoring delete");
            return;
        }

        let name = unit.handler_name();
        let ops = plan_delete(&name, &self.ctx.flags);
        if ops.is_empty() {
            info!(project = %project, handler = %name, "unit deleted; keeping last registration");
            return;
        }
        if self.ctx.cancel.is_cancelled() {
            return;
        }
        self.ctx.registry.apply(ops);
        self.hashes.forget(unit.as_str());
        self.known.lock().remove(unit);
        self.ctx.metrics.record_unload();
        info!(project = %project, handler = %name, "handler unloaded");
    }
}
