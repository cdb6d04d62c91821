// src/watch/watcher.rs

use std::path::{Path, PathBuf};

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::WatchSetupError;
use crate::types::ChangeKind;
use crate::watch::event::{normalize_kind, ChangeEvent};

/// Problems reported on a [`ChangeStream`].
#[derive(Error, Debug)]
pub enum WatchError {
    /// The platform reported an event kind with no mapping. Fatal for the
    /// root it came from: that root's task stops after yielding this.
    #[error("unrecognized event kind {kind} under {root:?}")]
    UnrecognizedEventKind { root: PathBuf, kind: String },

    /// A notify error not tied to any path. The stream continues.
    #[error("watch error under {root:?}: {source}")]
    Notify {
        root: PathBuf,
        #[source]
        source: notify::Error,
    },
}

impl WatchError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, WatchError::UnrecognizedEventKind { .. })
    }
}

type StreamItem = Result<ChangeEvent, WatchError>;

/// The receiving side of a watch. Yields `None` once every root's task has
/// ended.
#[derive(Debug)]
pub struct ChangeStream {
    rx: mpsc::UnboundedReceiver<StreamItem>,
}

impl ChangeStream {
    pub async fn next(&mut self) -> Option<StreamItem> {
        self.rx.recv().await
    }
}

/// Keeps the root tasks (and through them the notify watchers) alive.
#[derive(Debug)]
pub struct WatchHandle {
    cancel: CancellationToken,
}

impl WatchHandle {
    /// Stop every root task. Each task drops its notify watcher on exit.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub struct ChangeWatcher;

impl ChangeWatcher {
    /// Start watching `roots`.
    ///
    /// One notify watcher and one tokio task per root. The notify callback
    /// runs on notify's own thread and forwards into an unbounded channel;
    /// the task awaits that channel and translates events onto the shared
    /// output stream.
    ///
    /// Must be called from within a tokio runtime.
    pub fn watch(
        roots: &[PathBuf],
        recursive: bool,
    ) -> Result<(WatchHandle, ChangeStream), WatchSetupError> {
        let cancel = CancellationToken::new();
        let (out_tx, out_rx) = mpsc::unbounded_channel::<StreamItem>();
        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };

        // Register every watch before spawning anything so a failure on a
        // later root leaves no orphaned task behind.
        let mut started = Vec::with_capacity(roots.len());
        for root in roots {
            let (raw_tx, raw_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
            let mut watcher = RecommendedWatcher::new(
                move |res: notify::Result<Event>| {
                    // Receiver gone means the root task ended; nothing to do.
                    let _ = raw_tx.send(res);
                },
                Config::default(),
            )
            .map_err(|source| WatchSetupError {
                path: root.clone(),
                source,
            })?;

            watcher.watch(root, mode).map_err(|source| WatchSetupError {
                path: root.clone(),
                source,
            })?;

            info!(root = ?root, recursive, "file watcher started");
            started.push((root.clone(), watcher, raw_rx));
        }

        for (root, watcher, raw_rx) in started {
            tokio::spawn(root_task(root, watcher, raw_rx, out_tx.clone(), cancel.clone()));
        }

        Ok((WatchHandle { cancel }, ChangeStream { rx: out_rx }))
    }
}

async fn root_task(
    root: PathBuf,
    watcher: RecommendedWatcher,
    mut raw_rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    out_tx: mpsc::UnboundedSender<StreamItem>,
    cancel: CancellationToken,
) {
    // The watcher lives exactly as long as this task.
    let _watcher = watcher;

    loop {
        let res = tokio::select! {
            _ = cancel.cancelled() => break,
            res = raw_rx.recv() => match res {
                Some(res) => res,
                None => break,
            },
        };

        match forward(&root, res, &out_tx) {
            Flow::Continue => {}
            Flow::Stop => break,
        }
    }

    debug!(root = ?root, "watch task finished");
}

enum Flow {
    Continue,
    Stop,
}

fn forward(
    root: &Path,
    res: notify::Result<Event>,
    out_tx: &mpsc::UnboundedSender<StreamItem>,
) -> Flow {
    let event = match res {
        Ok(event) => event,
        Err(err) if !err.paths.is_empty() => {
            warn!(root = ?root, paths = ?err.paths, error = %err, "watch error for path");
            return Flow::Continue;
        }
        Err(err) => {
            let item = Err(WatchError::Notify {
                root: root.to_path_buf(),
                source: err,
            });
            return send(out_tx, item);
        }
    };

    debug!(?event, "received notify event");

    let changes = match normalize_kind(&event.kind, &event.paths) {
        Ok(changes) => changes,
        Err(unrecognized) => {
            warn!(root = ?root, kind = %unrecognized.0, "unrecognized event kind; stopping watch");
            let _ = out_tx.send(Err(WatchError::UnrecognizedEventKind {
                root: root.to_path_buf(),
                kind: unrecognized.0,
            }));
            return Flow::Stop;
        }
    };

    let mut root_gone = false;
    for (kind, path) in changes {
        if kind == ChangeKind::Deleted && !root.exists() {
            root_gone = true;
        }
        if let Flow::Stop = send(out_tx, Ok(ChangeEvent::new(kind, path))) {
            return Flow::Stop;
        }
    }

    if root_gone {
        info!(root = ?root, "watched root removed; stopping watch");
        return Flow::Stop;
    }
    Flow::Continue
}

fn send(out_tx: &mpsc::UnboundedSender<StreamItem>, item: StreamItem) -> Flow {
    match out_tx.send(item) {
        Ok(()) => Flow::Continue,
        // Stream dropped; nobody is listening any more.
        Err(_) => Flow::Stop,
    }
}
