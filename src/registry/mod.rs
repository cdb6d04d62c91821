// src/registry/mod.rs

//! Per-project map of handler name → [`Registration`].
//!
//! Reads vastly outnumber writes, so the map is published as an immutable
//! snapshot behind an `Arc`. A reader takes the read lock only long enough to
//! clone the pointer. Writers serialize on a separate mutex, build the next
//! map from the current one and swap it in, so a multi-entry change is seen
//! either entirely or not at all.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::handler::Handler;
use crate::loader::LoadError;

/// Prefix of the diagnostic entry registered for a failed unit.
pub const ERROR_PREFIX: &str = "/error/";

/// Registry key of the diagnostic entry for `name`.
pub fn error_key(name: &str) -> String {
    format!("{ERROR_PREFIX}{name}")
}

/// State of one registry entry.
#[derive(Debug, Clone)]
pub enum Registration {
    Active {
        handler: Arc<dyn Handler>,
        loaded_at: DateTime<Utc>,
    },
    Failed {
        error: LoadError,
        failed_at: DateTime<Utc>,
    },
}

impl Registration {
    pub fn active(handler: Arc<dyn Handler>) -> Self {
        Registration::Active {
            handler,
            loaded_at: Utc::now(),
        }
    }

    pub fn failed(error: LoadError) -> Self {
        Registration::Failed {
            error,
            failed_at: Utc::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Registration::Active { .. })
    }

    pub fn handler(&self) -> Option<&Arc<dyn Handler>> {
        match self {
            Registration::Active { handler, .. } => Some(handler),
            Registration::Failed { .. } => None,
        }
    }

    pub fn load_error(&self) -> Option<&LoadError> {
        match self {
            Registration::Failed { error, .. } => Some(error),
            Registration::Active { .. } => None,
        }
    }

    pub fn state(&self) -> &'static str {
        match self {
            Registration::Active { .. } => "active",
            Registration::Failed { .. } => "failed",
        }
    }

    pub fn changed_at(&self) -> DateTime<Utc> {
        match self {
            Registration::Active { loaded_at, .. } => *loaded_at,
            Registration::Failed { failed_at, .. } => *failed_at,
        }
    }
}

/// One step of a registry change.
#[derive(Debug, Clone)]
pub enum RegistryOp {
    Put(String, Registration),
    Remove(String),
}

impl RegistryOp {
    pub fn key(&self) -> &str {
        match self {
            RegistryOp::Put(k, _) | RegistryOp::Remove(k) => k,
        }
    }
}

pub type Snapshot = Arc<IndexMap<String, Registration>>;

#[derive(Debug, Default)]
pub struct FunctionRegistry {
    current: RwLock<Snapshot>,
    writer: Mutex<()>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current snapshot. Holding it never blocks writers.
    pub fn snapshot(&self) -> Snapshot {
        Arc::clone(&self.current.read())
    }

    pub fn get(&self, name: &str) -> Option<Registration> {
        self.snapshot().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.snapshot().keys().cloned().collect()
    }

    /// Active handlers in registration order.
    pub fn active(&self) -> Vec<(String, Arc<dyn Handler>)> {
        self.snapshot()
            .iter()
            .filter_map(|(k, r)| r.handler().map(|h| (k.clone(), Arc::clone(h))))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Insert `name`, or replace it in place if already present.
    pub fn insert_or_replace(&self, name: impl Into<String>, registration: Registration) {
        self.apply(vec![RegistryOp::Put(name.into(), registration)]);
    }

    /// Remove `name`. Returns whether it was present.
    pub fn remove(&self, name: &str) -> bool {
        let _guard = self.writer.lock();
        let current = self.snapshot();
        if !current.contains_key(name) {
            return false;
        }
        let mut next = (*current).clone();
        next.shift_remove(name);
        *self.current.write() = Arc::new(next);
        debug!(name = %name, "registry entry removed");
        true
    }

    /// Apply every op as one snapshot swap.
    pub fn apply(&self, ops: Vec<RegistryOp>) {
        if ops.is_empty() {
            return;
        }
        let _guard = self.writer.lock();
        let current = self.snapshot();

        // Skip the copy when nothing would change.
        let noop = ops
            .iter()
            .all(|op| matches!(op, RegistryOp::Remove(k) if !current.contains_key(k)));
        if noop {
            return;
        }

        let mut next = (*current).clone();
        for op in ops {
            match op {
                RegistryOp::Put(key, reg) => {
                    debug!(name = %key, state = reg.state(), "registry put");
                    // IndexMap::insert keeps the slot of an existing key.
                    next.insert(key, reg);
                }
                RegistryOp::Remove(key) => {
                    if next.shift_remove(&key).is_some() {
                        debug!(name = %key, "registry remove");
                    }
                }
            }
        }
        *self.current.write() = Arc::new(next);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let _guard = self.writer.lock();
        *self.current.write() = Arc::new(IndexMap::new());
    }
}
