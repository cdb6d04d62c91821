// src/metrics.rs

//! Process-wide counters for loads and dispatches.
//!
//! A single [`Metrics`] is created by the host and handed to every project,
//! coordinator and dispatcher that needs to record something.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct Metrics {
    loads_ok: AtomicU64,
    loads_failed: AtomicU64,
    loads_skipped: AtomicU64,
    unloads: AtomicU64,
    handled: AtomicU64,
    not_found: AtomicU64,
    faults: AtomicU64,
    defects: AtomicU64,
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub loads_ok: u64,
    pub loads_failed: u64,
    /// Events dropped because the unit's content hash was unchanged.
    pub loads_skipped: u64,
    pub unloads: u64,
    pub handled: u64,
    pub not_found: u64,
    pub faults: u64,
    pub defects: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_load(&self, ok: bool) {
        if ok {
            self.loads_ok.fetch_add(1, Ordering::Relaxed);
        } else {
            self.loads_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_skip(&self) {
        self.loads_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unload(&self) {
        self.unloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_handled(&self) {
        self.handled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_not_found(&self) {
        self.not_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fault(&self) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_defect(&self) {
        self.defects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            loads_ok: self.loads_ok.load(Ordering::Relaxed),
            loads_failed: self.loads_failed.load(Ordering::Relaxed),
            loads_skipped: self.loads_skipped.load(Ordering::Relaxed),
            unloads: self.unloads.load(Ordering::Relaxed),
            handled: self.handled.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
            defects: self.defects.load(Ordering::Relaxed),
        }
    }
}
