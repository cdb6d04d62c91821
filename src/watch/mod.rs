// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Wiring up a cross-platform filesystem watcher (`notify`) per root.
//! - Folding platform event kinds into [`ChangeKind`](crate::types::ChangeKind).
//! - Content hashing so unchanged units are not reloaded.
//!
//! It does **not** know about handlers or registries; it only turns
//! filesystem changes into [`ChangeEvent`]s.

pub mod event;
pub mod hash;
pub mod path_utils;
pub mod watcher;

pub use event::{normalize_kind, ChangeEvent, UnrecognizedKind};
pub use hash::{content_hash, UnitHashes};
pub use watcher::{ChangeStream, ChangeWatcher, WatchError, WatchHandle};
