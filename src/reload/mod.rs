// src/reload/mod.rs

//! Keeping a project's registry in step with its source tree.
//!
//! Split the same way as a state machine and its driver:
//! - [`core`] decides (pure functions over load results and events),
//! - [`coordinator`] performs the IO and applies the decisions.

pub mod coordinator;
pub mod core;

pub use self::core::{plan_delete, plan_load, ProjectLayout, ReloadAction, PROPERTIES_FILE};
pub use coordinator::{ProjectSignal, ReloadContext, ReloadCoordinator};
