// src/config/mod.rs

//! Configuration loading and validation for hotroute.
//!
//! Responsibilities:
//! - Define the TOML-backed host data model (`model.rs`).
//! - Load a host config file from disk (`loader.rs`).
//! - Validate basic invariants (`validate.rs`).
//! - Parse per-project `project.properties` files (`properties.rs`).

pub mod loader;
pub mod model;
pub mod properties;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{ConfigFile, RawConfigFile, ServerSection};
pub use properties::{parse_properties, ProjectProperties};
