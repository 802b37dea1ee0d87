// src/config/mod.rs

//! Configuration loading and validation for hotrunner.
//!
//! Responsibilities:
//! - Path-keyed access to the TOML document (`node.rs`).
//! - Typed views used by the engine (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate that the document yields runnable watchers (`validate.rs`).

pub mod duration;
pub mod loader;
pub mod model;
pub mod node;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{config_base_dir, default_config_path, load_and_validate, load_from_path};
pub use model::{CommandSpec, SharedOptions, Timings, UnitMeta, WatchSpec};
pub use node::ConfigNode;
pub use validate::validate_config;
