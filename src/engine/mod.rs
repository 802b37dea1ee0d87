// src/engine/mod.rs

//! Orchestration engine for hotrunner.
//!
//! This module ties together:
//! - the debounced [`Scheduler`] that feeds directives to a chain
//! - the [`WatchUnit`] event loop merging file changes, chain events and a
//!   stop signal
//! - the watcher variants in [`registry`]
//! - the [`Manager`] running every unit and merging their reports

use thiserror::Error;

pub mod manager;
pub mod registry;
pub mod scheduler;
pub mod unit;

pub use manager::Manager;
pub use registry::{CargoRunWatcher, CustomWatcher, GoRunWatcher, Watcher};
pub use scheduler::Scheduler;
pub use unit::WatchUnit;

/// Something a unit could not handle itself and passes upward.
#[derive(Error, Debug)]
pub enum UnitError {
    #[error("file watch error: {0}")]
    Source(#[from] notify::Error),

    #[error("step '{step}' failed to start: {message}")]
    Spawn { step: String, message: String },
}

/// One item of a unit's result stream.
#[derive(Debug)]
pub struct UnitReport {
    pub unit: String,
    pub error: UnitError,
}
