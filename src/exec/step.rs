// src/exec/step.rs

//! The unit of work a command chain sequences.
//!
//! Production code uses [`ProcessHandle`](crate::exec::ProcessHandle); tests
//! can provide scripted implementations that never spawn a process.

use thiserror::Error;
use tokio::sync::oneshot;

use crate::types::RunStatus;

/// How a step's process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    pub pid: Option<u32>,
    pub success: bool,
    /// Exit code, `None` when the process was ended by a signal.
    pub code: Option<i32>,
    /// True if the exit followed a `kill()` on the handle.
    pub killed: bool,
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("step '{name}' is already running")]
    AlreadyRunning { name: String },

    #[error("step '{name}' is not running")]
    NotRunning { name: String },

    #[error("failed to spawn step '{name}' ({exec}): {source}")]
    Spawn {
        name: String,
        exec: String,
        #[source]
        source: std::io::Error,
    },
}

/// Trait abstracting one runnable step of a chain.
pub trait Step: Send {
    /// Logical name used in events and logs.
    fn name(&self) -> &str;

    fn status(&self) -> RunStatus;

    /// Start the step.
    ///
    /// Fails with [`ProcessError::AlreadyRunning`] if the step is running.
    /// The returned receiver resolves once the step has ended; by then
    /// `status()` already reports `Idle`.
    fn run(&mut self) -> Result<oneshot::Receiver<ProcessExit>, ProcessError>;

    /// Ask a running step to terminate. Does not wait for the exit.
    ///
    /// Fails with [`ProcessError::NotRunning`] if the step is idle.
    fn kill(&mut self) -> Result<(), ProcessError>;

    /// Kill the step if it is running and forget its previous instance.
    fn reset(&mut self) {
        if self.status() == RunStatus::Running {
            let _ = self.kill();
        }
    }
}
