// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`step`] defines the [`Step`] trait a chain sequences.
//! - [`process`] is the real implementation, wrapping one OS process.
//! - [`chain`] runs steps in order under a directive-driven state machine.
//! - [`status`] is the mutex-guarded status cell both of them share with
//!   observers.

pub mod chain;
pub mod process;
pub mod status;
pub mod step;

pub use chain::{ChainControl, ChainEvent, CommandChain, RunningChain, DEFAULT_SETTLE_DELAY};
pub use process::{ProcessHandle, ProcessSpec};
pub use status::SharedStatus;
pub use step::{ProcessError, ProcessExit, Step};
