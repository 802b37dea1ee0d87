// src/watch/mod.rs

//! File watching.
//!
//! - [`patterns`] turns a unit's directory entries into its fixed file set.
//! - [`source`] subscribes to individual paths and streams their changes.
//!
//! Neither knows about chains or scheduling; the engine's watch unit ties
//! them together.

pub mod path_utils;
pub mod patterns;
pub mod source;

pub use patterns::{resolve_file_set, resolve_watch_specs};
pub use source::{ChangeEvent, ChangeOp, ChangeSource, ChangeStreams, NotifySource};
