// src/watch/source.rs

//! Per-path change subscriptions.
//!
//! A [`ChangeSource`] is told which paths to watch; what it observes comes
//! out of the two streams in [`ChangeStreams`]. The production source wraps
//! `notify`'s recommended backend and subscribes every path
//! non-recursively, since file sets are resolved up front.

use std::path::{Path, PathBuf};

use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::errors::Result;

/// Kind of change observed on a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeOp {
    Create,
    Write,
    Remove,
    Rename,
    Chmod,
}

impl ChangeOp {
    /// True for operations after which the subscribed path may no longer
    /// refer to the same file.
    pub fn detaches(self) -> bool {
        matches!(self, ChangeOp::Remove | ChangeOp::Rename)
    }

    /// Map a `notify` event kind; access events are not changes.
    pub fn from_event_kind(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(ChangeOp::Create),
            EventKind::Remove(_) => Some(ChangeOp::Remove),
            EventKind::Modify(ModifyKind::Name(_)) => Some(ChangeOp::Rename),
            EventKind::Modify(ModifyKind::Metadata(_)) => Some(ChangeOp::Chmod),
            EventKind::Modify(_) | EventKind::Any => Some(ChangeOp::Write),
            EventKind::Access(_) | EventKind::Other => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub op: ChangeOp,
}

/// Output side of a change source.
#[derive(Debug)]
pub struct ChangeStreams {
    pub changes: mpsc::UnboundedReceiver<ChangeEvent>,
    pub errors: mpsc::UnboundedReceiver<notify::Error>,
}

/// Subscription side of a change source.
pub trait ChangeSource: Send {
    fn add(&mut self, path: &Path) -> Result<()>;
    fn remove(&mut self, path: &Path) -> Result<()>;
}

/// [`ChangeSource`] backed by `notify::RecommendedWatcher`.
pub struct NotifySource {
    inner: RecommendedWatcher,
}

impl std::fmt::Debug for NotifySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifySource").finish_non_exhaustive()
    }
}

impl NotifySource {
    pub fn new() -> Result<(Self, ChangeStreams)> {
        let (change_tx, change_rx) = mpsc::unbounded_channel::<ChangeEvent>();
        let (error_tx, error_rx) = mpsc::unbounded_channel::<notify::Error>();

        // Called synchronously on notify's own thread.
        let inner = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let Some(op) = ChangeOp::from_event_kind(&event.kind) else {
                        trace!(?event, "ignoring non-change event");
                        return;
                    };
                    for path in event.paths {
                        if change_tx.send(ChangeEvent { path, op }).is_err() {
                            debug!("change receiver dropped; event discarded");
                            return;
                        }
                    }
                }
                Err(err) => {
                    if error_tx.send(err).is_err() {
                        debug!("error receiver dropped; watch error discarded");
                    }
                }
            },
            Config::default(),
        )?;

        Ok((
            Self { inner },
            ChangeStreams {
                changes: change_rx,
                errors: error_rx,
            },
        ))
    }
}

impl ChangeSource for NotifySource {
    fn add(&mut self, path: &Path) -> Result<()> {
        self.inner.watch(path, RecursiveMode::NonRecursive)?;
        Ok(())
    }

    fn remove(&mut self, path: &Path) -> Result<()> {
        self.inner.unwatch(path)?;
        Ok(())
    }
}
