//! An in-memory [`ChangeSource`] whose events are injected by the test.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use hotrunner::errors::Result;
use hotrunner::watch::{ChangeEvent, ChangeOp, ChangeSource, ChangeStreams};
use tokio::sync::mpsc;

#[derive(Debug, Default)]
struct State {
    subscribed: BTreeSet<PathBuf>,
    adds: usize,
    removes: usize,
}

/// The source half handed to the unit.
#[derive(Debug)]
pub struct FakeChangeSource {
    state: Arc<Mutex<State>>,
}

/// The test's half: inspect subscriptions and inject events.
#[derive(Debug, Clone)]
pub struct FakeSourceHandle {
    state: Arc<Mutex<State>>,
    changes: mpsc::UnboundedSender<ChangeEvent>,
    errors: mpsc::UnboundedSender<notify::Error>,
}

/// Build a fake source, its streams and the controlling handle.
pub fn fake_source() -> (Box<dyn ChangeSource>, ChangeStreams, FakeSourceHandle) {
    let state = Arc::new(Mutex::new(State::default()));
    let (change_tx, change_rx) = mpsc::unbounded_channel();
    let (error_tx, error_rx) = mpsc::unbounded_channel();

    (
        Box::new(FakeChangeSource {
            state: Arc::clone(&state),
        }),
        ChangeStreams {
            changes: change_rx,
            errors: error_rx,
        },
        FakeSourceHandle {
            state,
            changes: change_tx,
            errors: error_tx,
        },
    )
}

impl ChangeSource for FakeChangeSource {
    fn add(&mut self, path: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.adds += 1;
        state.subscribed.insert(path.to_path_buf());
        Ok(())
    }

    fn remove(&mut self, path: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.removes += 1;
        state.subscribed.remove(path);
        Ok(())
    }
}

impl FakeSourceHandle {
    pub fn is_subscribed(&self, path: &Path) -> bool {
        self.state.lock().unwrap().subscribed.contains(path)
    }

    pub fn subscribed(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().subscribed.iter().cloned().collect()
    }

    pub fn add_calls(&self) -> usize {
        self.state.lock().unwrap().adds
    }

    pub fn remove_calls(&self) -> usize {
        self.state.lock().unwrap().removes
    }

    pub fn emit(&self, path: &Path, op: ChangeOp) {
        let _ = self.changes.send(ChangeEvent {
            path: path.to_path_buf(),
            op,
        });
    }

    pub fn emit_error(&self, message: &str) {
        let _ = self.errors.send(notify::Error::generic(message));
    }
}
