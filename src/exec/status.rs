// src/exec/status.rs

use std::sync::{Arc, Mutex};

/// Mutex-guarded status shared between the task that drives a state machine
/// and the tasks that observe it.
///
/// Reads copy the value out, so a guard is never held across an `.await`.
#[derive(Debug, Default)]
pub struct SharedStatus<T: Copy> {
    inner: Arc<Mutex<T>>,
}

impl<T: Copy> Clone for SharedStatus<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Copy> SharedStatus<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(value)),
        }
    }

    pub fn get(&self) -> T {
        // The guarded value is plain `Copy` data, so a poisoned lock still
        // holds a usable value.
        *self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set(&self, value: T) {
        *self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = value;
    }

    /// Set `value` unless the current value satisfies `keep`.
    ///
    /// The check and the write happen under one lock.
    pub fn set_unless(&self, value: T, keep: impl FnOnce(T) -> bool) {
        let mut guard = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !keep(*guard) {
            *guard = value;
        }
    }
}
