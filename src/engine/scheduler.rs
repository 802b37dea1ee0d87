// src/engine/scheduler.rs

//! Debounced runner: turns bursts of change signals into spaced-out
//! Start/Restart directives for one chain.
//!
//! The cool-down window opens whenever a run is armed. Signals inside the
//! window are dropped; the first signal after it arms exactly one delayed
//! run, `quiet_period` later. Arming replaces any timer still pending.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

use crate::exec::ChainControl;
use crate::types::{ChainStatus, Directive};

#[derive(Debug)]
pub struct Scheduler {
    unit: String,
    quiet_period: Duration,
    chain: ChainControl,
    /// When the current cool-down window opened.
    last_armed: Option<Instant>,
    timer: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Create a scheduler and arm an immediate first run.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(unit: impl Into<String>, quiet_period: Duration, chain: ChainControl) -> Self {
        let mut scheduler = Self {
            unit: unit.into(),
            quiet_period,
            chain,
            last_armed: None,
            timer: None,
        };
        scheduler.arm(Duration::ZERO);
        scheduler
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Register one change signal.
    ///
    /// Returns `true` if a run was armed, `false` if the signal fell inside
    /// the cool-down window or a run is still pending, and was dropped.
    pub fn schedule(&mut self) -> bool {
        if self.timer.as_ref().is_some_and(|timer| !timer.is_finished()) {
            debug!(unit = %self.unit, "run already pending; change dropped");
            return false;
        }
        if let Some(last) = self.last_armed {
            let elapsed = last.elapsed();
            if elapsed <= self.quiet_period {
                debug!(
                    unit = %self.unit,
                    ?elapsed,
                    quiet_period = ?self.quiet_period,
                    "change inside cool-down window; dropped"
                );
                return false;
            }
        }
        self.arm(self.quiet_period);
        true
    }

    /// Cancel any pending run and tell the chain to exit.
    pub fn exit(&mut self) {
        self.cancel_timer();
        info!(unit = %self.unit, "scheduler exiting");
        self.chain.send(Directive::Exit);
    }

    fn arm(&mut self, delay: Duration) {
        self.cancel_timer();
        self.last_armed = Some(Instant::now());

        debug!(unit = %self.unit, ?delay, "run armed");

        let chain = self.chain.clone();
        let unit = self.unit.clone();
        self.timer = Some(tokio::spawn(async move {
            sleep(delay).await;
            let directive = match chain.status() {
                ChainStatus::Running => Directive::Restart,
                _ => Directive::Start,
            };
            info!(unit = %unit, %directive, "debounce timer fired");
            chain.send(directive);
        }));
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}
