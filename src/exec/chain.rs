// src/exec/chain.rs

//! Ordered list of steps driven by a directive inbox.
//!
//! A chain is built (steps registered) and then moved into a background
//! executor task by [`CommandChain::spawn`]. From then on it is controlled
//! only through [`ChainControl`], and reports through a stream of
//! [`ChainEvent`]s.
//!
//! Transition table for a directive received in a given state:
//!
//! | state            | Start              | Stop                | Restart              | Exit                 |
//! |------------------|--------------------|---------------------|----------------------|----------------------|
//! | Waiting/Pending  | run from step 1    | no-op               | run from step 1      | -> Stopping          |
//! | Running          | `Busy` event       | kill step, cancel   | kill step, step 1    | -> Stopping, as Stop |
//! | Stopping         | executor has ended                                                              |

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::exec::process::{ProcessHandle, ProcessSpec};
use crate::exec::status::SharedStatus;
use crate::exec::step::{ProcessExit, Step};
use crate::types::{ChainStatus, Directive, RunStatus};

/// Default pause between killing a still-running step and respawning it.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(200);

/// Events emitted by a running chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    /// `Start` arrived while the chain was running; nothing changed.
    Busy { chain: String },
    /// A step's process ended.
    StepCompleted {
        chain: String,
        step: String,
        pid: Option<u32>,
        success: bool,
        canceled: bool,
    },
    /// The whole chain finished, either after its last step succeeded or
    /// because it was canceled. Not emitted when a step fails.
    ChainCompleted {
        chain: String,
        success: bool,
        canceled: bool,
    },
    /// A step could not be started. Followed by a failed `StepCompleted`.
    SpawnFailed {
        chain: String,
        step: String,
        message: String,
    },
}

/// A chain under construction.
pub struct CommandChain {
    name: String,
    steps: Vec<Box<dyn Step>>,
    settle_delay: Duration,
}

impl std::fmt::Debug for CommandChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandChain")
            .field("name", &self.name)
            .field("steps", &self.step_names())
            .field("settle_delay", &self.settle_delay)
            .finish()
    }
}

impl CommandChain {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a step. Steps run in registration order.
    pub fn register(&mut self, step: Box<dyn Step>) {
        self.steps.push(step);
    }

    /// Append a step backed by a real process.
    pub fn register_process(&mut self, spec: ProcessSpec) {
        self.register(Box::new(ProcessHandle::new(spec)));
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name().to_string()).collect()
    }

    /// Move the chain into its executor task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(self) -> RunningChain {
        let (control, inbox, status) = ChainControl::channel(self.name.clone());
        let (event_tx, event_rx) = mpsc::unbounded_channel::<ChainEvent>();

        let executor = ChainExecutor {
            name: self.name,
            steps: self.steps,
            settle_delay: self.settle_delay,
            status,
            inbox,
            inbox_open: true,
            events: event_tx,
        };

        let task = tokio::spawn(executor.run());

        RunningChain {
            control,
            events: event_rx,
            task,
        }
    }
}

/// A spawned chain: its control handle, its event stream and its task.
#[derive(Debug)]
pub struct RunningChain {
    pub control: ChainControl,
    pub events: mpsc::UnboundedReceiver<ChainEvent>,
    pub task: JoinHandle<()>,
}

/// Cloneable handle for sending directives and reading the chain status.
#[derive(Debug, Clone)]
pub struct ChainControl {
    name: String,
    directives: mpsc::UnboundedSender<Directive>,
    status: SharedStatus<ChainStatus>,
}

impl ChainControl {
    /// A control handle together with the inbox it feeds and the status
    /// cell it reads. The status starts as `Waiting`.
    pub fn channel(
        name: impl Into<String>,
    ) -> (
        Self,
        mpsc::UnboundedReceiver<Directive>,
        SharedStatus<ChainStatus>,
    ) {
        let (directives, inbox) = mpsc::unbounded_channel::<Directive>();
        let status = SharedStatus::new(ChainStatus::Waiting);
        let control = Self {
            name: name.into(),
            directives,
            status: status.clone(),
        };
        (control, inbox, status)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> ChainStatus {
        self.status.get()
    }

    /// Queue a directive. Returns `false` once the executor has ended.
    pub fn send(&self, directive: Directive) -> bool {
        match self.directives.send(directive) {
            Ok(()) => true,
            Err(_) => {
                debug!(chain = %self.name, %directive, "chain executor gone; directive dropped");
                false
            }
        }
    }

    pub fn start(&self) -> bool {
        self.send(Directive::Start)
    }

    pub fn stop(&self) -> bool {
        self.send(Directive::Stop)
    }

    pub fn restart(&self) -> bool {
        self.send(Directive::Restart)
    }

    pub fn exit(&self) -> bool {
        self.send(Directive::Exit)
    }
}

/// Result of waiting on one step.
enum StepWait {
    Exited(Option<ProcessExit>),
    Restart,
}

struct ChainExecutor {
    name: String,
    steps: Vec<Box<dyn Step>>,
    settle_delay: Duration,
    status: SharedStatus<ChainStatus>,
    inbox: mpsc::UnboundedReceiver<Directive>,
    /// False once every `ChainControl` has been dropped.
    inbox_open: bool,
    events: mpsc::UnboundedSender<ChainEvent>,
}

impl ChainExecutor {
    async fn run(mut self) {
        info!(chain = %self.name, steps = self.steps.len(), "chain executor started");

        loop {
            match self.status.get() {
                ChainStatus::Stopping => break,
                ChainStatus::Running => {
                    // Only `run_cycle` sets Running, and it always leaves it.
                    error!(chain = %self.name, "chain idle but marked running; resetting to waiting");
                    self.status.set(ChainStatus::Waiting);
                }
                ChainStatus::Waiting | ChainStatus::Pending => {
                    let Some(directive) = self.next_directive().await else {
                        self.status.set(ChainStatus::Stopping);
                        break;
                    };
                    match directive {
                        Directive::Start | Directive::Restart => self.run_cycle().await,
                        Directive::Stop => {
                            debug!(chain = %self.name, "stop while idle; nothing to do");
                        }
                        Directive::Exit => self.status.set(ChainStatus::Stopping),
                    }
                }
            }
        }

        for step in self.steps.iter_mut() {
            step.reset();
        }
        info!(chain = %self.name, "chain executor finished");
    }

    async fn next_directive(&mut self) -> Option<Directive> {
        if !self.inbox_open {
            return None;
        }
        let directive = self.inbox.recv().await;
        match directive {
            Some(d) => debug!(chain = %self.name, directive = %d, status = %self.status.get(), "directive received"),
            None => {
                debug!(chain = %self.name, "directive inbox closed");
                self.inbox_open = false;
            }
        }
        directive
    }

    /// Run every step in order, starting over from the first step whenever a
    /// `Restart` arrives.
    async fn run_cycle(&mut self) {
        self.status.set(ChainStatus::Running);

        'cycle: loop {
            info!(chain = %self.name, "chain run started");
            let mut canceled = false;

            for idx in 0..self.steps.len() {
                if self.steps[idx].status() == RunStatus::Running {
                    debug!(
                        chain = %self.name,
                        step = %self.steps[idx].name(),
                        "step still running from a previous cycle; killing before respawn"
                    );
                    self.kill_step(idx);
                    sleep(self.settle_delay).await;
                }

                let step_name = self.steps[idx].name().to_string();
                let exit_rx = match self.steps[idx].run() {
                    Ok(rx) => rx,
                    Err(err) => {
                        error!(chain = %self.name, step = %step_name, error = %err, "failed to start step");
                        self.finish(ChainStatus::Pending);
                        self.emit(ChainEvent::SpawnFailed {
                            chain: self.name.clone(),
                            step: step_name.clone(),
                            message: err.to_string(),
                        });
                        self.emit(ChainEvent::StepCompleted {
                            chain: self.name.clone(),
                            step: step_name,
                            pid: None,
                            success: false,
                            canceled: false,
                        });
                        return;
                    }
                };

                let exit = match self.wait_step(idx, exit_rx, &mut canceled).await {
                    StepWait::Exited(exit) => exit,
                    StepWait::Restart => continue 'cycle,
                };

                let (pid, success) = match exit {
                    Some(exit) => (exit.pid, exit.success),
                    None => (None, false),
                };

                // Settle the status before reporting, so whoever sees the
                // final event also sees the final status.
                if canceled {
                    info!(chain = %self.name, step = %step_name, "chain canceled");
                    self.finish(ChainStatus::Waiting);
                } else if !success {
                    warn!(
                        chain = %self.name,
                        step = %step_name,
                        "step failed; remaining steps skipped until the next start"
                    );
                    self.finish(ChainStatus::Pending);
                } else if idx + 1 == self.steps.len() {
                    info!(chain = %self.name, "chain run finished");
                    self.finish(ChainStatus::Waiting);
                }

                self.emit(ChainEvent::StepCompleted {
                    chain: self.name.clone(),
                    step: step_name,
                    pid,
                    success,
                    canceled,
                });

                if canceled {
                    self.emit(ChainEvent::ChainCompleted {
                        chain: self.name.clone(),
                        success: false,
                        canceled: true,
                    });
                    return;
                }
                if !success {
                    return;
                }
            }

            break;
        }

        if self.steps.is_empty() {
            self.finish(ChainStatus::Waiting);
        }
        self.emit(ChainEvent::ChainCompleted {
            chain: self.name.clone(),
            success: true,
            canceled: false,
        });
    }

    /// Wait for step `idx` to exit while serving directives.
    async fn wait_step(
        &mut self,
        idx: usize,
        mut exit_rx: tokio::sync::oneshot::Receiver<ProcessExit>,
        canceled: &mut bool,
    ) -> StepWait {
        loop {
            let inbox_open = self.inbox_open;
            tokio::select! {
                exit = &mut exit_rx => return StepWait::Exited(exit.ok()),
                directive = self.inbox.recv(), if inbox_open => match directive {
                    Some(Directive::Start) => {
                        debug!(chain = %self.name, "start while running; busy");
                        self.emit(ChainEvent::Busy { chain: self.name.clone() });
                    }
                    Some(Directive::Stop) => {
                        info!(chain = %self.name, step = %self.steps[idx].name(), "stop requested");
                        self.kill_step(idx);
                        *canceled = true;
                    }
                    Some(Directive::Exit) | None => {
                        if directive.is_none() {
                            self.inbox_open = false;
                        }
                        info!(chain = %self.name, step = %self.steps[idx].name(), "exit requested");
                        self.status.set(ChainStatus::Stopping);
                        self.kill_step(idx);
                        *canceled = true;
                    }
                    Some(Directive::Restart) => {
                        if self.status.get() == ChainStatus::Stopping {
                            debug!(chain = %self.name, "restart ignored while stopping");
                            continue;
                        }
                        info!(
                            chain = %self.name,
                            step = %self.steps[idx].name(),
                            "restart requested; re-running from the first step"
                        );
                        self.kill_step(idx);
                        // Reap before respawning so two steps never overlap.
                        let exit = (&mut exit_rx).await.ok();
                        sleep(self.settle_delay).await;
                        if self.cancel_queued() {
                            *canceled = true;
                            return StepWait::Exited(exit);
                        }
                        return StepWait::Restart;
                    }
                },
            }
        }
    }

    /// Handle directives that queued up while a restart was settling.
    ///
    /// Returns `true` at the first Stop or Exit, leaving anything behind it
    /// in the inbox.
    fn cancel_queued(&mut self) -> bool {
        while self.inbox_open {
            match self.inbox.try_recv() {
                Ok(Directive::Start) => {
                    self.emit(ChainEvent::Busy { chain: self.name.clone() });
                }
                Ok(Directive::Restart) => {
                    debug!(chain = %self.name, "restart already in progress");
                }
                Ok(Directive::Stop) => {
                    info!(chain = %self.name, "stop queued during restart; not respawning");
                    return true;
                }
                Ok(Directive::Exit) => {
                    info!(chain = %self.name, "exit queued during restart; not respawning");
                    self.status.set(ChainStatus::Stopping);
                    return true;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!(chain = %self.name, "directive inbox closed");
                    self.inbox_open = false;
                    self.status.set(ChainStatus::Stopping);
                    return true;
                }
            }
        }
        false
    }

    fn kill_step(&mut self, idx: usize) {
        if let Err(err) = self.steps[idx].kill() {
            debug!(chain = %self.name, error = %err, "step already finished when killed");
        }
    }

    /// Leave `Running` for `status`, unless an exit is in progress.
    fn finish(&self, status: ChainStatus) {
        self.status
            .set_unless(status, |current| current == ChainStatus::Stopping);
    }

    fn emit(&self, event: ChainEvent) {
        if self.events.send(event).is_err() {
            debug!(chain = %self.name, "chain event receiver dropped");
        }
    }
}
