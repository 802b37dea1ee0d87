// src/exec/process.rs

//! One external-process invocation: spawn, wait-for-exit, kill, status.

use std::process::Stdio;

use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::exec::status::SharedStatus;
use crate::exec::step::{ProcessError, ProcessExit, Step};
use crate::types::RunStatus;

/// Immutable description of a process to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub name: String,
    pub exec: String,
    /// Arguments passed verbatim ahead of `params` (paths that may contain
    /// spaces).
    pub leading_args: Vec<String>,
    /// Positional arguments, split on whitespace.
    pub params: String,
    /// Appended after `params`; used when composing build/run chains.
    pub extra_args: Option<String>,
}

impl ProcessSpec {
    pub fn new(name: impl Into<String>, exec: impl Into<String>, params: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exec: exec.into(),
            leading_args: Vec::new(),
            params: params.into(),
            extra_args: None,
        }
    }

    pub fn with_extra_args(mut self, extra_args: impl Into<String>) -> Self {
        let extra_args = extra_args.into();
        self.extra_args = if extra_args.trim().is_empty() {
            None
        } else {
            Some(extra_args)
        };
        self
    }

    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Full argument vector: `leading_args`, then `params`, then
    /// `extra_args`.
    pub fn args(&self) -> Vec<String> {
        let split = self
            .params
            .split_whitespace()
            .chain(self.extra_args.iter().flat_map(|s| s.split_whitespace()))
            .map(str::to_string);
        self.leading_args.iter().cloned().chain(split).collect()
    }
}

/// Handle owning at most one live instance of a [`ProcessSpec`].
///
/// The child inherits the supervisor's stdin/stdout/stderr. Waiting happens
/// on a background Tokio task which flips the status back to `Idle` and then
/// resolves the completion receiver handed out by [`ProcessHandle::run`].
#[derive(Debug)]
pub struct ProcessHandle {
    spec: ProcessSpec,
    status: SharedStatus<RunStatus>,
    pid: Option<u32>,
    kill_tx: Option<oneshot::Sender<()>>,
}

impl ProcessHandle {
    pub fn new(spec: ProcessSpec) -> Self {
        Self {
            spec,
            status: SharedStatus::new(RunStatus::Idle),
            pid: None,
            kill_tx: None,
        }
    }

    /// Pid of the running instance, `None` when idle.
    pub fn pid(&self) -> Option<u32> {
        match self.status.get() {
            RunStatus::Running => self.pid,
            RunStatus::Idle => None,
        }
    }
}

impl Step for ProcessHandle {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn status(&self) -> RunStatus {
        self.status.get()
    }

    fn run(&mut self) -> Result<oneshot::Receiver<ProcessExit>, ProcessError> {
        if self.status.get() == RunStatus::Running {
            return Err(ProcessError::AlreadyRunning {
                name: self.spec.name.clone(),
            });
        }

        let args = self.spec.args();
        let mut child = Command::new(&self.spec.exec)
            .args(&args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                name: self.spec.name.clone(),
                exec: self.spec.exec.clone(),
                source,
            })?;

        let pid = child.id();
        info!(
            step = %self.spec.name,
            exec = %self.spec.exec,
            ?args,
            ?pid,
            "process started"
        );

        let (exit_tx, exit_rx) = oneshot::channel::<ProcessExit>();
        let (kill_tx, mut kill_rx) = oneshot::channel::<()>();

        self.status.set(RunStatus::Running);
        self.pid = pid;
        self.kill_tx = Some(kill_tx);

        let status = self.status.clone();
        let name = self.spec.name.clone();

        tokio::spawn(async move {
            // Either the process exits on its own, or a kill is requested and
            // we reap it afterwards. A dropped kill sender disables the second
            // branch rather than killing.
            let (wait_res, killed) = tokio::select! {
                res = child.wait() => (res, false),
                Ok(()) = &mut kill_rx => {
                    if let Err(e) = child.start_kill() {
                        warn!(step = %name, ?pid, error = %e, "failed to signal process");
                    }
                    (child.wait().await, true)
                }
            };

            status.set(RunStatus::Idle);

            let exit = match wait_res {
                Ok(exit_status) => ProcessExit {
                    pid,
                    success: exit_status.success(),
                    code: exit_status.code(),
                    killed,
                },
                Err(e) => {
                    error!(step = %name, ?pid, error = %e, "waiting for process failed");
                    ProcessExit {
                        pid,
                        success: false,
                        code: None,
                        killed,
                    }
                }
            };

            info!(
                step = %name,
                ?pid,
                exit_code = ?exit.code,
                success = exit.success,
                killed = exit.killed,
                "process exited"
            );

            if exit_tx.send(exit).is_err() {
                debug!(step = %name, "completion receiver dropped before exit");
            }
        });

        Ok(exit_rx)
    }

    fn kill(&mut self) -> Result<(), ProcessError> {
        if self.status.get() != RunStatus::Running {
            return Err(ProcessError::NotRunning {
                name: self.spec.name.clone(),
            });
        }

        match self.kill_tx.take() {
            Some(kill_tx) => {
                warn!(step = %self.spec.name, pid = ?self.pid, "killing process");
                if kill_tx.send(()).is_err() {
                    debug!(step = %self.spec.name, "process exited while killing");
                }
            }
            None => {
                debug!(step = %self.spec.name, "kill already requested");
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        if self.status.get() == RunStatus::Running {
            let _ = self.kill();
        }
        self.pid = None;
        self.kill_tx = None;
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if let Some(kill_tx) = self.kill_tx.take() {
            let _ = kill_tx.send(());
        }
    }
}
