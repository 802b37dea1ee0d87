// src/types.rs

use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a command chain.
///
/// - `Waiting`: idle, the previous cycle (if any) finished cleanly or was
///   canceled.
/// - `Pending`: idle after a step failed; only an explicit `Start` resumes it.
/// - `Running`: steps are executing.
/// - `Stopping`: `Exit` was accepted; the executor winds down and never
///   leaves this state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChainStatus {
    #[default]
    Waiting,
    Pending,
    Running,
    Stopping,
}

impl fmt::Display for ChainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChainStatus::Waiting => "waiting",
            ChainStatus::Pending => "pending",
            ChainStatus::Running => "running",
            ChainStatus::Stopping => "stopping",
        };
        f.write_str(s)
    }
}

/// Status of a single step (process) handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
}

/// Control message delivered to a command chain's inbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Start,
    Stop,
    Restart,
    Exit,
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Directive::Start => "start",
            Directive::Stop => "stop",
            Directive::Restart => "restart",
            Directive::Exit => "exit",
        };
        f.write_str(s)
    }
}

/// Watcher variant selected by `command.type` in the config.
///
/// This enum is the registry of watcher behaviours: parsing maps the
/// discriminant string to a variant and [`WatcherKind::instantiate`]
/// (in `engine::registry`) builds the matching watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherKind {
    /// Run `exec params args` as a single step.
    Custom,
    /// `go build` into a temp binary, then run it.
    GoRun,
    /// `cargo build --bin` into a temp target dir, then run the binary.
    CargoRun,
}

impl WatcherKind {
    pub const ALL: [WatcherKind; 3] = [
        WatcherKind::Custom,
        WatcherKind::GoRun,
        WatcherKind::CargoRun,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WatcherKind::Custom => "custom",
            WatcherKind::GoRun => "builtin.go.run",
            WatcherKind::CargoRun => "builtin.cargo.run",
        }
    }
}

impl fmt::Display for WatcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WatcherKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        WatcherKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = WatcherKind::ALL.iter().map(|k| k.as_str()).collect();
                format!("{wanted} (expected one of: {})", known.join(", "))
            })
    }
}
