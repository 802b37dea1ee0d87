// src/engine/registry.rs

//! Watcher variants selected by `command.type`.
//!
//! Every variant wraps a [`WatchUnit`] and differs only in how it turns the
//! `[watchers.command]` section into chain steps.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, oneshot};

use crate::config::model::{CommandSpec, SharedOptions, UnitMeta};
use crate::config::node::ConfigNode;
use crate::engine::UnitReport;
use crate::engine::unit::WatchUnit;
use crate::errors::Result;
use crate::exec::{ProcessHandle, ProcessSpec};
use crate::fs::FileSystem;
use crate::types::WatcherKind;

/// Capability set shared by every watcher variant.
///
/// Variants supply the unit accessors and [`Watcher::compose`]; everything
/// else delegates to the wrapped [`WatchUnit`].
pub trait Watcher: Send + std::fmt::Debug {
    fn kind(&self) -> WatcherKind;

    fn unit(&self) -> &WatchUnit;

    fn unit_mut(&mut self) -> &mut WatchUnit;

    fn into_unit(self: Box<Self>) -> WatchUnit;

    /// Steps run for `command`, in order.
    fn compose(&self, command: &CommandSpec) -> Vec<ProcessSpec>;

    fn name(&self) -> &str {
        self.unit().name()
    }

    /// Read the unit's name, quiet period and directories.
    fn load_meta(&mut self, node: &ConfigNode, shared: &SharedOptions) -> Result<()> {
        let meta = UnitMeta::from_node(node, shared)?;
        self.unit_mut().set_meta(meta);
        Ok(())
    }

    /// Resolve the file set and open the change source.
    fn prepare(&mut self, fs: Arc<dyn FileSystem>) -> Result<()> {
        self.unit_mut().prepare(fs)
    }

    fn register_command(&mut self, command: &CommandSpec) {
        for spec in self.compose(command) {
            self.unit_mut()
                .register_step(Box::new(ProcessHandle::new(spec)));
        }
    }

    fn add_watch_file(&mut self, path: &Path) -> Result<()> {
        self.unit_mut().add_watch_file(path)
    }

    fn remove_watch_file(&mut self, path: &Path) -> Result<()> {
        self.unit_mut().remove_watch_file(path)
    }

    fn run(self: Box<Self>, stop: oneshot::Receiver<()>) -> mpsc::Receiver<UnitReport> {
        self.into_unit().run(stop)
    }
}

impl WatcherKind {
    /// Build an empty watcher of this kind.
    pub fn instantiate(self) -> Box<dyn Watcher> {
        match self {
            WatcherKind::Custom => Box::new(CustomWatcher::default()),
            WatcherKind::GoRun => Box::new(GoRunWatcher::new(std::env::temp_dir())),
            WatcherKind::CargoRun => Box::new(CargoRunWatcher::new(std::env::temp_dir())),
        }
    }
}

/// Runs `exec params args` as a single step.
#[derive(Debug, Default)]
pub struct CustomWatcher {
    unit: WatchUnit,
}

impl CustomWatcher {
    pub fn new(unit: WatchUnit) -> Self {
        Self { unit }
    }
}

impl Watcher for CustomWatcher {
    fn kind(&self) -> WatcherKind {
        WatcherKind::Custom
    }

    fn unit(&self) -> &WatchUnit {
        &self.unit
    }

    fn unit_mut(&mut self) -> &mut WatchUnit {
        &mut self.unit
    }

    fn into_unit(self: Box<Self>) -> WatchUnit {
        self.unit
    }

    fn compose(&self, command: &CommandSpec) -> Vec<ProcessSpec> {
        vec![
            ProcessSpec::new("custom", &command.exec, &command.params)
                .with_extra_args(&command.args),
        ]
    }
}

/// `go build` into a timestamped binary under `out_dir`, then runs it.
#[derive(Debug)]
pub struct GoRunWatcher {
    unit: WatchUnit,
    out_dir: PathBuf,
    stamp: u64,
}

impl GoRunWatcher {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            unit: WatchUnit::default(),
            out_dir: out_dir.into(),
            stamp: unix_now(),
        }
    }

    /// Where the built binary is written for `exec`.
    pub fn binary_path(&self, exec: &str) -> PathBuf {
        self.out_dir.join(format!(
            "{exec}{}{}",
            self.stamp,
            std::env::consts::EXE_SUFFIX
        ))
    }
}

impl Watcher for GoRunWatcher {
    fn kind(&self) -> WatcherKind {
        WatcherKind::GoRun
    }

    fn unit(&self) -> &WatchUnit {
        &self.unit
    }

    fn unit_mut(&mut self) -> &mut WatchUnit {
        &mut self.unit
    }

    fn into_unit(self: Box<Self>) -> WatchUnit {
        self.unit
    }

    fn compose(&self, command: &CommandSpec) -> Vec<ProcessSpec> {
        let binary = self.binary_path(&command.exec).display().to_string();
        vec![
            ProcessSpec::new("go.build", "go", &command.params)
                .with_leading_args(["build", "-o", binary.as_str()]),
            ProcessSpec::new("go.exec", binary, &command.args),
        ]
    }
}

/// `cargo build --bin` into a dedicated target dir, then runs the binary.
#[derive(Debug)]
pub struct CargoRunWatcher {
    unit: WatchUnit,
    out_dir: PathBuf,
}

impl CargoRunWatcher {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            unit: WatchUnit::default(),
            out_dir: out_dir.into(),
        }
    }

    pub fn target_dir(&self, exec: &str) -> PathBuf {
        self.out_dir.join(format!("hotrunner-{exec}"))
    }
}

impl Watcher for CargoRunWatcher {
    fn kind(&self) -> WatcherKind {
        WatcherKind::CargoRun
    }

    fn unit(&self) -> &WatchUnit {
        &self.unit
    }

    fn unit_mut(&mut self) -> &mut WatchUnit {
        &mut self.unit
    }

    fn into_unit(self: Box<Self>) -> WatchUnit {
        self.unit
    }

    fn compose(&self, command: &CommandSpec) -> Vec<ProcessSpec> {
        let target_dir = self.target_dir(&command.exec);
        let binary = target_dir
            .join("debug")
            .join(format!("{}{}", command.exec, std::env::consts::EXE_SUFFIX));
        vec![
            ProcessSpec::new("cargo.build", "cargo", &command.params).with_leading_args([
                "build".to_string(),
                "--bin".to_string(),
                command.exec.clone(),
                "--target-dir".to_string(),
                target_dir.display().to_string(),
            ]),
            ProcessSpec::new("cargo.exec", binary.display().to_string(), &command.args),
        ]
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
