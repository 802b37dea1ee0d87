// src/engine/manager.rs

//! Runs every configured watcher and merges their report streams.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_stream::StreamExt;
use tokio_stream::StreamMap;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

use crate::config::loader::{config_base_dir, load_and_validate};
use crate::config::model::{CommandSpec, SharedOptions, Timings};
use crate::config::node::ConfigNode;
use crate::engine::UnitReport;
use crate::engine::registry::Watcher;
use crate::errors::Result;
use crate::fs::{FileSystem, RealFileSystem};

#[derive(Debug)]
pub struct Manager {
    watchers: Vec<Box<dyn Watcher>>,
    args: Vec<String>,
    shutdown_grace: Duration,
}

impl Manager {
    /// Load `config_path` and build one watcher per `[[watchers]]` entry.
    ///
    /// Relative watch paths resolve against the config file's directory.
    pub fn new(config_path: impl AsRef<Path>, args: Vec<String>) -> Result<Self> {
        let config_path = config_path.as_ref();
        let root = load_and_validate(config_path)?;
        let shared = SharedOptions::from_node(&root)?.with_base_dir(config_base_dir(config_path));
        Self::from_node(&root, &shared, args, Arc::new(RealFileSystem))
    }

    /// Build every watcher described under `watchers` in `root`.
    ///
    /// Any construction failure (unknown type, missing key, unresolvable
    /// directory) fails the whole manager.
    pub fn from_node(
        root: &ConfigNode,
        shared: &SharedOptions,
        args: Vec<String>,
        fs: Arc<dyn FileSystem>,
    ) -> Result<Self> {
        let mut watchers = Vec::new();

        for node in root.get_node_list("watchers")? {
            let command = CommandSpec::from_node(&node)?;
            let mut watcher = command.kind.instantiate();
            watcher.load_meta(&node, shared)?;
            watcher.prepare(Arc::clone(&fs))?;
            watcher.register_command(&command);

            info!(
                unit = %watcher.name(),
                kind = %watcher.kind(),
                steps = ?watcher.unit().step_names(),
                "watcher configured"
            );
            watchers.push(watcher);
        }

        Ok(Self::with_watchers(watchers, args, shared.timings))
    }

    /// Wrap already-built watchers.
    pub fn with_watchers(watchers: Vec<Box<dyn Watcher>>, args: Vec<String>, timings: Timings) -> Self {
        Self {
            watchers,
            args,
            shutdown_grace: timings.shutdown_grace,
        }
    }

    /// Free-form command-line arguments given at construction.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn watchers(&self) -> &[Box<dyn Watcher>] {
        &self.watchers
    }

    pub fn len(&self) -> usize {
        self.watchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watchers.is_empty()
    }

    /// Run until Ctrl-C / SIGTERM, or until every unit has ended.
    pub async fn run(self) {
        let reports = self.run_until(shutdown_signal()).await;
        debug!(reports = reports.len(), "manager finished");
    }

    /// Run until `shutdown` resolves, or until every unit has ended.
    ///
    /// Returns every report surfaced by the units, in arrival order.
    pub async fn run_until<F>(self, shutdown: F) -> Vec<UnitReport>
    where
        F: Future<Output = ()>,
    {
        let mut stops = Vec::with_capacity(self.watchers.len());
        let mut merged = StreamMap::new();

        for (idx, watcher) in self.watchers.into_iter().enumerate() {
            let (stop_tx, stop_rx) = oneshot::channel::<()>();
            let name = watcher.name().to_string();
            let reports = watcher.run(stop_rx);
            merged.insert(idx, ReceiverStream::new(reports));
            stops.push((name, stop_tx));
        }

        info!(units = merged.len(), "manager started");

        let mut collected = Vec::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    warn!("shutdown requested; stopping all units");
                    break;
                }
                next = merged.next() => match next {
                    Some((_, report)) => {
                        log_report(&report);
                        collected.push(report);
                    }
                    None => {
                        info!("all units finished");
                        return collected;
                    }
                },
            }
        }

        for (name, stop) in stops {
            if stop.send(()).is_err() {
                debug!(unit = %name, "unit already stopped");
            }
        }

        let drain = async {
            while let Some((_, report)) = merged.next().await {
                log_report(&report);
                collected.push(report);
            }
        };
        match timeout(self.shutdown_grace, drain).await {
            Ok(()) => info!("all units stopped"),
            Err(_) => warn!(
                grace = ?self.shutdown_grace,
                "units still running after the shutdown grace period"
            ),
        }

        collected
    }
}

fn log_report(report: &UnitReport) {
    error!(unit = %report.unit, error = %report.error, "unit reported an error");
}

/// Resolves on Ctrl-C, or on SIGTERM where available.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
