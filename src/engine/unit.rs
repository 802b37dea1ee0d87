// src/engine/unit.rs

//! One watcher's runtime: its file set, subscriptions, scheduler and chain.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::model::UnitMeta;
use crate::engine::scheduler::Scheduler;
use crate::engine::{UnitError, UnitReport};
use crate::errors::{HotrunnerError, Result};
use crate::exec::{ChainEvent, CommandChain, RunningChain, Step};
use crate::fs::{FileSystem, RealFileSystem};
use crate::watch::patterns::resolve_watch_specs;
use crate::watch::source::{ChangeEvent, ChangeSource, ChangeStreams, NotifySource};

/// Capacity of a unit's report channel.
const REPORT_BUFFER: usize = 64;

pub struct WatchUnit {
    meta: UnitMeta,
    steps: Vec<Box<dyn Step>>,
    files: Vec<PathBuf>,
    fs: Arc<dyn FileSystem>,
    source: Option<Box<dyn ChangeSource>>,
    streams: Option<ChangeStreams>,
    /// path -> currently subscribed. Only touched by the unit's own loop
    /// once it runs.
    subscriptions: BTreeMap<PathBuf, bool>,
}

impl std::fmt::Debug for WatchUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchUnit")
            .field("name", &self.meta.name)
            .field("steps", &self.step_names())
            .field("files", &self.files.len())
            .finish_non_exhaustive()
    }
}

impl Default for WatchUnit {
    fn default() -> Self {
        Self::new(UnitMeta::default())
    }
}

impl WatchUnit {
    pub fn new(meta: UnitMeta) -> Self {
        Self {
            meta,
            steps: Vec::new(),
            files: Vec::new(),
            fs: Arc::new(RealFileSystem),
            source: None,
            streams: None,
            subscriptions: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn meta(&self) -> &UnitMeta {
        &self.meta
    }

    pub fn set_meta(&mut self, meta: UnitMeta) {
        self.meta = meta;
    }

    /// The resolved file set; empty until prepared.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn step_names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn register_step(&mut self, step: Box<dyn Step>) {
        self.steps.push(step);
    }

    /// Resolve the file set and open a `notify` subscription source.
    pub fn prepare(&mut self, fs: Arc<dyn FileSystem>) -> Result<()> {
        let (source, streams) = NotifySource::new()?;
        self.prepare_with_source(fs, Box::new(source), streams)
    }

    /// Resolve the file set and attach the given change source.
    pub fn prepare_with_source(
        &mut self,
        fs: Arc<dyn FileSystem>,
        source: Box<dyn ChangeSource>,
        streams: ChangeStreams,
    ) -> Result<()> {
        let files = resolve_watch_specs(fs.as_ref(), &self.meta.directories)?;
        if files.is_empty() {
            warn!(unit = %self.meta.name, "no files matched; the unit will only run at startup");
        } else {
            info!(unit = %self.meta.name, files = files.len(), "resolved watch set");
        }

        self.files = files;
        self.fs = fs;
        self.source = Some(source);
        self.streams = Some(streams);
        Ok(())
    }

    pub fn is_subscribed(&self, path: &Path) -> bool {
        self.subscriptions.get(path).copied().unwrap_or(false)
    }

    /// Subscribe to `path`. A no-op if it is already subscribed.
    pub fn add_watch_file(&mut self, path: &Path) -> Result<()> {
        if self.is_subscribed(path) {
            return Ok(());
        }
        let Some(source) = self.source.as_mut() else {
            return Err(HotrunnerError::ConfigError(format!(
                "unit '{}' has no change source; prepare it first",
                self.meta.name
            )));
        };

        match source.add(path) {
            Ok(()) => {
                debug!(unit = %self.meta.name, path = %path.display(), "subscribed");
                self.subscriptions.insert(path.to_path_buf(), true);
                Ok(())
            }
            Err(err) => {
                self.subscriptions.insert(path.to_path_buf(), false);
                Err(err)
            }
        }
    }

    /// Mark `path` inactive and detach its subscription if there is one.
    pub fn remove_watch_file(&mut self, path: &Path) -> Result<()> {
        let was_active = self.subscriptions.insert(path.to_path_buf(), false);
        if was_active == Some(true) {
            if let Some(source) = self.source.as_mut() {
                source.remove(path)?;
                debug!(unit = %self.meta.name, path = %path.display(), "unsubscribed");
            }
        }
        Ok(())
    }

    /// Start the unit's event loop.
    ///
    /// The returned stream carries everything the unit cannot handle itself
    /// and closes once the unit has shut down after `stop` fires (or its
    /// sender is dropped).
    pub fn run(self, stop: oneshot::Receiver<()>) -> mpsc::Receiver<UnitReport> {
        let (report_tx, report_rx) = mpsc::channel::<UnitReport>(REPORT_BUFFER);
        tokio::spawn(self.event_loop(stop, report_tx));
        report_rx
    }

    async fn event_loop(mut self, mut stop: oneshot::Receiver<()>, reports: mpsc::Sender<UnitReport>) {
        let name = self.meta.name.clone();

        let ChangeStreams {
            mut changes,
            mut errors,
        } = match self.streams.take() {
            Some(streams) => streams,
            None => {
                warn!(unit = %name, "unit not prepared; running without file subscriptions");
                closed_streams()
            }
        };

        let mut chain = CommandChain::new(name.clone()).with_settle_delay(self.meta.timings.settle);
        for step in std::mem::take(&mut self.steps) {
            chain.register(step);
        }
        let RunningChain {
            control,
            events: mut chain_events,
            task: chain_task,
        } = chain.spawn();

        let mut scheduler = Scheduler::new(name.clone(), self.meta.quiet_period, control);

        for path in self.files.clone() {
            if let Err(err) = self.add_watch_file(&path) {
                warn!(unit = %name, path = %path.display(), error = %err, "failed to subscribe");
            }
        }

        info!(
            unit = %name,
            files = self.files.len(),
            quiet_period = ?self.meta.quiet_period,
            "watch unit started"
        );

        let (rewatch_tx, mut rewatch_rx) = mpsc::unbounded_channel::<PathBuf>();

        loop {
            tokio::select! {
                _ = &mut stop => {
                    info!(unit = %name, "stop requested");
                    break;
                }
                Some(change) = changes.recv() => {
                    self.on_change(change, &mut scheduler, &rewatch_tx);
                }
                Some(err) = errors.recv() => {
                    warn!(unit = %name, error = %err, "change source error");
                    send_report(&reports, &name, UnitError::Source(err)).await;
                }
                Some(path) = rewatch_rx.recv() => {
                    self.on_rewatch(&path);
                }
                event = chain_events.recv() => match event {
                    Some(event) => {
                        if let Some(err) = self.on_chain_event(event) {
                            send_report(&reports, &name, err).await;
                        }
                    }
                    None => {
                        error!(unit = %name, "chain executor ended unexpectedly");
                        break;
                    }
                },
            }
        }

        // Reap the chain before letting go of anything else.
        scheduler.exit();
        while let Some(event) = chain_events.recv().await {
            if let Some(err) = self.on_chain_event(event) {
                send_report(&reports, &name, err).await;
            }
        }
        if let Err(err) = chain_task.await {
            error!(unit = %name, error = %err, "chain executor task failed");
        }

        self.release_subscriptions();
        info!(unit = %name, "watch unit stopped");
    }

    fn on_change(
        &mut self,
        change: ChangeEvent,
        scheduler: &mut Scheduler,
        rewatch_tx: &mpsc::UnboundedSender<PathBuf>,
    ) {
        info!(unit = %self.meta.name, path = %change.path.display(), op = ?change.op, "file changed");

        // Editors often save by deleting (or renaming over) the file, which
        // drops the subscription. Detach now, look again shortly.
        if change.op.detaches() && self.subscriptions.contains_key(&change.path) {
            if let Err(err) = self.remove_watch_file(&change.path) {
                debug!(
                    unit = %self.meta.name,
                    path = %change.path.display(),
                    error = %err,
                    "unsubscribe after removal failed"
                );
            }

            let tx = rewatch_tx.clone();
            let delay = self.meta.timings.rewatch;
            let path = change.path.clone();
            tokio::spawn(async move {
                sleep(delay).await;
                let _ = tx.send(path);
            });
        }

        scheduler.schedule();
    }

    fn on_rewatch(&mut self, path: &Path) {
        if !self.fs.exists(path) {
            info!(unit = %self.meta.name, path = %path.display(), "file gone; no longer watched");
            return;
        }
        match self.add_watch_file(path) {
            Ok(()) => info!(unit = %self.meta.name, path = %path.display(), "file re-subscribed"),
            Err(err) => warn!(
                unit = %self.meta.name,
                path = %path.display(),
                error = %err,
                "failed to re-subscribe"
            ),
        }
    }

    fn on_chain_event(&self, event: ChainEvent) -> Option<UnitError> {
        match event {
            ChainEvent::Busy { chain } => {
                warn!(unit = %self.meta.name, %chain, "chain busy; start ignored");
                None
            }
            ChainEvent::StepCompleted {
                step,
                pid,
                success,
                canceled,
                ..
            } => {
                info!(unit = %self.meta.name, %step, ?pid, success, canceled, "step finished");
                None
            }
            ChainEvent::ChainCompleted {
                success, canceled, ..
            } => {
                info!(unit = %self.meta.name, success, canceled, "chain finished");
                None
            }
            ChainEvent::SpawnFailed { step, message, .. } => Some(UnitError::Spawn { step, message }),
        }
    }

    fn release_subscriptions(&mut self) {
        let active: Vec<PathBuf> = self
            .subscriptions
            .iter()
            .filter(|(_, active)| **active)
            .map(|(path, _)| path.clone())
            .collect();
        for path in active {
            if let Err(err) = self.remove_watch_file(&path) {
                debug!(unit = %self.meta.name, path = %path.display(), error = %err, "unsubscribe failed");
            }
        }
        self.source = None;
    }
}

async fn send_report(reports: &mpsc::Sender<UnitReport>, unit: &str, error: UnitError) {
    let report = UnitReport {
        unit: unit.to_string(),
        error,
    };
    if reports.send(report).await.is_err() {
        debug!(%unit, "report receiver dropped");
    }
}

/// Streams that are already closed, for a unit with no change source.
fn closed_streams() -> ChangeStreams {
    let (_, changes) = mpsc::unbounded_channel();
    let (_, errors) = mpsc::unbounded_channel();
    ChangeStreams { changes, errors }
}
