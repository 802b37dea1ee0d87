//! A scripted [`Step`] that never spawns a process.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hotrunner::exec::{ProcessError, ProcessExit, SharedStatus, Step};
use hotrunner::types::RunStatus;
use tokio::sync::oneshot;

static NEXT_PID: AtomicU32 = AtomicU32::new(10_000);

/// What a fake step does when run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// Exit successfully after the delay.
    Succeed(Duration),
    /// Exit with code 1 after the delay.
    Fail(Duration),
    /// Run until killed.
    Hang,
    /// `run()` fails as if the executable were missing.
    SpawnError,
}

/// Observations shared by every step built from the same probe.
#[derive(Debug, Clone, Default)]
pub struct Probe {
    running: Arc<AtomicUsize>,
    max_running: Arc<AtomicUsize>,
    log: Arc<Mutex<Vec<String>>>,
}

impl Probe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Steps currently between `run()` and their exit.
    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Highest value `running()` ever reached.
    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    /// `start:<name>` / `exit:<name>` / `kill:<name>` entries in order.
    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Names of the steps that were started, in order.
    pub fn starts(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter_map(|entry| entry.strip_prefix("start:").map(str::to_string))
            .collect()
    }

    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }

    fn enter(&self) {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.running.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug)]
pub struct FakeStep {
    name: String,
    script: Script,
    probe: Probe,
    status: SharedStatus<RunStatus>,
    kill_tx: Option<oneshot::Sender<()>>,
}

impl FakeStep {
    pub fn new(name: &str, script: Script, probe: &Probe) -> Self {
        Self {
            name: name.to_string(),
            script,
            probe: probe.clone(),
            status: SharedStatus::new(RunStatus::Idle),
            kill_tx: None,
        }
    }

    pub fn boxed(name: &str, script: Script, probe: &Probe) -> Box<dyn Step> {
        Box::new(Self::new(name, script, probe))
    }
}

impl Step for FakeStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self) -> RunStatus {
        self.status.get()
    }

    fn run(&mut self) -> Result<oneshot::Receiver<ProcessExit>, ProcessError> {
        if self.status.get() == RunStatus::Running {
            return Err(ProcessError::AlreadyRunning {
                name: self.name.clone(),
            });
        }
        if self.script == Script::SpawnError {
            return Err(ProcessError::Spawn {
                name: self.name.clone(),
                exec: format!("/nonexistent/{}", self.name),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            });
        }

        let pid = NEXT_PID.fetch_add(1, Ordering::SeqCst);
        let (exit_tx, exit_rx) = oneshot::channel();
        let (kill_tx, kill_rx) = oneshot::channel::<()>();

        self.status.set(RunStatus::Running);
        self.kill_tx = Some(kill_tx);
        self.probe.enter();
        self.probe.record(format!("start:{}", self.name));

        let script = self.script;
        let status = self.status.clone();
        let probe = self.probe.clone();
        let name = self.name.clone();

        tokio::spawn(async move {
            let finished = async {
                match script {
                    Script::Succeed(delay) => {
                        tokio::time::sleep(delay).await;
                        true
                    }
                    Script::Fail(delay) => {
                        tokio::time::sleep(delay).await;
                        false
                    }
                    Script::Hang | Script::SpawnError => std::future::pending::<bool>().await,
                }
            };

            let (success, killed) = tokio::select! {
                success = finished => (success, false),
                Ok(()) = kill_rx => (false, true),
            };

            probe.leave();
            probe.record(format!("exit:{name}"));
            status.set(RunStatus::Idle);
            let _ = exit_tx.send(ProcessExit {
                pid: Some(pid),
                success,
                code: if killed { None } else { Some(if success { 0 } else { 1 }) },
                killed,
            });
        });

        Ok(exit_rx)
    }

    fn kill(&mut self) -> Result<(), ProcessError> {
        if self.status.get() != RunStatus::Running {
            return Err(ProcessError::NotRunning {
                name: self.name.clone(),
            });
        }
        if let Some(kill_tx) = self.kill_tx.take() {
            self.probe.record(format!("kill:{}", self.name));
            let _ = kill_tx.send(());
        }
        Ok(())
    }
}
