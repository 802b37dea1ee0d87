mod common;
use crate::common::builders::{ConfigBuilder, DirectoryBuilder, WatcherBuilder};
use crate::common::{
    FakeSourceHandle, FakeStep, Probe, Script, fake_source, init_tracing, ms, wait_until, with_timeout,
};

use std::path::PathBuf;
use std::sync::Arc;

use hotrunner::config::{SharedOptions, Timings, UnitMeta, WatchSpec};
use hotrunner::engine::{CustomWatcher, Manager, UnitError, WatchUnit, Watcher};
use hotrunner::errors::HotrunnerError;
use hotrunner::fs::FileSystem;
use hotrunner_test_utils::fake_fs::MockFileSystem;
use tokio::sync::oneshot;

fn project() -> Arc<MockFileSystem> {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/main.c");
    fs.add_file("/proj/util.c");
    fs.add_file("/proj/README.md");
    Arc::new(fs)
}

fn timings() -> Timings {
    Timings {
        settle: ms(10),
        rewatch: ms(50),
        shutdown_grace: ms(500),
    }
}

fn meta(name: &str) -> UnitMeta {
    UnitMeta {
        name: name.to_string(),
        quiet_period: ms(50),
        directories: vec![WatchSpec {
            path: PathBuf::from("/proj"),
            includes: vec!["*.c".to_string()],
            excludes: Vec::new(),
            recursive: true,
        }],
        timings: timings(),
    }
}

/// A custom watcher over the mock project with one fake step.
fn watcher(name: &str, script: Script, probe: &Probe) -> (Box<dyn Watcher>, FakeSourceHandle) {
    let (source, streams, handle) = fake_source();
    let mut unit = WatchUnit::new(meta(name));
    unit.register_step(FakeStep::boxed("step", script, probe));
    let fs: Arc<dyn FileSystem> = project();
    unit.prepare_with_source(fs, source, streams).unwrap();
    (Box::new(CustomWatcher::new(unit)), handle)
}

#[tokio::test]
async fn manager_without_watchers_returns_at_once() {
    let manager = Manager::with_watchers(Vec::new(), Vec::new(), timings());
    assert!(manager.is_empty());

    let reports = with_timeout(manager.run_until(std::future::pending())).await;
    assert!(reports.is_empty());
}

#[tokio::test]
async fn shutdown_stops_every_unit_and_collects_reports() {
    init_tracing();
    let api_probe = Probe::new();
    let worker_probe = Probe::new();
    let (api, api_source) = watcher("api", Script::Hang, &api_probe);
    let (worker, worker_source) = watcher("worker", Script::Hang, &worker_probe);

    let manager = Manager::with_watchers(vec![api, worker], vec!["--fast".to_string()], timings());
    assert_eq!(manager.len(), 2);
    assert_eq!(manager.args(), ["--fast".to_string()]);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let run = tokio::spawn(manager.run_until(async {
        let _ = shutdown_rx.await;
    }));

    wait_until(|| api_probe.running() == 1 && worker_probe.running() == 1).await;
    wait_until(|| api_source.subscribed().len() == 2 && worker_source.subscribed().len() == 2).await;

    worker_source.emit_error("inotify queue overflow");
    tokio::time::sleep(ms(100)).await;

    shutdown_tx.send(()).unwrap();
    let reports = with_timeout(run).await.unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].unit, "worker");
    assert!(matches!(reports[0].error, UnitError::Source(_)));

    assert_eq!(api_probe.running(), 0);
    assert_eq!(worker_probe.running(), 0);
    assert!(api_source.subscribed().is_empty());
    assert!(worker_source.subscribed().is_empty());
}

#[tokio::test]
async fn spawn_failures_surface_with_the_unit_name() {
    init_tracing();
    let probe = Probe::new();
    let (broken, _source) = watcher("broken", Script::SpawnError, &probe);
    let manager = Manager::with_watchers(vec![broken], Vec::new(), timings());

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let run = tokio::spawn(manager.run_until(async {
        let _ = shutdown_rx.await;
    }));

    tokio::time::sleep(ms(200)).await;
    shutdown_tx.send(()).unwrap();

    let reports = with_timeout(run).await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].unit, "broken");
    assert!(matches!(reports[0].error, UnitError::Spawn { ref step, .. } if step == "step"));
}

#[tokio::test]
async fn watchers_are_built_from_the_config_document() {
    let root = ConfigBuilder::new()
        .with_watcher(
            WatcherBuilder::custom("make")
                .named("build")
                .with_params("all")
                .with_directory(DirectoryBuilder::new("/proj").include("*.c")),
        )
        .with_watcher(
            WatcherBuilder::new("builtin.go.run", "api")
                .with_directory(DirectoryBuilder::new("/proj").include("*.md")),
        )
        .build();
    let shared = SharedOptions::from_node(&root).unwrap();

    let manager = Manager::from_node(&root, &shared, Vec::new(), project()).unwrap();
    let watchers = manager.watchers();
    assert_eq!(watchers.len(), 2);

    assert_eq!(watchers[0].name(), "build");
    assert_eq!(watchers[0].unit().step_names(), vec!["custom"]);
    assert_eq!(
        watchers[0].unit().files(),
        [PathBuf::from("/proj/main.c"), PathBuf::from("/proj/util.c")]
    );

    assert_eq!(watchers[1].name(), "UNKNOWN");
    assert_eq!(watchers[1].unit().step_names(), vec!["go.build", "go.exec"]);
    assert_eq!(watchers[1].unit().files(), [PathBuf::from("/proj/README.md")]);
}

#[tokio::test]
async fn unknown_watcher_type_fails_the_manager() {
    let root = ConfigBuilder::new()
        .with_watcher(
            WatcherBuilder::new("builtin.node.run", "server")
                .with_directory(DirectoryBuilder::new("/proj").include("*.js")),
        )
        .build();
    let shared = SharedOptions::from_node(&root).unwrap();

    let err = Manager::from_node(&root, &shared, Vec::new(), project()).unwrap_err();
    assert!(matches!(err, HotrunnerError::UnknownWatcherType(_)));
}

#[tokio::test]
async fn missing_directory_fails_the_manager() {
    let root = ConfigBuilder::new()
        .with_watcher(
            WatcherBuilder::custom("make").with_directory(DirectoryBuilder::new("/elsewhere").include("*")),
        )
        .build();
    let shared = SharedOptions::from_node(&root).unwrap();

    assert!(Manager::from_node(&root, &shared, Vec::new(), project()).is_err());
}

#[tokio::test]
async fn relative_paths_resolve_against_the_config_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("src")).unwrap();
    std::fs::write(dir.path().join("src/lib.txt"), "x").unwrap();
    std::fs::write(dir.path().join("skip.log"), "x").unwrap();

    let config = dir.path().join("hotrunner.toml");
    let toml = ConfigBuilder::new()
        .with_watcher(
            WatcherBuilder::custom("true")
                .named("docs")
                .with_directory(DirectoryBuilder::new("src").include("*.txt")),
        )
        .to_toml();
    std::fs::write(&config, toml).unwrap();

    let manager = Manager::new(&config, Vec::new()).unwrap();
    let files = manager.watchers()[0].unit().files();
    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with("src/lib.txt"));
}
