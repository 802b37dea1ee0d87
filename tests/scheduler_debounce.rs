mod common;
use crate::common::{init_tracing, ms, with_timeout};

use hotrunner::engine::Scheduler;
use hotrunner::exec::ChainControl;
use hotrunner::types::{ChainStatus, Directive};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, sleep, sleep_until};

/// Record every directive with its arrival time until the inbox closes.
fn collect(mut inbox: mpsc::UnboundedReceiver<Directive>) -> JoinHandle<Vec<(Instant, Directive)>> {
    tokio::spawn(async move {
        let mut seen = Vec::new();
        while let Some(directive) = inbox.recv().await {
            seen.push((Instant::now(), directive));
        }
        seen
    })
}

fn near(actual: Instant, expected: Instant) -> bool {
    actual >= expected && actual - expected <= ms(20)
}

#[tokio::test(start_paused = true)]
async fn initial_run_fires_immediately() {
    init_tracing();
    let (control, mut inbox, _status) = ChainControl::channel("unit");
    let created = Instant::now();
    let _scheduler = Scheduler::new("unit", ms(500), control);

    let directive = with_timeout(inbox.recv()).await.unwrap();
    assert_eq!(directive, Directive::Start);
    assert!(near(Instant::now(), created));
}

#[tokio::test(start_paused = true)]
async fn burst_is_collapsed_into_spaced_runs() {
    init_tracing();
    let (control, mut inbox, _status) = ChainControl::channel("unit");
    let mut scheduler = Scheduler::new("unit", ms(500), control);
    assert_eq!(with_timeout(inbox.recv()).await, Some(Directive::Start));
    let seen = collect(inbox);

    // Leave the startup window behind.
    sleep(ms(1_000)).await;
    let t0 = Instant::now();

    assert!(scheduler.schedule());
    sleep_until(t0 + ms(100)).await;
    assert!(!scheduler.schedule(), "inside the cool-down window");
    sleep_until(t0 + ms(600)).await;
    assert!(scheduler.schedule());

    sleep_until(t0 + ms(2_000)).await;
    drop(scheduler);

    let seen = seen.await.unwrap();
    let starts: Vec<Instant> = seen
        .iter()
        .filter(|(_, d)| *d == Directive::Start)
        .map(|(at, _)| *at)
        .collect();
    assert_eq!(starts.len(), 2, "got {seen:?}");
    assert!(near(starts[0], t0 + ms(500)));
    assert!(near(starts[1], t0 + ms(1_100)));
}

#[tokio::test(start_paused = true)]
async fn signal_exactly_at_the_window_edge_keeps_the_due_run() {
    init_tracing();
    let (control, mut inbox, _status) = ChainControl::channel("unit");
    let mut scheduler = Scheduler::new("unit", ms(500), control);
    assert_eq!(with_timeout(inbox.recv()).await, Some(Directive::Start));
    let seen = collect(inbox);

    sleep(ms(1_000)).await;
    let t0 = Instant::now();
    assert!(scheduler.schedule());

    sleep_until(t0 + ms(500)).await;
    assert!(!scheduler.schedule(), "the window has not been exceeded yet");

    sleep_until(t0 + ms(600)).await;
    assert!(scheduler.schedule());

    sleep_until(t0 + ms(2_000)).await;
    drop(scheduler);

    let starts: Vec<Instant> = seen
        .await
        .unwrap()
        .into_iter()
        .filter(|(_, d)| *d == Directive::Start)
        .map(|(at, _)| at)
        .collect();
    assert_eq!(starts.len(), 2);
    assert!(near(starts[0], t0 + ms(500)));
    assert!(near(starts[1], t0 + ms(1_100)));
}

#[tokio::test(start_paused = true)]
async fn pending_run_is_never_postponed() {
    init_tracing();
    let (control, _inbox, _status) = ChainControl::channel("unit");
    let mut scheduler = Scheduler::new("unit", ms(100), control);

    // The startup run is still pending at creation time.
    assert!(!scheduler.schedule());
}

#[tokio::test(start_paused = true)]
async fn many_signals_in_one_window_run_once() {
    init_tracing();
    let (control, mut inbox, _status) = ChainControl::channel("unit");
    let mut scheduler = Scheduler::new("unit", ms(300), control);
    inbox.recv().await;
    let seen = collect(inbox);

    sleep(ms(500)).await;
    let armed: Vec<bool> = (0..20)
        .map(|_| scheduler.schedule())
        .collect();
    assert_eq!(armed.iter().filter(|a| **a).count(), 1);

    sleep(ms(1_000)).await;
    drop(scheduler);
    assert_eq!(seen.await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn running_chain_gets_a_restart() {
    init_tracing();
    let (control, mut inbox, status) = ChainControl::channel("unit");
    let mut scheduler = Scheduler::new("unit", ms(200), control);
    inbox.recv().await;

    status.set(ChainStatus::Running);
    sleep(ms(300)).await;
    assert!(scheduler.schedule());

    let directive = with_timeout(inbox.recv()).await;
    assert_eq!(directive, Some(Directive::Restart));
}

#[tokio::test(start_paused = true)]
async fn exit_cancels_the_pending_run() {
    init_tracing();
    let (control, mut inbox, _status) = ChainControl::channel("unit");
    let mut scheduler = Scheduler::new("unit", ms(200), control);
    inbox.recv().await;

    sleep(ms(300)).await;
    assert!(scheduler.schedule());
    scheduler.exit();
    drop(scheduler);

    let seen = collect(inbox).await.unwrap();
    let directives: Vec<Directive> = seen.into_iter().map(|(_, d)| d).collect();
    assert_eq!(directives, vec![Directive::Exit]);
}

#[tokio::test(start_paused = true)]
async fn quiet_period_is_exposed() {
    let (control, _inbox, _status) = ChainControl::channel("unit");
    let scheduler = Scheduler::new("unit", Duration::from_secs(2), control);
    assert_eq!(scheduler.quiet_period(), Duration::from_secs(2));
}
