mod common;
use crate::common::{FakeStep, Probe, Script, init_tracing, ms, next_event, wait_until, with_timeout};

use hotrunner::exec::{ChainEvent, CommandChain, RunningChain};
use hotrunner::types::ChainStatus;

fn spawn_chain(steps: Vec<(&str, Script)>, probe: &Probe) -> RunningChain {
    let mut chain = CommandChain::new("app").with_settle_delay(ms(200));
    for (name, script) in steps {
        chain.register(FakeStep::boxed(name, script, probe));
    }
    chain.spawn()
}

fn completed_step(event: ChainEvent) -> (String, bool, bool) {
    match event {
        ChainEvent::StepCompleted {
            step,
            success,
            canceled,
            ..
        } => (step, success, canceled),
        other => panic!("expected StepCompleted, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn start_while_running_reports_busy_and_keeps_running() {
    init_tracing();
    let probe = Probe::new();
    let mut chain = spawn_chain(vec![("serve", Script::Hang)], &probe);

    chain.control.start();
    wait_until(|| probe.running() == 1).await;

    chain.control.start();
    assert_eq!(
        next_event(&mut chain.events).await,
        ChainEvent::Busy {
            chain: "app".to_string()
        }
    );
    assert_eq!(chain.control.status(), ChainStatus::Running);
    assert_eq!(probe.starts(), vec!["serve"]);

    chain.control.exit();
    with_timeout(chain.task).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn restart_mid_chain_resumes_at_the_first_step() {
    init_tracing();
    let probe = Probe::new();
    let mut chain = spawn_chain(
        vec![("build", Script::Succeed(ms(10))), ("run", Script::Hang)],
        &probe,
    );

    chain.control.start();
    assert_eq!(
        completed_step(next_event(&mut chain.events).await),
        ("build".to_string(), true, false)
    );
    wait_until(|| probe.starts() == vec!["build", "run"]).await;

    chain.control.restart();

    // The interrupted step is not reported; the chain starts over.
    assert_eq!(
        completed_step(next_event(&mut chain.events).await),
        ("build".to_string(), true, false)
    );
    wait_until(|| probe.starts().len() == 4).await;
    assert_eq!(probe.starts(), vec!["build", "run", "build", "run"]);
    assert_eq!(probe.max_running(), 1);

    chain.control.exit();
    with_timeout(chain.task).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn exit_queued_behind_a_restart_does_not_respawn() {
    init_tracing();
    let probe = Probe::new();
    let mut chain = spawn_chain(vec![("serve", Script::Hang)], &probe);

    chain.control.start();
    wait_until(|| probe.running() == 1).await;

    chain.control.restart();
    chain.control.exit();

    assert_eq!(
        completed_step(next_event(&mut chain.events).await),
        ("serve".to_string(), false, true)
    );
    assert!(matches!(
        next_event(&mut chain.events).await,
        ChainEvent::ChainCompleted { canceled: true, .. }
    ));

    with_timeout(chain.task).await.unwrap();
    assert_eq!(chain.control.status(), ChainStatus::Stopping);
    assert_eq!(probe.starts(), vec!["serve"]);
    assert_eq!(probe.running(), 0);
}

#[tokio::test(start_paused = true)]
async fn stop_queued_behind_a_restart_leaves_the_chain_waiting() {
    init_tracing();
    let probe = Probe::new();
    let mut chain = spawn_chain(vec![("serve", Script::Hang)], &probe);

    chain.control.start();
    wait_until(|| probe.running() == 1).await;

    chain.control.restart();
    chain.control.stop();

    assert_eq!(
        completed_step(next_event(&mut chain.events).await),
        ("serve".to_string(), false, true)
    );
    assert!(matches!(
        next_event(&mut chain.events).await,
        ChainEvent::ChainCompleted { canceled: true, .. }
    ));
    assert_eq!(chain.control.status(), ChainStatus::Waiting);
    assert_eq!(probe.starts(), vec!["serve"]);

    chain.control.start();
    wait_until(|| probe.starts().len() == 2).await;

    chain.control.exit();
    with_timeout(chain.task).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn restart_while_idle_behaves_like_start() {
    init_tracing();
    let probe = Probe::new();
    let mut chain = spawn_chain(vec![("only", Script::Succeed(ms(5)))], &probe);

    chain.control.restart();
    assert_eq!(
        completed_step(next_event(&mut chain.events).await),
        ("only".to_string(), true, false)
    );
    assert!(matches!(
        next_event(&mut chain.events).await,
        ChainEvent::ChainCompleted { success: true, .. }
    ));

    chain.control.exit();
    with_timeout(chain.task).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn failure_parks_the_chain_until_the_next_start() {
    init_tracing();
    let probe = Probe::new();
    let mut chain = spawn_chain(
        vec![("build", Script::Fail(ms(10))), ("run", Script::Succeed(ms(10)))],
        &probe,
    );

    chain.control.start();
    assert_eq!(
        completed_step(next_event(&mut chain.events).await),
        ("build".to_string(), false, false)
    );
    assert_eq!(chain.control.status(), ChainStatus::Pending);

    // Not retried on its own.
    tokio::time::sleep(ms(1_000)).await;
    assert_eq!(probe.starts(), vec!["build"]);
    assert!(chain.events.try_recv().is_err());

    chain.control.start();
    assert_eq!(
        completed_step(next_event(&mut chain.events).await),
        ("build".to_string(), false, false)
    );
    assert_eq!(probe.starts(), vec!["build", "build"]);

    chain.control.exit();
    with_timeout(chain.task).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn stop_while_idle_is_a_no_op() {
    init_tracing();
    let probe = Probe::new();
    let mut chain = spawn_chain(vec![("only", Script::Succeed(ms(5)))], &probe);

    chain.control.stop();
    tokio::time::sleep(ms(100)).await;
    assert_eq!(chain.control.status(), ChainStatus::Waiting);
    assert!(chain.events.try_recv().is_err());
    assert!(probe.starts().is_empty());

    chain.control.exit();
    with_timeout(chain.task).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn exit_while_running_cancels_and_ends_the_executor() {
    init_tracing();
    let probe = Probe::new();
    let mut chain = spawn_chain(vec![("serve", Script::Hang), ("never", Script::Hang)], &probe);

    chain.control.start();
    wait_until(|| probe.running() == 1).await;
    chain.control.exit();

    assert_eq!(
        completed_step(next_event(&mut chain.events).await),
        ("serve".to_string(), false, true)
    );
    assert!(matches!(
        next_event(&mut chain.events).await,
        ChainEvent::ChainCompleted {
            success: false,
            canceled: true,
            ..
        }
    ));

    with_timeout(chain.task).await.unwrap();
    assert_eq!(chain.control.status(), ChainStatus::Stopping);
    assert_eq!(probe.running(), 0);
    assert!(!chain.control.start());
}

#[tokio::test(start_paused = true)]
async fn exit_while_idle_ends_the_executor() {
    init_tracing();
    let probe = Probe::new();
    let chain = spawn_chain(vec![("only", Script::Succeed(ms(5)))], &probe);

    chain.control.exit();
    with_timeout(chain.task).await.unwrap();
    assert_eq!(chain.control.status(), ChainStatus::Stopping);
    assert!(probe.starts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn executor_survives_repeated_successful_cycles() {
    init_tracing();
    let probe = Probe::new();
    let mut chain = spawn_chain(
        vec![("build", Script::Succeed(ms(5))), ("run", Script::Succeed(ms(5)))],
        &probe,
    );

    for _ in 0..3 {
        chain.control.start();
        loop {
            if let ChainEvent::ChainCompleted { success, .. } = next_event(&mut chain.events).await {
                assert!(success);
                break;
            }
        }
        assert_eq!(chain.control.status(), ChainStatus::Waiting);
    }
    assert_eq!(probe.starts().len(), 6);

    chain.control.exit();
    with_timeout(chain.task).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn spawn_failure_is_treated_as_a_step_failure() {
    init_tracing();
    let probe = Probe::new();
    let mut chain = spawn_chain(
        vec![("build", Script::SpawnError), ("run", Script::Succeed(ms(5)))],
        &probe,
    );

    chain.control.start();
    assert!(matches!(
        next_event(&mut chain.events).await,
        ChainEvent::SpawnFailed { ref step, .. } if step == "build"
    ));
    assert_eq!(
        completed_step(next_event(&mut chain.events).await),
        ("build".to_string(), false, false)
    );
    assert_eq!(chain.control.status(), ChainStatus::Pending);
    assert!(probe.starts().is_empty());

    chain.control.exit();
    with_timeout(chain.task).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn dropping_every_control_handle_stops_the_executor() {
    init_tracing();
    let probe = Probe::new();
    let RunningChain { control, events, task } = spawn_chain(vec![("serve", Script::Hang)], &probe);

    control.start();
    wait_until(|| probe.running() == 1).await;
    drop(control);

    with_timeout(task).await.unwrap();
    assert_eq!(probe.running(), 0);
    drop(events);
}
