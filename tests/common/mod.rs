#![allow(dead_code, unused_imports)]

use std::time::Duration;

use hotrunner::exec::ChainEvent;
use tokio::sync::mpsc;

pub use hotrunner_test_utils::builders;
pub use hotrunner_test_utils::fake_source::{FakeSourceHandle, fake_source};
pub use hotrunner_test_utils::fake_step::{FakeStep, Probe, Script};
pub use hotrunner_test_utils::{init_tracing, with_timeout};

/// Poll `cond` every few milliseconds until it holds (5s limit).
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    with_timeout(async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
}

/// Next chain event, failing the test if none arrives within 5s.
pub async fn next_event(events: &mut mpsc::UnboundedReceiver<ChainEvent>) -> ChainEvent {
    with_timeout(events.recv())
        .await
        .expect("chain event stream closed")
}

pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}
