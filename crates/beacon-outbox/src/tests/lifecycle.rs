//! Start, stop and restart.

use super::harness::{record, wait_until, Harness};
use crate::{EventPipeline, OutboxError};
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn start_and_stop_are_idempotent() {
    let h = Harness::new();
    let pipeline = h.durable();
    assert!(!pipeline.is_running());

    pipeline.start().unwrap();
    pipeline.start().unwrap();
    assert!(pipeline.is_running());

    pipeline.stop().await;
    pipeline.stop().await;
    assert!(!pipeline.is_running());
}

#[tokio::test(start_paused = true)]
async fn restart_keeps_session_and_backlog() {
    let h = Harness::new();
    let pipeline = h.durable();
    pipeline.start().unwrap();

    pipeline.enqueue(record("before"));
    assert!(wait_until(|| h.transport.delivered_names().len() == 1).await);
    pipeline.stop().await;

    assert!(pipeline.enqueue(record("between")));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.transport.attempt_count(), 1);

    pipeline.start().unwrap();
    assert!(wait_until(|| h.transport.delivered_names().len() == 2).await);
    assert_eq!(h.transport.delivered_names(), vec!["before", "between"]);

    let attempts = h.transport.attempts();
    assert_eq!(attempts[0].session_id, attempts[1].session_id);

    pipeline.stop().await;
}

#[tokio::test(start_paused = true)]
async fn hung_send_is_aborted_after_grace() {
    let h = Harness::new();
    h.transport.push_hang();
    let pipeline = h.durable();

    pipeline.enqueue(record("hung"));
    pipeline.start().unwrap();
    assert!(wait_until(|| h.transport.attempt_count() == 1).await);

    let started = Instant::now();
    pipeline.stop().await;
    let waited = started.elapsed();

    assert!(waited >= h.config.shutdown_grace());
    assert!(waited < h.config.shutdown_grace() + Duration::from_secs(1));
    assert!(!pipeline.is_running());
    assert_eq!(pipeline.backlog(), 1);
}

#[tokio::test(start_paused = true)]
async fn enqueue_does_not_wait_for_transport() {
    let h = Harness::new();
    h.transport.push_hang();
    let pipeline = h.durable();
    pipeline.start().unwrap();

    pipeline.enqueue(record("blocked"));
    assert!(wait_until(|| h.transport.attempt_count() == 1).await);

    let started = std::time::Instant::now();
    for i in 0..100 {
        assert!(pipeline.enqueue(record(&format!("queued-{i}"))));
    }
    assert!(started.elapsed() < std::time::Duration::from_secs(5));
    assert_eq!(pipeline.backlog(), 101);

    pipeline.stop().await;
}

#[test]
fn start_outside_runtime_is_an_error() {
    let h = Harness::new();

    let durable = h.durable();
    assert!(matches!(durable.start(), Err(OutboxError::NoRuntime)));
    assert!(!durable.is_running());

    let volatile = h.volatile();
    assert!(volatile.enqueue(record("buffered")));
    assert!(matches!(volatile.start(), Err(OutboxError::NoRuntime)));
    assert_eq!(volatile.backlog(), 1);
}
