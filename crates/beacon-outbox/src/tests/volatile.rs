//! In-memory pipeline.

use super::harness::{record, wait_until, Harness};
use crate::EventPipeline;
use beacon_transport::SendOutcome;

#[tokio::test(start_paused = true)]
async fn buffers_until_started() {
    let h = Harness::new();
    let pipeline = h.volatile();

    for name in ["a", "b", "c"] {
        assert!(pipeline.enqueue(record(name)));
    }
    assert_eq!(pipeline.backlog(), 3);
    assert_eq!(h.transport.attempt_count(), 0);

    pipeline.start().unwrap();
    assert!(wait_until(|| pipeline.backlog() == 0).await);
    assert_eq!(h.transport.delivered_names(), vec!["a", "b", "c"]);

    pipeline.stop().await;
}

#[tokio::test(start_paused = true)]
async fn transient_failure_is_not_retried() {
    let h = Harness::new();
    h.transport.push_retryable(1);
    let pipeline = h.volatile();
    pipeline.start().unwrap();

    pipeline.enqueue(record("lost"));
    pipeline.enqueue(record("kept"));

    assert!(wait_until(|| pipeline.backlog() == 0).await);
    tokio::time::sleep(h.config.retry_interval() * 2).await;
    assert_eq!(h.transport.attempt_names(), vec!["lost", "kept"]);
    assert_eq!(h.transport.delivered_names(), vec!["kept"]);

    pipeline.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stop_drains_buffered_records() {
    let h = Harness::new();
    let pipeline = h.volatile();
    pipeline.start().unwrap();

    for name in ["x", "y", "z"] {
        pipeline.enqueue(record(name));
    }
    pipeline.stop().await;

    assert_eq!(h.transport.delivered_names(), vec!["x", "y", "z"]);
    assert!(!pipeline.is_running());
    assert_eq!(pipeline.backlog(), 0);
}

#[tokio::test(start_paused = true)]
async fn stopped_pipeline_drops_until_restarted() {
    let h = Harness::new();
    let pipeline = h.volatile();
    pipeline.start().unwrap();
    pipeline.stop().await;

    assert!(!pipeline.enqueue(record("dropped")));

    pipeline.start().unwrap();
    assert!(pipeline.enqueue(record("accepted")));
    assert!(wait_until(|| h.transport.delivered_names() == vec!["accepted"]).await);

    pipeline.stop().await;
}

#[tokio::test(start_paused = true)]
async fn rejected_and_disabled_are_logged_and_dropped() {
    let h = Harness::new();
    h.transport.push(SendOutcome::Rejected { status: 422 });
    h.transport.push(SendOutcome::Disabled);
    let pipeline = h.volatile();
    pipeline.start().unwrap();

    pipeline.enqueue(record("r"));
    pipeline.enqueue(record("d"));
    assert!(wait_until(|| pipeline.backlog() == 0).await);
    assert_eq!(h.transport.attempt_names(), vec!["r", "d"]);
    assert!(h.transport.delivered_names().is_empty());

    pipeline.stop().await;
}

#[tokio::test(start_paused = true)]
async fn aborted_consumer_clears_backlog() {
    let h = Harness::new();
    h.transport.push_hang();
    let pipeline = h.volatile();
    pipeline.start().unwrap();

    for name in ["hung", "queued-1", "queued-2"] {
        pipeline.enqueue(record(name));
    }
    assert!(wait_until(|| h.transport.attempt_count() == 1).await);
    assert_eq!(pipeline.backlog(), 3);

    pipeline.stop().await;
    assert!(!pipeline.is_running());
    assert_eq!(pipeline.backlog(), 0);

    pipeline.start().unwrap();
    assert!(pipeline.enqueue(record("later")));
    assert!(wait_until(|| pipeline.backlog() == 0).await);
    assert_eq!(h.transport.delivered_names(), vec!["later"]);

    pipeline.stop().await;
}
