//! Replay after restart and tolerance of damaged log content.

use super::harness::{record, wait_until, Harness};
use crate::log::LOG_FILE_NAME;
use crate::EventPipeline;
use std::fs;

#[tokio::test(start_paused = true)]
async fn unresolved_records_replay_once_in_order() {
    let h = Harness::new();

    {
        let pipeline = h.durable();
        for name in ["a", "b", "c"] {
            pipeline.enqueue(record(name));
        }

        // "a" is delivered, "b" never completes: the process "dies" mid-send.
        h.transport.push(beacon_transport::SendOutcome::Delivered);
        h.transport.push_hang();
        pipeline.start().unwrap();
        assert!(wait_until(|| h.transport.attempt_count() == 2).await);

        pipeline.stop().await;
        assert!(!pipeline.is_running());
        assert_eq!(pipeline.backlog(), 2);
    }

    let pipeline = h.durable();
    assert_eq!(pipeline.backlog(), 2);
    pipeline.start().unwrap();

    assert!(wait_until(|| pipeline.backlog() == 0).await);
    assert_eq!(h.transport.delivered_names(), vec!["a", "b", "c"]);
    assert_eq!(h.transport.attempt_names(), vec!["a", "b", "b", "c"]);

    pipeline.stop().await;
}

#[tokio::test(start_paused = true)]
async fn records_queued_before_start_survive_reopen() {
    let h = Harness::new();
    {
        let pipeline = h.durable();
        for name in ["one", "two", "three"] {
            assert!(pipeline.enqueue(record(name)));
        }
    }

    let pipeline = h.durable();
    assert_eq!(pipeline.backlog(), 3);
    pipeline.start().unwrap();

    assert!(wait_until(|| pipeline.backlog() == 0).await);
    assert_eq!(h.transport.delivered_names(), vec!["one", "two", "three"]);

    pipeline.stop().await;
}

#[tokio::test(start_paused = true)]
async fn corrupt_record_is_skipped() {
    let h = Harness::new();
    let dir = h.log_dir();
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join(LOG_FILE_NAME),
        format!(
            "{}\n%%%DELETE%%%\n{{\"eventName\":\"\"}}\n{}\n",
            record("before").to_json_line().unwrap(),
            record("after").to_json_line().unwrap()
        ),
    )
    .unwrap();

    let pipeline = h.durable();
    assert_eq!(pipeline.backlog(), 4);
    pipeline.start().unwrap();

    assert!(wait_until(|| pipeline.backlog() == 0).await);
    assert_eq!(h.transport.attempt_names(), vec!["before", "after"]);

    pipeline.stop().await;
}

#[tokio::test(start_paused = true)]
async fn torn_tail_from_crash_is_skipped() {
    let h = Harness::new();
    let dir = h.log_dir();
    fs::create_dir_all(&dir).unwrap();
    let full = record("complete").to_json_line().unwrap();
    let torn = record("torn").to_json_line().unwrap();
    fs::write(
        dir.join(LOG_FILE_NAME),
        format!("{full}\n{}", &torn[..torn.len() / 2]),
    )
    .unwrap();

    let pipeline = h.durable();
    pipeline.enqueue(record("next"));
    pipeline.start().unwrap();

    assert!(wait_until(|| pipeline.backlog() == 0).await);
    assert_eq!(h.transport.attempt_names(), vec!["complete", "next"]);

    pipeline.stop().await;
}

#[tokio::test(start_paused = true)]
async fn drained_log_is_compacted() {
    let h = Harness::new();
    let pipeline = h.durable();
    for name in ["a", "b"] {
        pipeline.enqueue(record(name));
    }
    pipeline.start().unwrap();

    assert!(pipeline.wait_until_drained(std::time::Duration::from_secs(10)).await);
    assert_eq!(fs::metadata(pipeline.log().path()).unwrap().len(), 0);
    assert_eq!(pipeline.log().cursor(), 0);

    pipeline.enqueue(record("c"));
    assert!(wait_until(|| h.transport.delivered_names().len() == 3).await);
    assert_eq!(h.transport.delivered_names(), vec!["a", "b", "c"]);

    pipeline.stop().await;
}

#[tokio::test(start_paused = true)]
async fn failed_cursor_write_during_compaction_loses_nothing() {
    let h = Harness::new();
    let pipeline = h.durable();

    let blocker = h.log_dir().join("cursor.tmp");
    fs::create_dir_all(&blocker).unwrap();

    pipeline.start().unwrap();
    pipeline.enqueue(record("a"));
    assert!(wait_until(|| h.transport.delivered_names() == ["a"]).await);
    assert!(wait_until(|| pipeline.backlog() == 0).await);

    fs::remove_dir(&blocker).unwrap();
    pipeline.enqueue(record("b"));
    pipeline.enqueue(record("c"));

    assert!(wait_until(|| pipeline.backlog() == 0).await);
    assert_eq!(h.transport.delivered_names(), vec!["a", "b", "c"]);

    pipeline.stop().await;
}
