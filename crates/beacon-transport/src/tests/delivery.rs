//! Wire contract and classification over real HTTP.

use super::collector::MockCollector;
use crate::{HttpTransport, SendOutcome, Transport};
use beacon_core::{BeaconConfig, EventRecord, Props, SystemInfo};
use serde_json::json;

fn self_hosted(collector: &MockCollector) -> HttpTransport {
    let mut config = BeaconConfig::new("A-SH-abc123");
    config.host = Some(collector.base_url());
    config.request_timeout_secs = 5;
    HttpTransport::try_from_config(&config).unwrap()
}

fn stamped(name: &str) -> EventRecord {
    let mut props = Props::new();
    props.insert("screen".to_string(), json!("settings"));
    let mut record = EventRecord::new(name, Some(props)).unwrap();
    record.stamp("171234567800000042", &SystemInfo::detect("3.1.0", "310", false));
    record
}

#[tokio::test]
async fn posts_event_with_app_key_header() {
    let collector = MockCollector::start().await;
    let transport = self_hosted(&collector);

    let outcome = transport.send(&stamped("screen_view")).await;
    assert_eq!(outcome, SendOutcome::Delivered);

    let requests = collector.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/api/v0/event");
    assert_eq!(
        request.headers.get("app-key").map(String::as_str),
        Some("A-SH-abc123")
    );
    assert!(request
        .headers
        .get("content-type")
        .unwrap()
        .starts_with("application/json"));

    let body = request.json();
    assert_eq!(body["eventName"], json!("screen_view"));
    assert_eq!(body["sessionId"], json!("171234567800000042"));
    assert_eq!(body["props"]["screen"], json!("settings"));
    assert_eq!(body["systemProps"]["appVersion"], json!("3.1.0"));
    assert_eq!(body["systemProps"]["isDebug"], json!(false));
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn client_error_is_rejected() {
    let collector = MockCollector::start().await;
    collector.queue_status(400);
    let transport = self_hosted(&collector);

    let outcome = transport.send(&stamped("bad")).await;
    assert_eq!(outcome, SendOutcome::Rejected { status: 400 });
}

#[tokio::test]
async fn server_error_is_retryable() {
    let collector = MockCollector::start().await;
    collector.queue_status(500);
    collector.queue_status(503);
    let transport = self_hosted(&collector);

    assert!(matches!(
        transport.send(&stamped("a")).await,
        SendOutcome::Retryable { .. }
    ));
    assert!(matches!(
        transport.send(&stamped("a")).await,
        SendOutcome::Retryable { .. }
    ));
    assert_eq!(transport.send(&stamped("a")).await, SendOutcome::Delivered);
    assert_eq!(collector.request_count(), 3);
}

#[tokio::test]
async fn rate_limit_and_timeout_are_retryable() {
    let collector = MockCollector::start().await;
    collector.queue_status(429);
    collector.queue_status(408);
    let transport = self_hosted(&collector);

    for _ in 0..2 {
        assert!(matches!(
            transport.send(&stamped("a")).await,
            SendOutcome::Retryable { .. }
        ));
    }
}

#[tokio::test]
async fn connection_refused_is_retryable() {
    // Bind then release a port so nothing is listening on it.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut config = BeaconConfig::new("A-SH-1");
    config.host = Some(format!("http://{addr}"));
    config.request_timeout_secs = 2;
    let transport = HttpTransport::try_from_config(&config).unwrap();

    assert!(matches!(
        transport.send(&stamped("offline")).await,
        SendOutcome::Retryable { .. }
    ));
}

#[tokio::test]
async fn unknown_region_never_issues_request() {
    let collector = MockCollector::start().await;

    let mut config = BeaconConfig::new("X-ZZ-123");
    config.host = Some(collector.base_url());
    let transport = HttpTransport::from_config(&config);

    assert!(!transport.is_enabled());
    for _ in 0..3 {
        assert_eq!(
            transport.send(&stamped("dropped")).await,
            SendOutcome::Disabled
        );
    }
    assert_eq!(collector.request_count(), 0);
}
