use std::time::Duration;

use serde_json::json;

use super::*;

fn fetcher(origin: MockOrigin, max_retries: u32) -> ResilientFetcher<MockOrigin> {
    ResilientFetcher::new(
        origin,
        Duration::from_millis(5_000),
        max_retries,
        Duration::from_millis(1_000),
    )
}

#[tokio::test(start_paused = true)]
async fn test_success_first_attempt() {
    let origin = MockOrigin::new();
    origin.push_success_json(json!({"x": 1}), 200);

    let result = fetcher(origin.clone(), 2)
        .fetch("https://example.com/a")
        .await
        .expect("fetch should succeed");

    assert_eq!(result.status, 200);
    assert_eq!(result.payload, Payload::Structured(json!({"x": 1})));
    assert_eq!(origin.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_retries_server_errors_then_succeeds() {
    let origin = MockOrigin::new();
    origin.push_status(503);
    origin.push_status(503);
    origin.push_success_json(json!({"x": 1}), 200);

    let start = tokio::time::Instant::now();
    let result = fetcher(origin.clone(), 2)
        .fetch("https://example.com/a")
        .await
        .expect("fetch should succeed after retries");

    assert_eq!(result.payload, Payload::Structured(json!({"x": 1})));
    assert_eq!(origin.calls(), 3);
    // Backoff waits: 1000ms * 2^0 + 1000ms * 2^1.
    assert!(start.elapsed() >= Duration::from_millis(3_000));
}

#[tokio::test(start_paused = true)]
async fn test_exhausts_retries_on_server_error() {
    let origin = MockOrigin::new();
    origin.push_status(502);
    origin.push_status(503);
    origin.push_status(500);

    let err = fetcher(origin.clone(), 2)
        .fetch("https://example.com/a")
        .await
        .expect_err("fetch should fail");

    assert_eq!(
        err,
        FetchError::UpstreamStatus {
            status: 500,
            attempts: 3
        }
    );
    assert!(!err.is_timeout());
    assert_eq!(origin.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_client_error_is_not_retried() {
    let origin = MockOrigin::new();
    origin.push_status(404);

    let err = fetcher(origin.clone(), 5)
        .fetch("https://example.com/a")
        .await
        .expect_err("fetch should fail");

    assert_eq!(
        err,
        FetchError::UpstreamStatus {
            status: 404,
            attempts: 1
        }
    );
    assert_eq!(origin.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_exhaustion_is_distinguishable() {
    let origin = MockOrigin::new();
    origin.push(MockAttempt::Hang);
    origin.push(MockAttempt::Hang);

    let err = fetcher(origin.clone(), 1)
        .fetch("https://example.com/a")
        .await
        .expect_err("fetch should time out");

    assert_eq!(err, FetchError::Timeout { attempts: 2 });
    assert!(err.is_timeout());
    assert_eq!(origin.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_slow_attempt_is_cancelled_and_retried() {
    let origin = MockOrigin::new();
    origin.push(MockAttempt::Delayed(
        Duration::from_millis(10_000),
        Box::new(MockAttempt::Status(500)),
    ));
    origin.push_success_text("late but fine", 200);

    let result = fetcher(origin.clone(), 1)
        .fetch("https://example.com/a")
        .await
        .expect("second attempt should succeed");

    assert_eq!(result.payload, Payload::Raw("late but fine".to_string()));
    assert_eq!(origin.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_transport_failure_is_retried() {
    let origin = MockOrigin::new();
    origin.push_transport_failure("connection reset");
    origin.push_success_text("ok", 200);

    let result = fetcher(origin.clone(), 1)
        .fetch("https://example.com/a")
        .await
        .expect("fetch should succeed on retry");

    assert_eq!(result.status, 200);
    assert_eq!(origin.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_transport_exhaustion_keeps_reason() {
    let origin = MockOrigin::new();
    origin.push_transport_failure("connection refused");
    origin.push_transport_failure("connection refused");

    let err = fetcher(origin.clone(), 1)
        .fetch("https://example.com/a")
        .await
        .expect_err("fetch should fail");

    match err {
        FetchError::Transport { reason, attempts } => {
            assert_eq!(reason, "connection refused");
            assert_eq!(attempts, 2);
        }
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_zero_retries_single_attempt() {
    let origin = MockOrigin::new();
    origin.push_status(503);

    let err = fetcher(origin.clone(), 0)
        .fetch("https://example.com/a")
        .await
        .expect_err("fetch should fail");

    assert_eq!(err.attempts(), 1);
    assert_eq!(origin.calls(), 1);
}

#[test]
fn test_payload_into_json() {
    assert_eq!(
        Payload::Structured(json!({"a": true})).into_json(),
        json!({"a": true})
    );
    assert_eq!(
        Payload::Raw("plain".to_string()).into_json(),
        json!("plain")
    );
}

#[test]
fn test_payload_classification() {
    assert!(Payload::Structured(json!({"a": 1})).is_structured());
    assert!(!Payload::Raw("<html></html>".to_string()).is_structured());
}

#[test]
fn test_payload_roundtrips_through_serde() {
    let structured = Payload::Structured(json!({"a": [1, 2]}));
    let bytes = serde_json::to_vec(&structured).expect("serialize");
    let back: Payload = serde_json::from_slice(&bytes).expect("deserialize");
    assert_eq!(back, structured);

    let raw = Payload::Raw("<html></html>".to_string());
    let bytes = serde_json::to_vec(&raw).expect("serialize");
    let back: Payload = serde_json::from_slice(&bytes).expect("deserialize");
    assert_eq!(back, raw);
}

#[test]
fn test_attempt_error_classification() {
    assert!(AttemptError::Status(500).is_retryable());
    assert!(AttemptError::Status(503).is_retryable());
    assert!(!AttemptError::Status(404).is_retryable());
    assert!(!AttemptError::Status(400).is_retryable());
    assert!(AttemptError::TimedOut.is_retryable());
    assert!(AttemptError::Transport("reset".to_string()).is_retryable());
}
