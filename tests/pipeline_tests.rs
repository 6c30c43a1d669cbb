//! End-to-end pipeline tests: router, proxy core, coalescer, fetcher, and
//! both cache tiers wired together with a scripted upstream.

use std::sync::Arc;
use std::time::Duration;

use axum::{Router, body::Body, http::Request, http::StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use relay::cache::remote::MockRemoteStore;
use relay::cache::{LocalCacheHandle, RELAY_STATUS_HEADER, TieredCache};
use relay::gateway::{HandlerState, create_router_with_state};
use relay::metrics::Metrics;
use relay::proxy::ProxyCore;
use relay::upstream::{MockAttempt, MockOrigin, ResilientFetcher};

const TARGET: &str = "https://upstream.example.com/resource";

fn build_stack(
    max_retries: u32,
    backoff_base: Duration,
) -> (Router, MockOrigin, MockRemoteStore, Arc<ProxyCore<MockRemoteStore, MockOrigin>>) {
    let origin = MockOrigin::new();
    let remote = MockRemoteStore::new();
    let cache = TieredCache::new(
        remote.clone(),
        LocalCacheHandle::new(100),
        Duration::from_secs(60),
        Duration::from_secs(300),
    );
    let fetcher = ResilientFetcher::new(
        origin.clone(),
        Duration::from_millis(5_000),
        max_retries,
        backoff_base,
    );
    let core = Arc::new(ProxyCore::new(cache, fetcher, Arc::new(Metrics::new())));
    let router = create_router_with_state(HandlerState::new(Arc::clone(&core)));
    (router, origin, remote, core)
}

async fn get_json(router: Router, uri: &str) -> (StatusCode, String, Value) {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request builds");
    let response = router.oneshot(request).await.expect("router responds");
    let status = response.status();
    let relay_status = response
        .headers()
        .get(RELAY_STATUS_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, relay_status, body)
}

#[tokio::test]
async fn test_fetch_then_hit_lifecycle() {
    let (router, origin, remote, _) = build_stack(2, Duration::from_millis(1));
    origin.push_success_json(json!({"data": "payload"}), 200);

    let uri = format!("/proxy?url={TARGET}");

    let (status, relay_status, body) = get_json(router.clone(), &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(relay_status, "fetched");
    assert_eq!(body, json!({"data": "payload"}));

    let (status, relay_status, body) = get_json(router.clone(), &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(relay_status, "hit-remote");
    assert_eq!(body, json!({"data": "payload"}));

    // Remote tier knocked out: the local tier answers.
    remote.set_failing(true);
    let (status, relay_status, body) = get_json(router, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(relay_status, "hit-local");
    assert_eq!(body, json!({"data": "payload"}));

    assert_eq!(origin.calls(), 1, "only the first request reached upstream");
}

#[tokio::test(start_paused = true)]
async fn test_transient_outage_recovers_with_backoff() {
    let (router, origin, _, core) = build_stack(2, Duration::from_millis(1_000));
    origin.push_status(503);
    origin.push_status(503);
    origin.push_success_json(json!({"ok": true}), 200);

    let started = tokio::time::Instant::now();
    let (status, relay_status, body) =
        get_json(router, &format!("/proxy?url={TARGET}")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(relay_status, "fetched");
    assert_eq!(body, json!({"ok": true}));
    assert_eq!(origin.calls(), 3);
    // Backoff schedule: 1s before attempt 2, 2s before attempt 3.
    assert!(started.elapsed() >= Duration::from_millis(3_000));

    let snapshot = core.metrics().snapshot();
    assert_eq!(snapshot.misses, 1);
    assert_eq!(snapshot.errors, 0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_requests_coalesce_onto_one_fetch() {
    let (router, origin, _, core) = build_stack(0, Duration::from_millis(1));
    origin.push(MockAttempt::Delayed(
        Duration::from_millis(200),
        Box::new(MockAttempt::Success(relay::upstream::FetchSuccess {
            payload: relay::upstream::Payload::Structured(json!({"shared": true})),
            status: 200,
        })),
    ));

    let uri = format!("/proxy?url={TARGET}");
    let (a, b) = tokio::join!(
        get_json(router.clone(), &uri),
        get_json(router.clone(), &uri)
    );

    assert_eq!(a.0, StatusCode::OK);
    assert_eq!(b.0, StatusCode::OK);
    assert_eq!(a.2, b.2);
    assert_eq!(origin.calls(), 1, "concurrent misses must share one fetch");
    assert_eq!(core.metrics().snapshot().misses, 2);

    // A request arriving after the flight settled is a plain cache hit.
    let (_, relay_status, _) = get_json(router, &uri).await;
    assert_eq!(relay_status, "hit-remote");
}

#[tokio::test]
async fn test_failure_fans_out_without_polluting_cache() {
    let (router, origin, remote, _) = build_stack(0, Duration::from_millis(1));
    origin.push(MockAttempt::Delayed(
        Duration::from_millis(50),
        Box::new(MockAttempt::Status(404)),
    ));
    origin.push_success_json(json!({"fresh": true}), 200);

    let uri = format!("/proxy?url={TARGET}");
    let (a, b) = tokio::join!(
        get_json(router.clone(), &uri),
        get_json(router.clone(), &uri)
    );

    assert_eq!(a.0, StatusCode::BAD_GATEWAY);
    assert_eq!(b.0, StatusCode::BAD_GATEWAY);
    assert_eq!(origin.calls(), 1);
    assert!(remote.is_empty(), "failures must not populate any tier");

    // The failed flight left no residue; the next request fetches fresh.
    let (status, relay_status, body) = get_json(router, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(relay_status, "fetched");
    assert_eq!(body, json!({"fresh": true}));
}

#[tokio::test]
async fn test_distinct_urls_do_not_coalesce() {
    let (router, origin, _, _) = build_stack(0, Duration::from_millis(1));
    origin.push_success_text("one", 200);
    origin.push_success_text("two", 200);

    let (a, b) = tokio::join!(
        get_json(
            router.clone(),
            "/proxy?url=https%3A%2F%2Fupstream.example.com%2Fone"
        ),
        get_json(
            router.clone(),
            "/proxy?url=https%3A%2F%2Fupstream.example.com%2Ftwo"
        )
    );

    assert_eq!(a.0, StatusCode::OK);
    assert_eq!(b.0, StatusCode::OK);
    assert_eq!(origin.calls(), 2);
}

#[tokio::test]
async fn test_scheme_less_and_explicit_urls_share_one_entry() {
    let (router, origin, _, _) = build_stack(0, Duration::from_millis(1));
    origin.push_success_json(json!({"v": 1}), 200);

    let (_, first, _) = get_json(
        router.clone(),
        "/proxy?url=upstream.example.com%2Fresource",
    )
    .await;
    assert_eq!(first, "fetched");

    let (_, second, _) = get_json(router, &format!("/proxy?url={TARGET}")).await;
    assert_eq!(second, "hit-remote");
    assert_eq!(origin.calls(), 1);
}

#[tokio::test]
async fn test_metrics_across_full_lifecycle() {
    let (router, origin, _, core) = build_stack(0, Duration::from_millis(1));
    origin.push_success_json(json!({"v": 1}), 200);
    origin.push_status(404);

    let uri = format!("/proxy?url={TARGET}");
    get_json(router.clone(), &uri).await; // miss + fetch
    get_json(router.clone(), &uri).await; // remote hit
    get_json(
        router.clone(),
        "/proxy?url=https%3A%2F%2Fupstream.example.com%2Fmissing",
    )
    .await; // miss + 404

    let snapshot = core.metrics().snapshot();
    assert_eq!(snapshot.misses, 2);
    assert_eq!(snapshot.hits, 1);
    assert_eq!(snapshot.hits_remote, 1);
    assert_eq!(snapshot.errors, 1);
    assert!((snapshot.hit_ratio - 1.0 / 3.0).abs() < 1e-9);
}
