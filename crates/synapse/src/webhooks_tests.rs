// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

use std::sync::{Arc, Mutex as StdMutex};

use axum::extract::State;
use axum::routing::post;
use axum::Router;

fn registry() -> WebhookRegistry {
    WebhookRegistry::new(WebhookConfig {
        timeout: Duration::from_secs(2),
        max_retries: 1,
        default_secret: None,
    })
}

#[test]
fn register_validates_url() {
    let reg = registry();
    assert!(reg.register("http://example.com/hook", vec![], None, HashMap::new()).is_ok());
    assert!(reg.register("not a url", vec![], None, HashMap::new()).is_err());
    assert!(reg.register("file:///etc/passwd", vec![], None, HashMap::new()).is_err());
}

#[test]
fn default_events_applied() {
    let reg = registry();
    let sub = reg
        .register("http://example.com/hook", vec![], None, HashMap::new())
        .unwrap_or_else(|e| panic!("register: {e}"));
    assert_eq!(sub.events, vec!["task.completed", "task.failed"]);
}

#[test]
fn for_event_filters_and_skips_disabled() {
    let reg = registry();
    let _ = reg.register(
        "http://example.com/completed",
        vec!["task.completed".to_owned()],
        None,
        HashMap::new(),
    );
    let _ = reg.register(
        "http://example.com/failed",
        vec!["task.failed".to_owned()],
        None,
        HashMap::new(),
    );

    let hits = reg.for_event("task.completed");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].url, "http://example.com/completed");
    assert!(reg.for_event("task.canceled").is_empty());
}

#[test]
fn unregister_removes() {
    let reg = registry();
    let _ = reg.register("http://example.com/hook", vec![], None, HashMap::new());
    assert!(reg.unregister("http://example.com/hook"));
    assert!(!reg.unregister("http://example.com/hook"));
    assert!(reg.list().is_empty());
}

#[test]
fn signature_matches_reference_vector() {
    // HMAC-SHA256("payload", "secret"), independently computed.
    assert_eq!(
        sign("payload", "secret"),
        "b82fcb791acec57859b989b430a826488ce2e479fdf92326bd0a2e8375a42ba4"
    );
}

#[derive(Clone, Default)]
struct Received {
    inner: Arc<StdMutex<Vec<(String, HashMap<String, String>)>>>,
}

async fn receiver_handler(
    State(received): State<Received>,
    headers: axum::http::HeaderMap,
    body: String,
) -> &'static str {
    let mut map = HashMap::new();
    for (name, value) in headers.iter() {
        if let Ok(v) = value.to_str() {
            map.insert(name.as_str().to_owned(), v.to_owned());
        }
    }
    if let Ok(mut inner) = received.inner.lock() {
        inner.push((body, map));
    }
    "ok"
}

async fn spawn_receiver() -> (Received, String) {
    let received = Received::default();
    let app = Router::new()
        .route("/hook", post(receiver_handler))
        .with_state(received.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap_or_else(|e| panic!("bind: {e}"));
    let addr = listener.local_addr().unwrap_or_else(|e| panic!("addr: {e}"));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (received, format!("http://{addr}/hook"))
}

#[tokio::test]
async fn dispatch_delivers_signed_payload() {
    let (received, url) = spawn_receiver().await;

    let reg = registry();
    let _ = reg.register(
        &url,
        vec!["task.completed".to_owned()],
        Some("s".to_owned()),
        HashMap::new(),
    );

    let deliveries =
        reg.dispatch("task.completed", serde_json::json!({ "task_id": "t1" })).await;
    assert_eq!(deliveries.len(), 1);
    assert!(deliveries[0].success, "delivery failed: {:?}", deliveries[0].error);
    assert_eq!(deliveries[0].status_code, Some(200));
    assert_eq!(deliveries[0].attempts, 1);

    let hits = received.inner.lock().map(|v| v.clone()).unwrap_or_default();
    assert_eq!(hits.len(), 1);
    let (body, headers) = &hits[0];

    // Envelope shape.
    let envelope: serde_json::Value = serde_json::from_str(body).unwrap_or_default();
    assert_eq!(envelope["event"], "task.completed");
    assert_eq!(envelope["data"]["task_id"], "t1");
    assert_eq!(envelope["event_id"].as_str().map(str::len), Some(36));

    // Signed exactly over the body the receiver saw.
    assert_eq!(headers.get("x-synapse-event").map(String::as_str), Some("task.completed"));
    let expected = format!("sha256={}", sign(body, "s"));
    assert_eq!(headers.get("x-synapse-signature"), Some(&expected));
    assert!(headers.contains_key("x-synapse-event-id"));
    assert!(headers.contains_key("x-synapse-timestamp"));
}

#[tokio::test]
async fn dispatch_records_failures_without_aborting_others() {
    let (received, good_url) = spawn_receiver().await;

    let reg = registry();
    let _ = reg.register(&good_url, vec!["task.failed".to_owned()], None, HashMap::new());
    // A closed port: connection refused, retried then recorded as failure.
    let _ = reg.register(
        "http://127.0.0.1:1/hook",
        vec!["task.failed".to_owned()],
        None,
        HashMap::new(),
    );

    let deliveries = reg.dispatch("task.failed", serde_json::json!({ "task_id": "t2" })).await;
    assert_eq!(deliveries.len(), 2);
    let successes = deliveries.iter().filter(|d| d.success).count();
    assert_eq!(successes, 1);
    let hits = received.inner.lock().map(|v| v.len()).unwrap_or_default();
    assert_eq!(hits, 1);

    // Both outcomes are in the audit ring.
    assert_eq!(reg.recent_deliveries(10).len(), 2);
}

#[tokio::test]
async fn dispatch_without_subscribers_is_a_noop() {
    let reg = registry();
    let deliveries = reg.dispatch("task.completed", serde_json::json!({})).await;
    assert!(deliveries.is_empty());
}

#[test]
fn delivery_ring_is_bounded() {
    let reg = registry();
    for i in 0..150 {
        reg.record_delivery(WebhookDelivery {
            webhook_url: format!("http://example.com/{i}"),
            event: "task.completed".to_owned(),
            status_code: Some(200),
            response_body: None,
            error: None,
            attempts: 1,
            delivered_at: None,
            success: true,
        });
    }
    let recent = reg.recent_deliveries(200);
    assert_eq!(recent.len(), 100);
    // Oldest entries were dropped.
    assert_eq!(recent[0].webhook_url, "http://example.com/50");
}
