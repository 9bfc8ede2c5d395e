// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

use axum::routing::get;
use axum::{Json, Router};
use tempfile::TempDir;

async fn card_server(name: &'static str) -> String {
    let app = Router::new().route(
        "/.well-known/agent.json",
        get(move || async move {
            Json(serde_json::json!({
                "name": name,
                "capabilities": { "streaming": false },
            }))
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap_or_else(|e| panic!("bind: {e}"));
    let addr = listener.local_addr().unwrap_or_else(|e| panic!("addr: {e}"));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn discover_stores_card_under_alias() {
    let tmp = TempDir::new().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let registry = ExternalRegistry::with_dir(tmp.path());
    let endpoint = card_server("Remote Helper").await;

    let agent = registry
        .discover(&endpoint, Some("helper"))
        .await
        .unwrap_or_else(|e| panic!("discover: {e}"));
    assert_eq!(agent.alias, "helper");
    assert_eq!(agent.card["name"], "Remote Helper");

    let loaded = registry.get("helper");
    assert_eq!(loaded.map(|a| a.endpoint), Some(endpoint));
    assert_eq!(registry.list().len(), 1);
}

#[tokio::test]
async fn discover_defaults_alias_from_card_name() {
    let tmp = TempDir::new().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let registry = ExternalRegistry::with_dir(tmp.path());
    let endpoint = card_server("Remote Helper").await;

    let agent =
        registry.discover(&endpoint, None).await.unwrap_or_else(|e| panic!("discover: {e}"));
    assert_eq!(agent.alias, "remote-helper");
}

#[tokio::test]
async fn discover_unreachable_peer_fails() {
    let tmp = TempDir::new().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let registry = ExternalRegistry::with_dir(tmp.path());
    assert!(registry.discover("http://127.0.0.1:1", Some("x")).await.is_err());
    assert!(registry.get("x").is_none());
}

#[test]
fn alias_sanitization() {
    assert_eq!(sanitize_alias("Remote Helper"), "remote-helper");
    assert_eq!(sanitize_alias("http://host:1234/"), "http---host-1234");
}
