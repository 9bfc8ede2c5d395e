// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

use axum::routing::{get, post};
use axum::{Json, Router};

fn demo_router() -> Router {
    Router::new()
        .route("/ping", get(|| async { Json(serde_json::json!({ "pong": true })) }))
        .route(
            "/echo",
            post(|Json(body): Json<Value>| async move {
                Json(serde_json::json!({ "echo": body }))
            }),
        )
        .route(
            "/fail",
            post(|| async {
                (
                    axum::http::StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({ "error": "nope" })),
                )
            }),
        )
}

/// Serve the router on a Unix socket, the same way the wrapper does.
fn serve_unix(listener: tokio::net::UnixListener, app: Router) {
    tokio::spawn(async move {
        let mut make_svc = app.into_make_service();
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let svc_future = <_ as tower::Service<_>>::call(&mut make_svc, ());
            tokio::spawn(async move {
                let Ok(svc) = svc_future.await;
                let io = hyper_util::rt::TokioIo::new(stream);
                let hyper_svc = hyper_util::service::TowerToHyperService::new(svc);
                let _ = hyper_util::server::conn::auto::Builder::new(
                    hyper_util::rt::TokioExecutor::new(),
                )
                .serve_connection_with_upgrades(io, hyper_svc)
                .await;
            });
        }
    });
}

#[tokio::test]
async fn uds_get_and_post() {
    let tmp = tempfile::TempDir::new().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let socket = tmp.path().join("agent.sock");
    let listener = tokio::net::UnixListener::bind(&socket)
        .unwrap_or_else(|e| panic!("bind: {e}"));
    serve_unix(listener, demo_router());

    // A bogus TCP endpoint proves the socket path was used.
    let peer = PeerAddr::new("http://127.0.0.1:1", Some(socket.display().to_string()));

    let pong = get_json(&peer, "/ping").await.unwrap_or_else(|e| panic!("get: {e}"));
    assert_eq!(pong["pong"], true);

    let echoed = post_json(&peer, "/echo", &serde_json::json!({ "k": "v" }))
        .await
        .unwrap_or_else(|e| panic!("post: {e}"));
    assert_eq!(echoed["echo"]["k"], "v");
}

#[tokio::test]
async fn uds_non_2xx_is_an_error() {
    let tmp = tempfile::TempDir::new().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let socket = tmp.path().join("agent.sock");
    let listener = tokio::net::UnixListener::bind(&socket)
        .unwrap_or_else(|e| panic!("bind: {e}"));
    serve_unix(listener, demo_router());

    let peer = PeerAddr::new("http://127.0.0.1:1", Some(socket.display().to_string()));
    let result = unix_request(
        &socket.display().to_string(),
        "POST",
        "/fail",
        Some(&serde_json::json!({})),
    )
    .await;
    assert!(result.is_err());
    let _ = peer;
}

#[tokio::test]
async fn missing_socket_falls_back_to_tcp() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap_or_else(|e| panic!("bind: {e}"));
    let addr = listener.local_addr().unwrap_or_else(|e| panic!("addr: {e}"));
    tokio::spawn(async move {
        let _ = axum::serve(listener, demo_router()).await;
    });

    let peer = PeerAddr::new(
        format!("http://{addr}"),
        Some("/definitely/not/a/socket.sock".to_owned()),
    );
    let pong = get_json(&peer, "/ping").await.unwrap_or_else(|e| panic!("get: {e}"));
    assert_eq!(pong["pong"], true);
}

#[test]
fn chunked_decoding() {
    let body = "5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n";
    assert_eq!(decode_chunked(body), "hello world");
    assert_eq!(decode_chunked("not chunked"), "");
}
