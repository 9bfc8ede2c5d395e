// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound A2A transport.
//!
//! Peers advertise both a TCP endpoint and (usually) a Unix socket.
//! Local traffic prefers the socket; TCP is the universal fallback. The
//! UDS path speaks hand-framed HTTP/1.1 — a short request, a
//! Content-Length framed response — which keeps the dependency surface at
//! plain `tokio::net::UnixStream`.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::debug;

/// Default timeout for one outbound request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A resolved peer address: TCP endpoint plus optional UDS path.
#[derive(Debug, Clone)]
pub struct PeerAddr {
    pub endpoint: String,
    pub uds_path: Option<String>,
}

impl PeerAddr {
    pub fn new(endpoint: impl Into<String>, uds_path: Option<String>) -> Self {
        Self { endpoint: endpoint.into(), uds_path }
    }
}

/// POST a JSON body to `path` on the peer, preferring its Unix socket.
pub async fn post_json(peer: &PeerAddr, path: &str, body: &Value) -> anyhow::Result<Value> {
    if let Some(ref uds) = peer.uds_path {
        if Path::new(uds).exists() {
            match unix_request(uds, "POST", path, Some(body)).await {
                Ok(value) => return Ok(value),
                Err(e) => debug!("uds request to {uds} failed ({e}); falling back to tcp"),
            }
        }
    }
    let url = format!("{}{path}", peer.endpoint.trim_end_matches('/'));
    let client = http_client()?;
    let response = client
        .post(&url)
        .json(body)
        .send()
        .await
        .with_context(|| format!("POST {url}"))?;
    let status = response.status();
    let value: Value = response.json().await.unwrap_or(Value::Null);
    if !status.is_success() {
        bail!("POST {url} returned {status}: {value}");
    }
    Ok(value)
}

/// GET a JSON document from the peer, preferring its Unix socket.
pub async fn get_json(peer: &PeerAddr, path: &str) -> anyhow::Result<Value> {
    if let Some(ref uds) = peer.uds_path {
        if Path::new(uds).exists() {
            match unix_request(uds, "GET", path, None).await {
                Ok(value) => return Ok(value),
                Err(e) => debug!("uds request to {uds} failed ({e}); falling back to tcp"),
            }
        }
    }
    let url = format!("{}{path}", peer.endpoint.trim_end_matches('/'));
    let client = http_client()?;
    let response = client.get(&url).send().await.with_context(|| format!("GET {url}"))?;
    let status = response.status();
    if !status.is_success() {
        bail!("GET {url} returned {status}");
    }
    Ok(response.json().await?)
}

fn http_client() -> anyhow::Result<reqwest::Client> {
    let _ = rustls::crypto::ring::default_provider().install_default();
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("build http client")
}

/// One HTTP/1.1 exchange over a Unix socket.
async fn unix_request(
    socket_path: &str,
    method: &str,
    path: &str,
    body: Option<&Value>,
) -> anyhow::Result<Value> {
    let exchange = async {
        let mut stream = UnixStream::connect(socket_path)
            .await
            .with_context(|| format!("connect {socket_path}"))?;

        let payload = body.map(|b| b.to_string()).unwrap_or_default();
        let request = format!(
            "{method} {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{payload}",
            payload.len(),
        );
        stream.write_all(request.as_bytes()).await?;

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await?;
        let response = String::from_utf8_lossy(&raw);

        let status: u16 = response
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .context("malformed status line")?;
        let body = response.split_once("\r\n\r\n").map(|(_, b)| b).unwrap_or("");
        // `Connection: close` framing: the body runs to EOF, but honor a
        // chunked transfer-encoding marker if the server used one.
        let body = if response.to_lowercase().contains("transfer-encoding: chunked") {
            decode_chunked(body)
        } else {
            body.to_owned()
        };
        if !(200..300).contains(&status) {
            bail!("{method} {path} over {socket_path} returned {status}: {body}");
        }
        Ok(serde_json::from_str(&body).unwrap_or(Value::Null))
    };
    tokio::time::timeout(REQUEST_TIMEOUT, exchange)
        .await
        .map_err(|_| anyhow::anyhow!("request timed out"))?
}

/// Minimal chunked-body decoder; tolerant of trailing garbage.
fn decode_chunked(body: &str) -> String {
    let mut out = String::new();
    let mut rest = body;
    loop {
        let Some((size_line, tail)) = rest.split_once("\r\n") else {
            break;
        };
        let Ok(size) = usize::from_str_radix(size_line.trim(), 16) else {
            break;
        };
        if size == 0 || tail.len() < size {
            break;
        }
        out.push_str(&tail[..size]);
        rest = tail[size..].strip_prefix("\r\n").unwrap_or("");
    }
    out
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
