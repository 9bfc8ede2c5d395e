// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Optional API-key authentication.
//!
//! Disabled by default. When `SYNAPSE_AUTH_ENABLED=true`, requests must
//! carry a key from `SYNAPSE_API_KEYS` in the `X-API-Key` header (or
//! `api_key` query parameter). Localhost peers are allow-listed unless
//! `SYNAPSE_ALLOW_LOCALHOST=false`. Keys are compared by SHA-256 digest in
//! constant time.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use ring::digest;

use crate::error::ErrorCode;
use crate::transport::state::Store;
use crate::transport::ErrorResponse;

/// Authentication configuration, resolved once at startup.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub enabled: bool,
    /// SHA-256 digests of accepted keys, hex-encoded.
    pub key_hashes: Vec<String>,
    pub allow_localhost: bool,
}

impl AuthConfig {
    /// Resolve from `SYNAPSE_AUTH_ENABLED` / `SYNAPSE_API_KEYS` /
    /// `SYNAPSE_ALLOW_LOCALHOST`.
    pub fn from_env() -> Self {
        let enabled = std::env::var("SYNAPSE_AUTH_ENABLED")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);
        let key_hashes = std::env::var("SYNAPSE_API_KEYS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(hash_key)
            .collect();
        let allow_localhost = std::env::var("SYNAPSE_ALLOW_LOCALHOST")
            .map(|v| !v.eq_ignore_ascii_case("false"))
            .unwrap_or(true);
        Self { enabled, key_hashes, allow_localhost }
    }

    /// Whether `key` is one of the configured keys.
    pub fn key_valid(&self, key: &str) -> bool {
        let candidate = hash_key(key);
        self.key_hashes.iter().any(|h| constant_time_eq(h, &candidate))
    }
}

/// SHA-256 of a key, hex-encoded.
pub fn hash_key(key: &str) -> String {
    let d = digest::digest(&digest::SHA256, key.as_bytes());
    let mut out = String::with_capacity(64);
    for b in d.as_ref() {
        use std::fmt::Write;
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// Constant-time string comparison to prevent timing side channels.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}

fn is_localhost(addr: Option<&SocketAddr>) -> bool {
    match addr {
        Some(addr) => addr.ip().is_loopback(),
        // UDS connections have no socket address; they are local by nature.
        None => true,
    }
}

/// Axum middleware enforcing API-key auth on all routes except the agent
/// card and `/status` (discovery must work before credentials exist).
pub async fn auth_layer(
    State(state): State<Arc<Store>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let auth = &state.settings.auth;
    if !auth.enabled {
        return next.run(request).await;
    }

    let path = request.uri().path();
    if path == "/.well-known/agent.json" || path == "/status" {
        return next.run(request).await;
    }

    if auth.allow_localhost {
        let peer = request.extensions().get::<ConnectInfo<SocketAddr>>().map(|c| &c.0);
        if is_localhost(peer) {
            return next.run(request).await;
        }
    }

    let header_key = request.headers().get("x-api-key").and_then(|v| v.to_str().ok());
    let query_key = request.uri().query().and_then(|q| {
        q.split('&').find_map(|pair| pair.strip_prefix("api_key="))
    });

    match header_key.or(query_key) {
        Some(key) if auth.key_valid(key) => next.run(request).await,
        Some(_) => unauthorized(ErrorCode::Forbidden, "invalid api key"),
        None => unauthorized(ErrorCode::Unauthorized, "missing api key"),
    }
}

fn unauthorized(code: ErrorCode, message: &str) -> Response {
    let status =
        StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::UNAUTHORIZED);
    (status, axum::Json(ErrorResponse { error: code.to_error_body(message) })).into_response()
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
