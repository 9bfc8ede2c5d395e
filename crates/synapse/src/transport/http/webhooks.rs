// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook CRUD and delivery audit endpoints.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;
use crate::transport::state::Store;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookRegisterRequest {
    pub url: String,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveriesParams {
    #[serde(default = "default_deliveries_limit")]
    pub limit: usize,
}

fn default_deliveries_limit() -> usize {
    20
}

/// `POST /webhooks`
pub async fn webhook_register(
    State(s): State<Arc<Store>>,
    Json(req): Json<WebhookRegisterRequest>,
) -> Response {
    match s.webhooks.register(&req.url, req.events, req.secret, req.metadata) {
        Ok(sub) => (StatusCode::OK, Json(sub)).into_response(),
        Err(e) => ErrorCode::BadRequest.to_http_response(e.to_string()).into_response(),
    }
}

/// `DELETE /webhooks/{url}` — the URL arrives percent-encoded.
pub async fn webhook_unregister(State(s): State<Arc<Store>>, Path(url): Path<String>) -> Response {
    if s.webhooks.unregister(&url) {
        (StatusCode::OK, Json(serde_json::json!({ "removed": url }))).into_response()
    } else {
        ErrorCode::NotFound.to_http_response("no webhook with that URL").into_response()
    }
}

/// `GET /webhooks`
pub async fn webhook_list(State(s): State<Arc<Store>>) -> impl IntoResponse {
    Json(serde_json::json!({ "webhooks": s.webhooks.list() }))
}

/// `GET /webhooks/deliveries`
pub async fn webhook_deliveries(
    State(s): State<Arc<Store>>,
    Query(params): Query<DeliveriesParams>,
) -> impl IntoResponse {
    Json(serde_json::json!({ "deliveries": s.webhooks.recent_deliveries(params.limit) }))
}
