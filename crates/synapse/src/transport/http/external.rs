// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! External (unmanaged) A2A peer endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::client::{self, PeerAddr};
use crate::error::ErrorCode;
use crate::transport::http::tasks::TaskRequest;
use crate::transport::state::Store;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverRequest {
    pub url: String,
    #[serde(default)]
    pub alias: Option<String>,
}

/// `POST /external/discover`
pub async fn external_discover(
    State(s): State<Arc<Store>>,
    Json(req): Json<DiscoverRequest>,
) -> Response {
    match s.external.discover(&req.url, req.alias.as_deref()).await {
        Ok(agent) => (StatusCode::OK, Json(agent)).into_response(),
        Err(e) => ErrorCode::BadRequest.to_http_response(e.to_string()).into_response(),
    }
}

/// `GET /external/agents`
pub async fn external_list(State(s): State<Arc<Store>>) -> impl IntoResponse {
    Json(serde_json::json!({ "agents": s.external.list() }))
}

/// `POST /external/agents/{alias}/send`
pub async fn external_send(
    State(s): State<Arc<Store>>,
    Path(alias): Path<String>,
    Json(req): Json<TaskRequest>,
) -> Response {
    let Some(agent) = s.external.get(&alias) else {
        return ErrorCode::NotFound
            .to_http_response(format!("no external agent '{alias}'"))
            .into_response();
    };
    let body = serde_json::json!({ "message": req.message, "metadata": req.metadata });
    let peer = PeerAddr::new(agent.endpoint.clone(), None);
    match client::post_json(&peer, "/tasks/send", &body).await {
        Ok(value) => (StatusCode::OK, Json(value)).into_response(),
        Err(e) => ErrorCode::Internal
            .to_http_response(format!("send to {alias} failed: {e}"))
            .into_response(),
    }
}
