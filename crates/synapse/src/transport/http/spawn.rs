// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sibling-agent spawn endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;
use crate::spawn::{self, SpawnRequest};
use crate::transport::state::Store;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamStartRequest {
    pub members: Vec<SpawnRequest>,
}

/// `POST /spawn`
pub async fn spawn_agent(
    State(s): State<Arc<Store>>,
    Json(req): Json<SpawnRequest>,
) -> Response {
    match spawn::spawn_agent(&s.registry, &req).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => ErrorCode::Internal.to_http_response(e.to_string()).into_response(),
    }
}

/// `POST /team/start`
pub async fn team_start(
    State(s): State<Arc<Store>>,
    Json(req): Json<TeamStartRequest>,
) -> Response {
    if req.members.is_empty() {
        return ErrorCode::BadRequest.to_http_response("team has no members").into_response();
    }
    if let Some(member) = req.members.first() {
        let capacity = spawn::band_capacity(&member.profile);
        if req.members.len() > capacity {
            return ErrorCode::BadRequest
                .to_http_response(format!(
                    "team of {} exceeds the {} port slots for '{}'",
                    req.members.len(),
                    capacity,
                    member.profile
                ))
                .into_response();
        }
    }

    let results = spawn::spawn_team(&s.registry, &req.members).await;
    let body: Vec<serde_json::Value> = results
        .into_iter()
        .map(|r| match r {
            Ok(result) => serde_json::json!({ "ok": true, "agent": result }),
            Err(e) => serde_json::json!({ "ok": false, "error": e }),
        })
        .collect();
    (StatusCode::OK, Json(serde_json::json!({ "results": body }))).into_response()
}
