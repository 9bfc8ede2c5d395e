// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared task board endpoints.
//!
//! Board operations hit SQLite, so each handler hops to a blocking thread
//! rather than holding the connection across awaits. Board endpoints are
//! not gated on readiness — coordination must work while agents start up.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::board::TaskBoard;
use crate::error::ErrorCode;
use crate::transport::state::Store;

#[derive(Debug, Clone, Deserialize)]
pub struct BoardListParams {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardCreateRequest {
    pub subject: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub blocked_by: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardAgentRequest {
    #[serde(default)]
    pub agent_id: Option<String>,
}

async fn on_board<T, F>(board: Arc<TaskBoard>, op: F) -> Result<T, Response>
where
    T: Send + 'static,
    F: FnOnce(&TaskBoard) -> anyhow::Result<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(move || op(&board)).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            Err(ErrorCode::Internal.to_http_response(format!("board error: {e}")).into_response())
        }
        Err(e) => {
            Err(ErrorCode::Internal.to_http_response(format!("board task panicked: {e}")).into_response())
        }
    }
}

/// `GET /tasks/board`
pub async fn board_list(
    State(s): State<Arc<Store>>,
    Query(params): Query<BoardListParams>,
) -> Response {
    let result = on_board(Arc::clone(&s.board), move |b| {
        b.list(params.status.as_deref(), params.assignee.as_deref())
    })
    .await;
    match result {
        Ok(tasks) => (StatusCode::OK, Json(serde_json::json!({ "tasks": tasks }))).into_response(),
        Err(response) => response,
    }
}

/// `GET /tasks/board/available`
pub async fn board_available(State(s): State<Arc<Store>>) -> Response {
    match on_board(Arc::clone(&s.board), |b| b.available()).await {
        Ok(tasks) => (StatusCode::OK, Json(serde_json::json!({ "tasks": tasks }))).into_response(),
        Err(response) => response,
    }
}

/// `POST /tasks/board`
pub async fn board_create(
    State(s): State<Arc<Store>>,
    Json(req): Json<BoardCreateRequest>,
) -> Response {
    if req.subject.trim().is_empty() {
        return ErrorCode::BadRequest.to_http_response("subject must not be empty").into_response();
    }
    let created_by = req.created_by.clone().unwrap_or_else(|| s.settings.agent_id.clone());
    let result = on_board(Arc::clone(&s.board), move |b| {
        b.create(&req.subject, &req.description, &created_by, &req.blocked_by)
    })
    .await;
    match result {
        Ok(id) => (StatusCode::OK, Json(serde_json::json!({ "id": id }))).into_response(),
        Err(response) => response,
    }
}

/// `POST /tasks/board/{id}/claim`
pub async fn board_claim(
    State(s): State<Arc<Store>>,
    Path(id): Path<String>,
    Json(req): Json<BoardAgentRequest>,
) -> Response {
    let agent_id = req.agent_id.unwrap_or_else(|| s.settings.agent_id.clone());
    let result = on_board(Arc::clone(&s.board), {
        let id = id.clone();
        let agent_id = agent_id.clone();
        move |b| b.claim(&id, &agent_id)
    })
    .await;
    match result {
        Ok(claimed) => (
            StatusCode::OK,
            Json(serde_json::json!({ "claimed": claimed, "id": id, "assignee": agent_id })),
        )
            .into_response(),
        Err(response) => response,
    }
}

/// `POST /tasks/board/{id}/complete`
pub async fn board_complete(
    State(s): State<Arc<Store>>,
    Path(id): Path<String>,
    Json(req): Json<BoardAgentRequest>,
) -> Response {
    let agent_id = req.agent_id.unwrap_or_else(|| s.settings.agent_id.clone());
    let result = on_board(Arc::clone(&s.board), {
        let id = id.clone();
        move |b| b.complete(&id, &agent_id)
    })
    .await;
    match result {
        Ok(unblocked) => (
            StatusCode::OK,
            Json(serde_json::json!({ "id": id, "unblocked": unblocked })),
        )
            .into_response(),
        Err(response) => response,
    }
}
