// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A2A task endpoints.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::a2a::{Message, Task, TaskState};
use crate::error::ErrorCode;
use crate::reply_stack::ReplyTarget;
use crate::task_store::{LookupError, StoreError};
use crate::transport::state::Store;
use crate::transport::{gate, observer};

/// Request body shared by the task creation endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    pub message: Message,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriorityParams {
    #[serde(default)]
    pub priority: Option<i64>,
}

/// 503 with a `Retry-After` hint for the readiness gate.
pub(super) fn not_ready_response(code: ErrorCode) -> Response {
    let (status, body) = code.to_http_response("agent is not ready for input yet");
    (
        status,
        [(header::RETRY_AFTER, gate::RETRY_AFTER_SECS.to_string())],
        body,
    )
        .into_response()
}

/// Map a failed PTY write to a transport error.
pub(super) fn write_error_response(e: crate::controller::ControllerError) -> Response {
    match e {
        crate::controller::ControllerError::NotReady => {
            ErrorCode::NotReady.to_http_response("terminal is not open").into_response()
        }
        other => {
            ErrorCode::Internal.to_http_response(format!("write failed: {other}")).into_response()
        }
    }
}

fn lookup_response(err: LookupError) -> Response {
    match err {
        LookupError::NotFound => {
            ErrorCode::NotFound.to_http_response("no task with that id").into_response()
        }
        LookupError::Ambiguous { matches } => ErrorCode::Ambiguous
            .to_http_response(format!("prefix matched {matches} tasks"))
            .into_response(),
    }
}

/// Record the sender (if any) as the current reply target and remember
/// sender metadata on the task.
fn register_sender(store: &Store, task: &Task) {
    if let Some(sender) = task.sender() {
        store.replies.set(
            &sender.sender_id,
            ReplyTarget {
                sender_endpoint: sender.sender_endpoint,
                sender_task_id: sender.sender_task_id,
                sender_uds_path: sender.sender_uds_path,
            },
        );
    }
}

/// `POST /tasks/create` — reserve a task without touching the PTY.
///
/// Senders call this on themselves to obtain a reply-back id before
/// dispatching to a peer.
pub async fn create_task(
    State(s): State<Arc<Store>>,
    Json(req): Json<TaskRequest>,
) -> impl IntoResponse {
    let task = s.tasks.create(req.message, req.metadata);
    register_sender(&s, &task);
    (StatusCode::OK, Json(task))
}

/// `POST /tasks/send` — create a task and type it into the child.
pub async fn send_task(
    State(s): State<Arc<Store>>,
    Json(req): Json<TaskRequest>,
) -> Response {
    send_inner(s, req, None).await
}

/// `POST /tasks/send-priority?priority=N`
///
/// `priority >= 5` interrupts the child first. A request whose
/// `metadata.in_reply_to` resolves to a local submitted/working task is a
/// reply: it completes that task instead of writing to the PTY.
pub async fn send_priority(
    State(s): State<Arc<Store>>,
    Query(params): Query<PriorityParams>,
    Json(req): Json<TaskRequest>,
) -> Response {
    if let Some(reply_to) = req.metadata.get("in_reply_to").and_then(|v| v.as_str()) {
        match s.tasks.get_by_prefix(reply_to) {
            Ok(original)
                if matches!(original.status, TaskState::Submitted | TaskState::Working) =>
            {
                return complete_with_reply(s, original, req).await;
            }
            // Unknown, terminal, or ambiguous targets degrade to a normal send.
            _ => {}
        }
    }
    send_inner(s, req, params.priority).await
}

async fn send_inner(s: Arc<Store>, req: TaskRequest, priority: Option<i64>) -> Response {
    if let Err(code) = gate::wait_ready(&s.controller).await {
        return not_ready_response(code);
    }

    let task = s.tasks.create(req.message, req.metadata);
    register_sender(&s, &task);

    if priority.unwrap_or(0) >= 5 {
        let _ = s.controller.interrupt();
    }

    let text = render_for_pty(&task);
    if let Err(e) = s.controller.write(&text).await {
        let _ = s.tasks.update_status(&task.id, TaskState::Failed);
        return write_error_response(e);
    }
    let task = match s.tasks.update_status(&task.id, TaskState::Working) {
        Ok(task) => task,
        Err(_) => task,
    };
    s.registry.update_task_preview(&s.settings.agent_id, Some(preview_of(&task)));

    if task.response_expected() {
        observer::spawn_completion_observer(Arc::clone(&s), task.id.clone());
    }

    (StatusCode::OK, Json(task)).into_response()
}

/// Complete `original` with the inbound reply message as its artifact.
async fn complete_with_reply(s: Arc<Store>, original: Task, req: TaskRequest) -> Response {
    let reply_text = req.message.text();
    let (state, error) = crate::output::detect_task_status(&reply_text);

    let _ = s.tasks.add_artifact(&original.id, req.message.parts.clone());
    let task = match s.tasks.update_status(&original.id, state) {
        Ok(task) => task,
        Err(e) => {
            return ErrorCode::BadRequest.to_http_response(e.to_string()).into_response();
        }
    };
    s.controller.mark_done();
    s.registry.update_task_preview(&s.settings.agent_id, None);
    observer::finish_task(&s, &task.id, state, &reply_text, error.as_ref().map(|e| e.code))
        .await;

    (StatusCode::OK, Json(task)).into_response()
}

/// `GET /tasks/{id}` — exact id or unique prefix.
pub async fn get_task(State(s): State<Arc<Store>>, Path(id): Path<String>) -> Response {
    match s.tasks.get_by_prefix(&id) {
        Ok(task) => (StatusCode::OK, Json(task)).into_response(),
        Err(err) => lookup_response(err),
    }
}

/// `POST /tasks/{id}/cancel`
pub async fn cancel_task(State(s): State<Arc<Store>>, Path(id): Path<String>) -> Response {
    let task = match s.tasks.get_by_prefix(&id) {
        Ok(task) => task,
        Err(err) => return lookup_response(err),
    };
    match s.tasks.update_status(&task.id, TaskState::Canceled) {
        Ok(task) => (StatusCode::OK, Json(task)).into_response(),
        Err(StoreError::Frozen { current }) => ErrorCode::BadRequest
            .to_http_response(format!("task is already {current}"))
            .into_response(),
        Err(e) => ErrorCode::Internal.to_http_response(e.to_string()).into_response(),
    }
}

/// Render a task's message for the PTY: text parts verbatim, file parts
/// as path references the CLI can open itself.
fn render_for_pty(task: &Task) -> String {
    let mut out = task.message.text();
    for file in task.message.files() {
        if !out.is_empty() {
            out.push('\n');
        }
        match file.action.as_deref() {
            Some(action) => out.push_str(&format!("[file:{action}] {}", file.path)),
            None => out.push_str(&format!("[file] {}", file.path)),
        }
    }
    out
}

fn preview_of(task: &Task) -> String {
    let text = task.message.text();
    let mut preview: String = text.chars().take(80).collect();
    if text.chars().count() > 80 {
        preview.push('…');
    }
    preview
}

#[cfg(test)]
#[path = "tasks_tests.rs"]
mod tests;
