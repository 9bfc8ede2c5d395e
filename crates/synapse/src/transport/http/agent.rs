// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent card, status, and the legacy `/message` endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::a2a::{AgentCapabilities, AgentCard, Message, TaskState};
use crate::transport::gate;
use crate::transport::state::Store;

/// `GET /.well-known/agent.json`
pub async fn agent_card(State(s): State<Arc<Store>>) -> impl IntoResponse {
    let settings = &s.settings;
    Json(AgentCard {
        name: settings.name.clone().unwrap_or_else(|| settings.agent_id.clone()),
        description: format!(
            "Synapse A2A wrapper around a {} CLI agent",
            settings.agent_type
        ),
        url: settings.endpoint.clone(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
        agent_id: settings.agent_id.clone(),
        agent_type: settings.agent_type.clone(),
        role: settings.role.clone(),
        capabilities: AgentCapabilities { streaming: false, push_notifications: true },
        default_input_modes: vec!["text".to_owned()],
        default_output_modes: vec!["text".to_owned()],
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    /// Trailing rendered screen content (≤ 2 KB).
    pub context: String,
}

/// `GET /status`
pub async fn status(State(s): State<Arc<Store>>) -> impl IntoResponse {
    Json(StatusResponse {
        status: s.controller.status().as_str().to_owned(),
        context: s.controller.rendered_context(),
    })
}

/// Body of the deprecated `/message` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyMessageRequest {
    pub priority: i64,
    pub content: String,
}

/// `POST /message` — deprecated Synapse-original API.
///
/// Creates an A2A task internally so legacy senders still get tracked
/// task ids.
pub async fn legacy_message(
    State(s): State<Arc<Store>>,
    Json(req): Json<LegacyMessageRequest>,
) -> impl IntoResponse {
    if let Err(code) = gate::wait_ready(&s.controller).await {
        return super::tasks::not_ready_response(code).into_response();
    }

    let task = s.tasks.create(Message::user_text(&req.content), Default::default());

    if req.priority >= 5 {
        let _ = s.controller.interrupt();
    }
    let _ = s.tasks.update_status(&task.id, TaskState::Working);
    if let Err(e) = s.controller.write(&req.content).await {
        let _ = s.tasks.update_status(&task.id, TaskState::Failed);
        return super::tasks::write_error_response(e).into_response();
    }

    Json(serde_json::json!({
        "status": "sent",
        "priority": req.priority,
        "task_id": task.id,
    }))
    .into_response()
}
