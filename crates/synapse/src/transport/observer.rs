// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task completion observer and reply routing.
//!
//! After a message is written to the PTY, the observer waits for the
//! controller's next READY/WAITING edge, classifies the output, finishes
//! the task (artifact, status, webhook, history), and routes a reply back
//! to the sender recorded on the reply stack.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{debug, warn};

use crate::a2a::{Message, Part, Role, TaskState};
use crate::client::{self, PeerAddr};
use crate::history::Observation;
use crate::output;
use crate::reply_stack::ReplyTarget;
use crate::status::AgentStatus;
use crate::transport::state::Store;

/// Upper bound on how long one task is watched before the observer gives
/// up and leaves it `working`.
const OBSERVE_TIMEOUT: Duration = Duration::from_secs(600);

/// Watch the controller until the agent settles after `task_id`'s write,
/// then complete the task and route its reply.
pub fn spawn_completion_observer(store: Arc<Store>, task_id: String) {
    tokio::spawn(async move {
        let settled = tokio::time::timeout(OBSERVE_TIMEOUT, wait_for_settle(&store)).await;
        let Ok(Some(settle_status)) = settled else {
            debug!(task_id, "observer timed out or controller went away");
            return;
        };

        // The task may have been completed meanwhile by an inbound reply
        // (send-priority with in_reply_to) or canceled.
        let Some(task) = store.tasks.get(&task_id) else {
            return;
        };
        if task.status.is_terminal() {
            return;
        }

        let context = store.controller.rendered_context();
        if settle_status == AgentStatus::Waiting {
            let _ = store.tasks.update_status(&task_id, TaskState::InputRequired);
            return;
        }

        let (state, error) = output::detect_task_status(&context);
        let parts = output::parse_artifact_parts(&context);
        if !parts.is_empty() {
            let _ = store.tasks.add_artifact(&task_id, parts);
        }
        if store.tasks.update_status(&task_id, state).is_err() {
            return;
        }
        store.controller.mark_done();
        store.registry.update_task_preview(&store.settings.agent_id, None);
        finish_task(&store, &task_id, state, &context, error.as_ref().map(|e| e.code)).await;
    });
}

/// Complete all bookkeeping shared by observer- and reply-driven task
/// completion: webhook dispatch, history, and reply routing.
pub async fn finish_task(
    store: &Arc<Store>,
    task_id: &str,
    state: TaskState,
    output_text: &str,
    error_code: Option<&str>,
) {
    let event = match state {
        TaskState::Failed => "task.failed",
        _ => "task.completed",
    };
    let mut data = json!({
        "task_id": task_id,
        "agent_id": store.settings.agent_id,
        "status": state.as_str(),
    });
    if let Some(code) = error_code {
        data["error_code"] = json!(code);
    }
    store.webhooks.dispatch(event, data).await;

    if store.history.enabled() {
        let input = store.tasks.get(task_id).map(|t| t.message.text()).unwrap_or_default();
        let session_id = store.session_id.read().await.clone();
        store.history.save(&Observation {
            task_id: task_id.to_owned(),
            session_id,
            agent_name: store
                .settings
                .name
                .clone()
                .unwrap_or_else(|| store.settings.agent_id.clone()),
            input,
            output: output_text.to_owned(),
            status: state.as_str().to_owned(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            metadata: None,
        });
    }

    route_reply(store, task_id, output_text).await;
}

/// Send the output back to whoever asked, UDS preferred.
async fn route_reply(store: &Arc<Store>, task_id: &str, output_text: &str) {
    let sender = store.tasks.get(task_id).and_then(|t| t.sender());
    let target: Option<ReplyTarget> = match sender {
        Some(ref info) => store.replies.get(&info.sender_id),
        None => store.replies.pop_last(),
    };
    let Some(target) = target else {
        return;
    };

    let reply = Message { role: Role::Agent, parts: vec![Part::text(output_text)] };
    let mut metadata = json!({
        "sender": {
            "sender_id": store.settings.agent_id,
            "sender_endpoint": store.settings.endpoint,
            "sender_uds_path": store.settings.uds_path,
        }
    });
    if let Some(ref reply_to) = target.sender_task_id {
        metadata["in_reply_to"] = json!(reply_to);
    }
    let body = json!({ "message": reply, "metadata": metadata });

    let peer = PeerAddr::new(target.sender_endpoint.clone(), target.sender_uds_path.clone());
    if let Err(e) = client::post_json(&peer, "/tasks/send-priority", &body).await {
        // Replies are fire-and-forget: log and give up.
        warn!(task_id, "reply delivery to {} failed: {e}", target.sender_endpoint);
    }
}

/// Wait for the controller to settle at READY or WAITING.
///
/// Skips the synchronous PROCESSING set by the write itself; returns the
/// first settled status observed after that.
async fn wait_for_settle(store: &Arc<Store>) -> Option<AgentStatus> {
    let mut rx = store.controller.subscribe_status();
    loop {
        let status = rx.borrow_and_update().status;
        if matches!(status, AgentStatus::Ready | AgentStatus::Waiting) {
            return Some(status);
        }
        rx.changed().await.ok()?;
    }
}
