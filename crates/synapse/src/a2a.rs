// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A2A protocol wire types.
//!
//! Tasks move through the A2A lifecycle states, carry a [`Message`] of typed
//! parts, and accumulate [`Artifact`]s as the wrapped CLI produces output.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Received but not yet written to the PTY.
    Submitted,
    /// Written to the PTY; awaiting the agent's output.
    Working,
    /// The agent is waiting for additional input.
    InputRequired,
    Completed,
    Failed,
    Canceled,
}

impl TaskState {
    /// Terminal states freeze the task; no transition may leave them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Working => "working",
            Self::InputRequired => "input_required",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of a message originator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

/// One typed segment of a message, discriminated by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Part {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "file")]
    File { file: FileRef },
    #[serde(rename = "data")]
    Data { data: serde_json::Value },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// File reference carried in a [`Part::File`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRef {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// A message: role plus ordered parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self { role: Role::User, parts: vec![Part::text(text)] }
    }

    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            if let Part::Text { text } = part {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(text);
            }
        }
        out
    }

    /// File parts, in order.
    pub fn files(&self) -> Vec<&FileRef> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::File { file } => Some(file),
                _ => None,
            })
            .collect()
    }
}

/// Output segment appended to a task; `index` is its array position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub index: usize,
    pub parts: Vec<Part>,
}

/// Reply target extracted from `metadata.sender`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SenderInfo {
    pub sender_id: String,
    pub sender_endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_uds_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_type: Option<String>,
}

/// A unit of work tracked by the task store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub status: TaskState,
    pub message: Message,
    pub artifacts: Vec<Artifact>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(message: Message, metadata: HashMap<String, serde_json::Value>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            status: TaskState::Submitted,
            message,
            artifacts: Vec::new(),
            metadata,
            created_at: now,
            updated_at: now,
        }
    }

    /// Parse `metadata.sender` into a [`SenderInfo`], if present and well-formed.
    pub fn sender(&self) -> Option<SenderInfo> {
        self.metadata.get("sender").and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// The `in_reply_to` task id (or prefix), if present.
    pub fn in_reply_to(&self) -> Option<&str> {
        self.metadata.get("in_reply_to").and_then(|v| v.as_str())
    }

    /// Whether the sender expects a reply task back.
    pub fn response_expected(&self) -> bool {
        self.metadata.get("response_expected").and_then(|v| v.as_bool()).unwrap_or(false)
    }
}

/// Capabilities advertised on the agent card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCapabilities {
    pub streaming: bool,
    #[serde(rename = "pushNotifications")]
    pub push_notifications: bool,
}

/// Public description served at `/.well-known/agent.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCard {
    pub name: String,
    pub description: String,
    pub url: String,
    pub version: String,
    #[serde(rename = "agentId")]
    pub agent_id: String,
    #[serde(rename = "agentType")]
    pub agent_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub capabilities: AgentCapabilities,
    #[serde(rename = "defaultInputModes")]
    pub default_input_modes: Vec<String>,
    #[serde(rename = "defaultOutputModes")]
    pub default_output_modes: Vec<String>,
}

#[cfg(test)]
#[path = "a2a_tests.rs"]
mod tests;
