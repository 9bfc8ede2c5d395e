// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::board::TaskBoard;
use crate::controller::TerminalController;
use crate::external::ExternalRegistry;
use crate::history::HistoryStore;
use crate::registry::AgentRegistry;
use crate::reply_stack::ReplyStack;
use crate::task_store::TaskStore;
use crate::transport::auth::AuthConfig;
use crate::webhooks::WebhookRegistry;

/// Static identity/settings for this wrapper (immutable after startup).
pub struct ServerSettings {
    pub agent_id: String,
    pub agent_type: String,
    pub port: u16,
    pub name: Option<String>,
    pub role: Option<String>,
    pub endpoint: String,
    pub uds_path: Option<String>,
    pub auth: AuthConfig,
}

/// Shared application state handed to every handler.
///
/// Everything here is an explicit dependency — no process-wide globals —
/// so tests can assemble isolated instances.
pub struct Store {
    pub controller: TerminalController,
    pub tasks: TaskStore,
    pub replies: ReplyStack,
    pub registry: Arc<AgentRegistry>,
    pub external: ExternalRegistry,
    pub board: Arc<TaskBoard>,
    pub history: Arc<HistoryStore>,
    pub webhooks: Arc<WebhookRegistry>,
    pub settings: ServerSettings,
    /// Session id for history grouping; one per wrapper lifetime.
    pub session_id: RwLock<String>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("agent_id", &self.settings.agent_id)
            .field("agent_type", &self.settings.agent_type)
            .field("port", &self.settings.port)
            .finish()
    }
}
