// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: store builders and fixtures.

use std::sync::Arc;

use tempfile::TempDir;

use crate::board::TaskBoard;
use crate::controller::{ControllerConfig, IdentityConfig, TerminalController};
use crate::external::ExternalRegistry;
use crate::history::HistoryStore;
use crate::profile::{IdleDetectionSpec, IdleStrategy, PatternUse};
use crate::registry::AgentRegistry;
use crate::reply_stack::ReplyStack;
use crate::task_store::TaskStore;
use crate::transport::auth::AuthConfig;
use crate::transport::state::{ServerSettings, Store};
use crate::webhooks::{WebhookConfig, WebhookRegistry};

/// A [`Store`] wired against temp directories. The controller is built
/// but not started; tests that need a live PTY use the integration suite.
pub struct TestHarness {
    pub store: Arc<Store>,
    /// Keeps the backing temp directory alive for the store's lifetime.
    pub tmp: TempDir,
}

/// Timeout-strategy idle spec with a short threshold, for tests.
pub fn idle_timeout_spec(seconds: f64) -> IdleDetectionSpec {
    IdleDetectionSpec {
        strategy: IdleStrategy::Timeout,
        pattern: None,
        pattern_use: PatternUse::Always,
        timeout: seconds,
    }
}

/// A controller that has not been started, registered against a
/// registry rooted in `dir`.
pub fn idle_controller(dir: &std::path::Path, agent_id: &str, port: u16) -> TerminalController {
    let registry = Arc::new(AgentRegistry::with_dir(dir.join("registry")));
    TerminalController::new(
        ControllerConfig {
            command: vec!["true".to_owned()],
            envs: vec![],
            submit_sequence: b"\n".to_vec(),
            idle: idle_timeout_spec(0.2),
            waiting_regex: None,
            identity: IdentityConfig {
                agent_id: agent_id.to_owned(),
                agent_type: "dummy".to_owned(),
                port,
                name: None,
                role: None,
                skill_set: None,
                instruction: None,
                skip_initial_instructions: true,
            },
            cols: 80,
            rows: 24,
        },
        registry,
    )
}

/// Build an isolated store for router-level tests.
#[allow(clippy::expect_used)]
pub fn test_store() -> TestHarness {
    let tmp = TempDir::new().expect("create tempdir");
    let agent_id = "synapse-dummy-8190";
    let controller = idle_controller(tmp.path(), agent_id, 8190);
    let store = Arc::new(Store {
        controller,
        tasks: TaskStore::new(),
        replies: ReplyStack::new(),
        registry: Arc::new(AgentRegistry::with_dir(tmp.path().join("registry"))),
        external: ExternalRegistry::with_dir(tmp.path().join("external")),
        board: Arc::new(
            TaskBoard::open(tmp.path().join("board.db")).expect("open task board"),
        ),
        history: Arc::new(HistoryStore::open(tmp.path().join("history.db"), false)),
        webhooks: Arc::new(WebhookRegistry::new(WebhookConfig::default())),
        settings: ServerSettings {
            agent_id: agent_id.to_owned(),
            agent_type: "dummy".to_owned(),
            port: 8190,
            name: None,
            role: None,
            endpoint: "http://127.0.0.1:8190".to_owned(),
            uds_path: None,
            auth: AuthConfig::default(),
        },
        session_id: tokio::sync::RwLock::new("test-session".to_owned()),
    });
    TestHarness { store, tmp }
}
