// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spawning sibling wrappers.
//!
//! `/spawn` re-executes this binary detached with the requested profile;
//! the new process allocates its own port, writes its registry record, and
//! only then do we report its agent id back to the caller.

use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ports::{port_range, PortManager};
use crate::registry::{self, AgentRegistry};

/// How long to wait for a spawned wrapper to register itself.
const REGISTRATION_TIMEOUT: Duration = Duration::from_secs(15);
const REGISTRATION_POLL: Duration = Duration::from_millis(250);

/// One agent to start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnRequest {
    pub profile: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub skill_set: Option<String>,
}

/// Result of one spawn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnResult {
    pub agent_id: String,
    pub port: u16,
    pub endpoint: String,
}

/// Launch one sibling wrapper and wait for it to appear in the registry.
pub async fn spawn_agent(
    registry: &AgentRegistry,
    request: &SpawnRequest,
) -> anyhow::Result<SpawnResult> {
    let ports = PortManager::new(registry);
    let Some(port) = ports.available_port(&request.profile) else {
        anyhow::bail!("{}", ports.exhaustion_report(&request.profile));
    };
    let agent_id = registry::agent_id(&request.profile, port);

    let exe = std::env::current_exe().context("resolve current executable")?;
    let mut cmd = std::process::Command::new(exe);
    cmd.env("SYNAPSE_PROFILE", &request.profile)
        .env("SYNAPSE_PORT", port.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    if let Some(ref name) = request.name {
        cmd.env("SYNAPSE_AGENT_NAME", name);
    }
    if let Some(ref role) = request.role {
        cmd.env("SYNAPSE_AGENT_ROLE", role);
    }
    if let Some(ref skill_set) = request.skill_set {
        cmd.env("SYNAPSE_SKILL_SET", skill_set);
    }
    let child = cmd.spawn().with_context(|| format!("spawn wrapper for {}", request.profile))?;
    info!(agent_id = %agent_id, pid = child.id(), "spawned sibling wrapper");

    // The child registers once its HTTP server is up.
    let deadline = tokio::time::Instant::now() + REGISTRATION_TIMEOUT;
    loop {
        if let Some(record) = registry.get(&agent_id) {
            return Ok(SpawnResult {
                agent_id: record.agent_id,
                port: record.port,
                endpoint: record.endpoint,
            });
        }
        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!("spawned agent {agent_id} did not register within {REGISTRATION_TIMEOUT:?}");
        }
        tokio::time::sleep(REGISTRATION_POLL).await;
    }
}

/// Start a named set of agents; per-member failures don't abort the rest.
pub async fn spawn_team(
    registry: &AgentRegistry,
    members: &[SpawnRequest],
) -> Vec<Result<SpawnResult, String>> {
    let mut results = Vec::with_capacity(members.len());
    for member in members {
        results.push(spawn_agent(registry, member).await.map_err(|e| e.to_string()));
    }
    results
}

/// Sanity bound referenced by the spawn handler: reject absurd team sizes
/// that would exhaust a port band outright.
pub fn band_capacity(profile: &str) -> usize {
    let (start, end) = port_range(profile);
    usize::from(end - start) + 1
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;
