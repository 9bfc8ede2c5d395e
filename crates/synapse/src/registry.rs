// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-process agent discovery.
//!
//! Every live wrapper owns one JSON record in `~/.a2a/registry`. The owner
//! replaces its own file atomically (temp-then-rename); any reader may
//! enumerate the directory, skip corrupt files, and unlink records whose
//! process is dead or whose port no longer accepts connections.

use std::io::Write;
use std::net::TcpStream;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use nix::sys::signal::kill;
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::paths;
use crate::status::AgentStatus;

/// Timeout for the liveness port probe.
const PORT_PROBE_TIMEOUT: Duration = Duration::from_millis(200);

/// One agent's registry record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub agent_id: String,
    pub agent_type: String,
    pub port: u16,
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uds_path: Option<String>,
    pub pid: u32,
    pub working_dir: String,
    pub status: AgentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Preferred transport hint for clients (`uds` or `tcp`).
    pub transport: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_task_preview: Option<String>,
    pub registered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Deterministic, human-meaningful agent id.
pub fn agent_id(agent_type: &str, port: u16) -> String {
    format!("synapse-{agent_type}-{port}")
}

/// Filesystem-backed registry of live agents.
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    dir: PathBuf,
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self { dir: paths::registry_dir() }
    }

    /// Registry rooted at an explicit directory (tests).
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Write (or replace) a record. Atomic: temp file, then rename.
    pub fn register(&self, record: &AgentRecord) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("create registry dir {}", self.dir.display()))?;
        let path = self.record_path(&record.agent_id);
        let tmp = path.with_extension("json.tmp");
        {
            let mut f = std::fs::File::create(&tmp)
                .with_context(|| format!("create {}", tmp.display()))?;
            f.write_all(serde_json::to_string_pretty(record)?.as_bytes())?;
        }
        std::fs::rename(&tmp, &path).with_context(|| format!("rename to {}", path.display()))?;
        Ok(())
    }

    /// Remove a record. Missing files are not an error.
    pub fn unregister(&self, agent_id: &str) {
        let _ = std::fs::remove_file(self.record_path(agent_id));
    }

    /// Read a single record, tolerating a missing or corrupt file.
    pub fn get(&self, agent_id: &str) -> Option<AgentRecord> {
        let data = std::fs::read_to_string(self.record_path(agent_id)).ok()?;
        serde_json::from_str(&data).ok()
    }

    /// Update just the status field of an existing record.
    pub fn update_status(&self, agent_id: &str, status: AgentStatus) -> anyhow::Result<()> {
        let mut record = self
            .get(agent_id)
            .ok_or_else(|| anyhow::anyhow!("no registry record for {agent_id}"))?;
        record.status = status;
        record.updated_at = Utc::now();
        self.register(&record)
    }

    /// Update the short preview of the task currently being processed.
    pub fn update_task_preview(&self, agent_id: &str, preview: Option<String>) {
        if let Some(mut record) = self.get(agent_id) {
            record.current_task_preview = preview;
            record.updated_at = Utc::now();
            let _ = self.register(&record);
        }
    }

    /// All records on disk, corrupt files skipped. No liveness filtering.
    pub fn list_all(&self) -> Vec<AgentRecord> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut records = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match std::fs::read_to_string(&path).map(|s| serde_json::from_str::<AgentRecord>(&s)) {
                Ok(Ok(record)) => records.push(record),
                _ => debug!("skipping unreadable registry record: {}", path.display()),
            }
        }
        records.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        records
    }

    /// Live records only; stale records are unlinked as a side effect.
    ///
    /// A record is live when its PID is alive and its port accepts a TCP
    /// connection. Records in `PROCESSING` are exempt from the port probe
    /// so agents mid-startup are not reaped.
    pub fn list_agents(&self) -> Vec<AgentRecord> {
        let mut live = Vec::new();
        for record in self.list_all() {
            if self.is_live(&record) {
                live.push(record);
            } else {
                debug!(agent_id = %record.agent_id, "removing stale registry record");
                self.unregister(&record.agent_id);
            }
        }
        live
    }

    /// Liveness check for one record.
    pub fn is_live(&self, record: &AgentRecord) -> bool {
        if !pid_alive(record.pid) {
            return false;
        }
        if record.status == AgentStatus::Processing {
            return true;
        }
        port_open(record.port)
    }

    fn record_path(&self, agent_id: &str) -> PathBuf {
        self.dir.join(format!("{agent_id}.json"))
    }
}

/// Whether a process exists (signal 0 probe).
pub fn pid_alive(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

/// Whether something is listening on the local port.
fn port_open(port: u16) -> bool {
    TcpStream::connect_timeout(&([127, 0, 0, 1], port).into(), PORT_PROBE_TIMEOUT).is_ok()
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
