// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! External A2A peers.
//!
//! Remote agents (not managed by this host's registry) are discovered by
//! fetching their agent card and remembered under an alias in
//! `~/.a2a/external/<alias>.json`, using the same atomic file conventions
//! as the local registry.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::{self, PeerAddr};
use crate::paths;

/// A remembered external peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalAgent {
    pub alias: String,
    pub endpoint: String,
    /// The peer's agent card as returned by `/.well-known/agent.json`.
    pub card: serde_json::Value,
    pub discovered_at: DateTime<Utc>,
}

/// File-backed store of external agents.
#[derive(Debug, Clone)]
pub struct ExternalRegistry {
    dir: PathBuf,
}

impl Default for ExternalRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ExternalRegistry {
    pub fn new() -> Self {
        Self { dir: paths::external_registry_dir() }
    }

    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Fetch the peer's agent card and store it under `alias`.
    pub async fn discover(&self, endpoint: &str, alias: Option<&str>) -> anyhow::Result<ExternalAgent> {
        let peer = PeerAddr::new(endpoint, None);
        let card = client::get_json(&peer, "/.well-known/agent.json")
            .await
            .with_context(|| format!("fetch agent card from {endpoint}"))?;
        let alias = alias
            .map(str::to_owned)
            .or_else(|| card.get("name").and_then(|v| v.as_str()).map(sanitize_alias))
            .unwrap_or_else(|| sanitize_alias(endpoint));
        let agent = ExternalAgent {
            alias: alias.clone(),
            endpoint: endpoint.trim_end_matches('/').to_owned(),
            card,
            discovered_at: Utc::now(),
        };
        self.save(&agent)?;
        Ok(agent)
    }

    pub fn get(&self, alias: &str) -> Option<ExternalAgent> {
        let data = std::fs::read_to_string(self.dir.join(format!("{alias}.json"))).ok()?;
        serde_json::from_str(&data).ok()
    }

    pub fn list(&self) -> Vec<ExternalAgent> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut agents: Vec<ExternalAgent> = entries
            .flatten()
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("json"))
            .filter_map(|e| {
                std::fs::read_to_string(e.path()).ok().and_then(|s| serde_json::from_str(&s).ok())
            })
            .collect();
        agents.sort_by(|a, b| a.alias.cmp(&b.alias));
        agents
    }

    fn save(&self, agent: &ExternalAgent) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("create {}", self.dir.display()))?;
        let path = self.dir.join(format!("{}.json", agent.alias));
        let tmp = path.with_extension("json.tmp");
        {
            let mut f = std::fs::File::create(&tmp)?;
            f.write_all(serde_json::to_string_pretty(agent)?.as_bytes())?;
        }
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

fn sanitize_alias(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect();
    cleaned.trim_matches('-').to_lowercase()
}

#[cfg(test)]
#[path = "external_tests.rs"]
mod tests;
