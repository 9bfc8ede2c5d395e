// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Optional SQLite log of completed task observations.
//!
//! History is best-effort: open or write failures log a warning and flip
//! the store to disabled for the rest of the run rather than failing the
//! wrapper.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default pruning horizon.
const PRUNE_MAX_AGE_DAYS: i64 = 30;
/// Hard cap on retained rows; oldest beyond this are pruned.
const PRUNE_MAX_ROWS: i64 = 10_000;

/// One recorded observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub task_id: String,
    pub session_id: String,
    pub agent_name: String,
    pub input: String,
    pub output: String,
    pub status: String,
    pub timestamp: String,
    pub metadata: Option<serde_json::Value>,
}

/// Append-only history store.
#[derive(Debug)]
pub struct HistoryStore {
    db_path: PathBuf,
    enabled: AtomicBool,
}

impl HistoryStore {
    /// Open the store; a failed open degrades to disabled.
    pub fn open(db_path: impl Into<PathBuf>, enabled: bool) -> Self {
        let store = Self { db_path: db_path.into(), enabled: AtomicBool::new(enabled) };
        if enabled {
            if let Err(e) = store.init_schema() {
                warn!("history disabled: failed to initialize {}: {e}", store.db_path.display());
                store.enabled.store(false, Ordering::Relaxed);
            } else {
                store.prune();
            }
        }
        store
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    fn init_schema(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = self.connect()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS observations (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                agent_name TEXT NOT NULL,
                task_id    TEXT NOT NULL UNIQUE,
                input      TEXT NOT NULL,
                output     TEXT NOT NULL,
                status     TEXT NOT NULL,
                timestamp  DATETIME DEFAULT CURRENT_TIMESTAMP,
                metadata   TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_agent_name ON observations(agent_name);
            CREATE INDEX IF NOT EXISTS idx_timestamp ON observations(timestamp);
            CREATE INDEX IF NOT EXISTS idx_task_id ON observations(task_id);",
        )?;
        Ok(())
    }

    fn connect(&self) -> anyhow::Result<Connection> {
        Ok(Connection::open(&self.db_path)?)
    }

    /// Record one observation. `task_id` is unique; duplicates are replaced.
    pub fn save(&self, obs: &Observation) {
        if !self.enabled() {
            return;
        }
        let metadata_json = obs.metadata.as_ref().and_then(|m| serde_json::to_string(m).ok());
        let result = self.connect().and_then(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO observations
                 (session_id, agent_name, task_id, input, output, status, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    obs.session_id,
                    obs.agent_name,
                    obs.task_id,
                    obs.input,
                    obs.output,
                    obs.status,
                    metadata_json
                ],
            )?;
            Ok(())
        });
        if let Err(e) = result {
            warn!("history disabled: failed to save observation: {e}");
            self.enabled.store(false, Ordering::Relaxed);
        }
    }

    /// Fetch one observation by task id.
    pub fn get(&self, task_id: &str) -> Option<Observation> {
        if !self.enabled() {
            return None;
        }
        let conn = self.connect().ok()?;
        conn.query_row(
            "SELECT * FROM observations WHERE task_id = ?1",
            params![task_id],
            row_to_observation,
        )
        .optional()
        .ok()?
    }

    /// Newest observations first, optionally filtered by agent name.
    pub fn list(&self, limit: usize, agent_name: Option<&str>) -> Vec<Observation> {
        if !self.enabled() {
            return Vec::new();
        }
        let Ok(conn) = self.connect() else {
            return Vec::new();
        };
        let result = (|| -> anyhow::Result<Vec<Observation>> {
            let rows = match agent_name {
                Some(name) => {
                    let mut stmt = conn.prepare(
                        "SELECT * FROM observations WHERE agent_name = ?1
                         ORDER BY timestamp DESC, id DESC LIMIT ?2",
                    )?;
                    let rows =
                        stmt.query_map(params![name, limit as i64], row_to_observation)?;
                    rows.collect::<Result<Vec<_>, _>>()?
                }
                None => {
                    let mut stmt = conn.prepare(
                        "SELECT * FROM observations ORDER BY timestamp DESC, id DESC LIMIT ?1",
                    )?;
                    let rows = stmt.query_map(params![limit as i64], row_to_observation)?;
                    rows.collect::<Result<Vec<_>, _>>()?
                }
            };
            Ok(rows)
        })();
        result.unwrap_or_default()
    }

    /// Drop observations past the age horizon and beyond the row cap.
    fn prune(&self) {
        let result = self.connect().and_then(|conn| {
            conn.execute(
                "DELETE FROM observations
                 WHERE timestamp < datetime('now', ?1)",
                params![format!("-{PRUNE_MAX_AGE_DAYS} days")],
            )?;
            conn.execute(
                "DELETE FROM observations WHERE id NOT IN
                 (SELECT id FROM observations ORDER BY id DESC LIMIT ?1)",
                params![PRUNE_MAX_ROWS],
            )?;
            Ok(())
        });
        if let Err(e) = result {
            warn!("history prune failed: {e}");
        }
    }
}

fn row_to_observation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Observation> {
    let metadata_json: Option<String> = row.get("metadata")?;
    Ok(Observation {
        task_id: row.get("task_id")?,
        session_id: row.get("session_id")?,
        agent_name: row.get("agent_name")?,
        input: row.get("input")?,
        output: row.get("output")?,
        status: row.get("status")?,
        timestamp: row.get("timestamp")?,
        metadata: metadata_json.and_then(|m| serde_json::from_str(&m).ok()),
    })
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
