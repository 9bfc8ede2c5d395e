// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared task board: project-local SQLite (WAL) coordination.
//!
//! Many wrapper processes on one host share the board through its database
//! file. Claiming is atomic via a conditional UPDATE under SQLite's write
//! lock; completing a task reports which pending tasks became unblocked.
//! Transactions are short and a connection is never held across awaits —
//! callers run board operations inside `spawn_blocking`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One board task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardTask {
    pub id: String,
    pub subject: String,
    pub description: String,
    pub status: String,
    pub assignee: Option<String>,
    pub created_by: String,
    pub blocked_by: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

/// SQLite-backed shared task board.
#[derive(Debug, Clone)]
pub struct TaskBoard {
    db_path: PathBuf,
}

impl TaskBoard {
    /// Open (creating if needed) the board at `db_path`.
    ///
    /// Board initialization failure is fatal for the wrapper (unlike
    /// history, the board is not optional).
    pub fn open(db_path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
        }
        let board = Self { db_path };
        let conn = board.connect()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS board_tasks (
                id           TEXT PRIMARY KEY,
                subject      TEXT NOT NULL,
                description  TEXT DEFAULT '',
                status       TEXT NOT NULL DEFAULT 'pending',
                assignee     TEXT,
                created_by   TEXT NOT NULL,
                blocked_by   TEXT DEFAULT '[]',
                created_at   DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at   DATETIME DEFAULT CURRENT_TIMESTAMP,
                completed_at DATETIME
            );
            CREATE INDEX IF NOT EXISTS idx_board_status ON board_tasks(status);
            CREATE INDEX IF NOT EXISTS idx_board_assignee ON board_tasks(assignee);",
        )
        .context("initialize task board schema")?;
        Ok(board)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> anyhow::Result<Connection> {
        let conn = Connection::open(&self.db_path)
            .with_context(|| format!("open task board {}", self.db_path.display()))?;
        conn.busy_timeout(std::time::Duration::from_secs(10))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(conn)
    }

    /// Insert a new pending task; returns its id.
    pub fn create(
        &self,
        subject: &str,
        description: &str,
        created_by: &str,
        blocked_by: &[String],
    ) -> anyhow::Result<String> {
        let id = Uuid::new_v4().to_string();
        let blocked_json = serde_json::to_string(blocked_by)?;
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO board_tasks (id, subject, description, created_by, blocked_by)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, subject, description, created_by, blocked_json],
        )?;
        Ok(id)
    }

    /// Atomically claim a task for `agent_id`.
    ///
    /// Succeeds only when the task is pending, unassigned, and every
    /// blocker is completed. Concurrent claimers are serialized by the
    /// database write lock; exactly one conditional UPDATE hits.
    pub fn claim(&self, task_id: &str, agent_id: &str) -> anyhow::Result<bool> {
        let mut conn = self.connect()?;
        // Immediate: take the write lock up front so concurrent claimers
        // queue on busy_timeout instead of failing with a stale snapshot.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let blocked_json: Option<String> = tx
            .query_row("SELECT blocked_by FROM board_tasks WHERE id = ?1", params![task_id], |r| {
                r.get(0)
            })
            .optional()?;
        let Some(blocked_json) = blocked_json else {
            return Ok(false);
        };
        let blocked_by: Vec<String> = serde_json::from_str(&blocked_json).unwrap_or_default();
        if has_incomplete_blockers(&tx, &blocked_by)? {
            return Ok(false);
        }

        let updated = tx.execute(
            "UPDATE board_tasks
             SET status = 'in_progress', assignee = ?1, updated_at = CURRENT_TIMESTAMP
             WHERE id = ?2 AND status = 'pending' AND assignee IS NULL",
            params![agent_id, task_id],
        )?;
        tx.commit()?;
        Ok(updated > 0)
    }

    /// Complete a task and return the ids of tasks it unblocked.
    ///
    /// Only the assignee may complete. The unblock scan runs in the same
    /// transaction so the returned set is consistent with the completion.
    pub fn complete(&self, task_id: &str, agent_id: &str) -> anyhow::Result<Vec<String>> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let updated = tx.execute(
            "UPDATE board_tasks
             SET status = 'completed', completed_at = CURRENT_TIMESTAMP,
                 updated_at = CURRENT_TIMESTAMP
             WHERE id = ?1 AND assignee = ?2",
            params![task_id, agent_id],
        )?;
        if updated == 0 {
            return Ok(Vec::new());
        }

        let mut unblocked = Vec::new();
        {
            let mut stmt =
                tx.prepare("SELECT id, blocked_by FROM board_tasks WHERE status = 'pending'")?;
            let rows = stmt.query_map([], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, Option<String>>(1)?))
            })?;
            for row in rows {
                let (id, blocked_json) = row?;
                let blocked_by: Vec<String> =
                    serde_json::from_str(blocked_json.as_deref().unwrap_or("[]"))
                        .unwrap_or_default();
                if !blocked_by.iter().any(|b| b == task_id) {
                    continue;
                }
                let remaining: Vec<String> =
                    blocked_by.into_iter().filter(|b| b != task_id).collect();
                if !has_incomplete_blockers(&tx, &remaining)? {
                    unblocked.push(id);
                }
            }
        }
        tx.commit()?;
        Ok(unblocked)
    }

    /// List tasks, optionally filtered by status and/or assignee.
    pub fn list(
        &self,
        status: Option<&str>,
        assignee: Option<&str>,
    ) -> anyhow::Result<Vec<BoardTask>> {
        let conn = self.connect()?;
        let mut sql = String::from("SELECT * FROM board_tasks WHERE 1=1");
        let mut args: Vec<String> = Vec::new();
        if let Some(status) = status {
            sql.push_str(" AND status = ?");
            args.push(status.to_owned());
        }
        if let Some(assignee) = assignee {
            sql.push_str(" AND assignee = ?");
            args.push(assignee.to_owned());
        }
        sql.push_str(" ORDER BY created_at");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), row_to_task)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Pending, unassigned tasks whose blockers are all completed.
    pub fn available(&self) -> anyhow::Result<Vec<BoardTask>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM board_tasks
             WHERE status = 'pending' AND assignee IS NULL
             ORDER BY created_at",
        )?;
        let rows = stmt.query_map([], row_to_task)?;
        let mut available = Vec::new();
        for row in rows {
            let task = row?;
            if !has_incomplete_blockers(&conn, &task.blocked_by)? {
                available.push(task);
            }
        }
        Ok(available)
    }

    /// Fetch one task by id.
    pub fn get(&self, task_id: &str) -> anyhow::Result<Option<BoardTask>> {
        let conn = self.connect()?;
        Ok(conn
            .query_row("SELECT * FROM board_tasks WHERE id = ?1", params![task_id], row_to_task)
            .optional()?)
    }
}

/// Whether any of the given blocker ids is not yet completed.
fn has_incomplete_blockers(conn: &Connection, blocked_by: &[String]) -> anyhow::Result<bool> {
    if blocked_by.is_empty() {
        return Ok(false);
    }
    let placeholders = vec!["?"; blocked_by.len()].join(",");
    let sql = format!(
        "SELECT COUNT(*) FROM board_tasks WHERE id IN ({placeholders}) AND status != 'completed'"
    );
    let mut stmt = conn.prepare(&sql)?;
    let count: i64 = stmt.query_row(rusqlite::params_from_iter(blocked_by.iter()), |r| r.get(0))?;
    Ok(count > 0)
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<BoardTask> {
    let blocked_json: Option<String> = row.get("blocked_by")?;
    Ok(BoardTask {
        id: row.get("id")?,
        subject: row.get("subject")?,
        description: row.get::<_, Option<String>>("description")?.unwrap_or_default(),
        status: row.get("status")?,
        assignee: row.get("assignee")?,
        created_by: row.get("created_by")?,
        blocked_by: serde_json::from_str(blocked_json.as_deref().unwrap_or("[]"))
            .unwrap_or_default(),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        completed_at: row.get("completed_at")?,
    })
}

#[cfg(test)]
#[path = "board_tests.rs"]
mod tests;
