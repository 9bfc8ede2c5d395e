// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized filesystem layout.
//!
//! Every location can be overridden through a `SYNAPSE_*` environment
//! variable so tests and multi-tenant hosts can relocate state.

use std::path::PathBuf;

fn home_dir() -> PathBuf {
    std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("/tmp"))
}

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var_os(var).filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// Directory of live agent records (`<agent_id>.json`).
pub fn registry_dir() -> PathBuf {
    env_path("SYNAPSE_REGISTRY_DIR").unwrap_or_else(|| home_dir().join(".a2a").join("registry"))
}

/// Directory of discovered external agent cards (`<alias>.json`).
pub fn external_registry_dir() -> PathBuf {
    env_path("SYNAPSE_EXTERNAL_REGISTRY_DIR")
        .unwrap_or_else(|| home_dir().join(".a2a").join("external"))
}

/// SQLite history database file.
pub fn history_db_path() -> PathBuf {
    env_path("SYNAPSE_HISTORY_DB_PATH")
        .unwrap_or_else(|| home_dir().join(".synapse").join("history").join("history.db"))
}

/// Directory of per-agent Unix domain sockets.
pub fn sockets_dir() -> PathBuf {
    env_path("SYNAPSE_SOCKETS_DIR").unwrap_or_else(|| home_dir().join(".synapse").join("sockets"))
}

/// UDS path for one agent.
pub fn socket_path(agent_id: &str) -> PathBuf {
    sockets_dir().join(format!("{agent_id}.sock"))
}

/// Project-local task board database (relative to the working directory).
pub fn task_board_db_path() -> PathBuf {
    env_path("SYNAPSE_TASK_BOARD_DB_PATH")
        .unwrap_or_else(|| PathBuf::from(".synapse").join("task_board.db"))
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
