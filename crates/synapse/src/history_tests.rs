// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

fn observation(task_id: &str, agent: &str) -> Observation {
    Observation {
        task_id: task_id.to_owned(),
        session_id: "session-1".to_owned(),
        agent_name: agent.to_owned(),
        input: "do the thing".to_owned(),
        output: "the thing is done".to_owned(),
        status: "completed".to_owned(),
        timestamp: String::new(),
        metadata: Some(serde_json::json!({"k": "v"})),
    }
}

#[test]
fn save_and_get() {
    let tmp = TempDir::new().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let store = HistoryStore::open(tmp.path().join("history.db"), true);
    assert!(store.enabled());

    store.save(&observation("task-1", "alpha"));
    let loaded = store.get("task-1");
    assert_eq!(loaded.as_ref().map(|o| o.agent_name.as_str()), Some("alpha"));
    assert_eq!(
        loaded.and_then(|o| o.metadata).map(|m| m["k"].clone()),
        Some(serde_json::json!("v"))
    );
}

#[test]
fn duplicate_task_id_replaces() {
    let tmp = TempDir::new().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let store = HistoryStore::open(tmp.path().join("history.db"), true);

    store.save(&observation("task-1", "alpha"));
    let mut second = observation("task-1", "alpha");
    second.output = "revised".to_owned();
    store.save(&second);

    assert_eq!(store.list(10, None).len(), 1);
    assert_eq!(store.get("task-1").map(|o| o.output).as_deref(), Some("revised"));
}

#[test]
fn list_filters_and_limits() {
    let tmp = TempDir::new().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let store = HistoryStore::open(tmp.path().join("history.db"), true);

    for i in 0..5 {
        store.save(&observation(&format!("task-{i}"), "alpha"));
    }
    store.save(&observation("task-b", "beta"));

    assert_eq!(store.list(3, None).len(), 3);
    let beta = store.list(10, Some("beta"));
    assert_eq!(beta.len(), 1);
    assert_eq!(beta[0].task_id, "task-b");
}

#[test]
fn disabled_store_is_inert() {
    let tmp = TempDir::new().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let store = HistoryStore::open(tmp.path().join("history.db"), false);
    assert!(!store.enabled());

    store.save(&observation("task-1", "alpha"));
    assert!(store.get("task-1").is_none());
    assert!(store.list(10, None).is_empty());
    // No database file was created.
    assert!(!tmp.path().join("history.db").exists());
}

#[test]
fn unwritable_path_degrades_to_disabled() {
    let store = HistoryStore::open("/proc/definitely/not/writable/history.db", true);
    assert!(!store.enabled());
    // Saving after degradation is a no-op, not a panic.
    store.save(&observation("task-1", "alpha"));
}
