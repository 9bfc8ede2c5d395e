// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

fn record(agent_id: &str, port: u16, pid: u32, status: AgentStatus) -> AgentRecord {
    let now = Utc::now();
    AgentRecord {
        agent_id: agent_id.to_owned(),
        agent_type: "dummy".to_owned(),
        port,
        endpoint: format!("http://127.0.0.1:{port}"),
        uds_path: None,
        pid,
        working_dir: "/tmp".to_owned(),
        status,
        name: None,
        role: None,
        transport: "tcp".to_owned(),
        current_task_preview: None,
        registered_at: now,
        updated_at: now,
    }
}

#[test]
fn agent_id_format() {
    assert_eq!(agent_id("claude", 8100), "synapse-claude-8100");
}

#[test]
fn register_get_unregister() {
    let tmp = TempDir::new().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let registry = AgentRegistry::with_dir(tmp.path());

    let rec = record("synapse-dummy-8190", 8190, std::process::id(), AgentStatus::Processing);
    registry.register(&rec).unwrap_or_else(|e| panic!("register: {e}"));

    let loaded = registry.get("synapse-dummy-8190");
    assert_eq!(loaded.map(|r| r.port), Some(8190));

    registry.unregister("synapse-dummy-8190");
    assert!(registry.get("synapse-dummy-8190").is_none());
    // Unregistering again is harmless.
    registry.unregister("synapse-dummy-8190");
}

#[test]
fn update_status_rewrites_record() {
    let tmp = TempDir::new().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let registry = AgentRegistry::with_dir(tmp.path());
    let rec = record("synapse-dummy-8191", 8191, std::process::id(), AgentStatus::Processing);
    registry.register(&rec).unwrap_or_else(|e| panic!("register: {e}"));

    registry
        .update_status("synapse-dummy-8191", AgentStatus::Ready)
        .unwrap_or_else(|e| panic!("update: {e}"));
    assert_eq!(registry.get("synapse-dummy-8191").map(|r| r.status), Some(AgentStatus::Ready));
}

#[test]
fn list_all_skips_corrupt_files() {
    let tmp = TempDir::new().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let registry = AgentRegistry::with_dir(tmp.path());
    let rec = record("synapse-dummy-8192", 8192, std::process::id(), AgentStatus::Processing);
    registry.register(&rec).unwrap_or_else(|e| panic!("register: {e}"));

    std::fs::write(tmp.path().join("broken.json"), b"{ not json").ok();
    std::fs::write(tmp.path().join("notes.txt"), b"ignored").ok();

    let all = registry.list_all();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].agent_id, "synapse-dummy-8192");
}

#[test]
fn dead_pid_is_stale_and_reaped() {
    let tmp = TempDir::new().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let registry = AgentRegistry::with_dir(tmp.path());
    // PID 0 never maps to a live process here.
    let rec = record("synapse-dummy-8193", 8193, 0, AgentStatus::Ready);
    registry.register(&rec).unwrap_or_else(|e| panic!("register: {e}"));

    assert!(registry.list_agents().is_empty());
    // The stale file was unlinked by the reader.
    assert!(registry.get("synapse-dummy-8193").is_none());
}

#[test]
fn processing_records_skip_the_port_probe() {
    let tmp = TempDir::new().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let registry = AgentRegistry::with_dir(tmp.path());
    // Our own PID is alive, but nothing listens on the port. PROCESSING
    // is exempt from the probe, so the record counts as live.
    let rec = record("synapse-dummy-8194", 59999, std::process::id(), AgentStatus::Processing);
    registry.register(&rec).unwrap_or_else(|e| panic!("register: {e}"));

    let live = registry.list_agents();
    assert_eq!(live.len(), 1);

    // The same record at READY fails the probe and is reaped.
    registry
        .update_status("synapse-dummy-8194", AgentStatus::Ready)
        .unwrap_or_else(|e| panic!("update: {e}"));
    assert!(registry.list_agents().is_empty());
}

#[test]
fn pid_alive_checks() {
    assert!(pid_alive(std::process::id()));
    assert!(!pid_alive(0));
}
