// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;

#[test]
#[serial(synapse_env)]
fn defaults_live_under_home() {
    std::env::remove_var("SYNAPSE_REGISTRY_DIR");
    std::env::remove_var("SYNAPSE_HISTORY_DB_PATH");
    std::env::remove_var("SYNAPSE_SOCKETS_DIR");

    assert!(registry_dir().ends_with(".a2a/registry"));
    assert!(history_db_path().ends_with(".synapse/history/history.db"));
    assert!(socket_path("synapse-claude-8100").ends_with("synapse-claude-8100.sock"));
}

#[test]
#[serial(synapse_env)]
fn env_overrides_win() {
    std::env::set_var("SYNAPSE_REGISTRY_DIR", "/tmp/alt-registry");
    assert_eq!(registry_dir(), PathBuf::from("/tmp/alt-registry"));
    std::env::remove_var("SYNAPSE_REGISTRY_DIR");
}

#[test]
#[serial(synapse_env)]
fn empty_override_is_ignored() {
    std::env::set_var("SYNAPSE_REGISTRY_DIR", "");
    assert!(registry_dir().ends_with(".a2a/registry"));
    std::env::remove_var("SYNAPSE_REGISTRY_DIR");
}

#[test]
fn board_path_is_project_local() {
    if std::env::var_os("SYNAPSE_TASK_BOARD_DB_PATH").is_none() {
        assert_eq!(task_board_db_path(), PathBuf::from(".synapse/task_board.db"));
    }
}
