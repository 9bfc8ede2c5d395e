// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use clap::Parser;
use serial_test::serial;

fn parse(args: &[&str]) -> Config {
    let mut argv = vec!["synapse"];
    argv.extend_from_slice(args);
    Config::try_parse_from(argv).unwrap_or_else(|e| panic!("parse: {e}"))
}

#[test]
#[serial(synapse_env)]
fn defaults() {
    std::env::remove_var("SYNAPSE_PROFILE");
    std::env::remove_var("SYNAPSE_PORT");
    let config = parse(&[]);
    assert_eq!(config.profile, "claude");
    assert!(config.port.is_none());
    assert_eq!(config.host, "127.0.0.1");
    assert_eq!((config.cols, config.rows), (200, 50));
    assert!(config.task_board_enabled);
    assert!(!config.history_enabled);
    assert!(config.validate().is_ok());
}

#[test]
fn trailing_args_reach_the_child() {
    let config = parse(&["--profile", "dummy", "--", "--model", "opus"]);
    assert_eq!(config.tool_args, vec!["--model", "opus"]);
}

#[test]
#[serial(synapse_env)]
fn tool_args_env_is_nul_separated() {
    std::env::set_var("SYNAPSE_TOOL_ARGS", "--flag\0value with spaces");
    let config = parse(&["--profile", "dummy"]);
    let resolved = config.resolved_tool_args();
    std::env::remove_var("SYNAPSE_TOOL_ARGS");
    assert_eq!(resolved, vec!["--flag", "value with spaces"]);
}

#[test]
fn ssl_requires_both_halves() {
    let config = parse(&["--ssl-cert", "/tmp/cert.pem"]);
    assert!(config.validate().is_err());
}

#[test]
fn zero_terminal_size_rejected() {
    let config = parse(&["--cols", "0"]);
    assert!(config.validate().is_err());
}

#[test]
fn instruction_file_wins() {
    let tmp = tempfile::NamedTempFile::new().unwrap_or_else(|e| panic!("tmp: {e}"));
    std::fs::write(tmp.path(), "from file").unwrap_or_else(|e| panic!("write: {e}"));
    let path = tmp.path().display().to_string();
    let config =
        parse(&["--instruction", "inline", "--instruction-file", &path]);
    let resolved = config.resolved_instruction().unwrap_or_default();
    assert_eq!(resolved.as_deref(), Some("from file"));
}

#[test]
fn missing_instruction_file_is_an_error() {
    let config = parse(&["--instruction-file", "/no/such/file"]);
    assert!(config.resolved_instruction().is_err());
}
