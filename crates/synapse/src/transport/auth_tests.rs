// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn disabled_config_accepts_nothing_specific() {
    let config = AuthConfig::default();
    assert!(!config.enabled);
    assert!(!config.key_valid("anything"));
}

#[test]
fn key_validation_hashes() {
    let config = AuthConfig {
        enabled: true,
        key_hashes: vec![hash_key("synapse_abc123")],
        allow_localhost: false,
    };
    assert!(config.key_valid("synapse_abc123"));
    assert!(!config.key_valid("synapse_abc124"));
    assert!(!config.key_valid(""));
}

#[test]
fn hash_is_sha256_hex() {
    // sha256("abc"), a well-known vector.
    assert_eq!(
        hash_key("abc"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}

#[test]
fn localhost_detection() {
    use std::net::SocketAddr;
    let local: SocketAddr = "127.0.0.1:9999".parse().unwrap_or_else(|e| panic!("{e}"));
    let remote: SocketAddr = "10.0.0.5:9999".parse().unwrap_or_else(|e| panic!("{e}"));
    assert!(is_localhost(Some(&local)));
    assert!(!is_localhost(Some(&remote)));
    // UDS peers carry no address and count as local.
    assert!(is_localhost(None));
}

#[test]
fn constant_time_eq_basics() {
    assert!(constant_time_eq("abc", "abc"));
    assert!(!constant_time_eq("abc", "abd"));
    assert!(!constant_time_eq("abc", "abcd"));
}
