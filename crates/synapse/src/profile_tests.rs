// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn parse_full_document() {
    let yaml = r#"
command: claude
args: ["--verbose"]
submit_sequence: "\\r"
env:
  FORCE_COLOR: "0"
idle_detection:
  strategy: hybrid
  pattern: BRACKETED_PASTE_MODE
  pattern_use: startup_only
  timeout: 1.5
waiting_detection:
  regex: '\[y/n\]'
"#;
    let profile = Profile::parse("claude", yaml).unwrap_or_else(|e| panic!("parse: {e}"));
    assert_eq!(profile.command, "claude");
    assert_eq!(profile.args, vec!["--verbose"]);
    assert_eq!(profile.submit_sequence, b"\r");
    assert_eq!(profile.env.get("FORCE_COLOR").map(String::as_str), Some("0"));
    assert_eq!(profile.idle_detection.strategy, IdleStrategy::Hybrid);
    assert_eq!(profile.idle_detection.pattern.as_deref(), Some(BRACKETED_PASTE_MODE));
    assert_eq!(profile.idle_detection.pattern_use, PatternUse::StartupOnly);
    assert_eq!(profile.waiting_regex.as_deref(), Some(r"\[y/n\]"));
}

#[test]
fn legacy_idle_regex_becomes_pattern_strategy() {
    let yaml = r#"
command: gemini
idle_regex: '> $'
"#;
    let profile = Profile::parse("gemini", yaml).unwrap_or_else(|e| panic!("parse: {e}"));
    assert_eq!(profile.idle_detection.strategy, IdleStrategy::Pattern);
    assert_eq!(profile.idle_detection.pattern.as_deref(), Some("> $"));
}

#[test]
fn idle_detection_wins_over_legacy_regex() {
    let yaml = r#"
command: x
idle_regex: 'ignored'
idle_detection:
  strategy: timeout
  timeout: 3.0
"#;
    let profile = Profile::parse("x", yaml).unwrap_or_else(|e| panic!("parse: {e}"));
    assert_eq!(profile.idle_detection.strategy, IdleStrategy::Timeout);
    assert!(profile.idle_detection.pattern.is_none());
    assert_eq!(profile.idle_detection.timeout_duration(), Duration::from_secs(3));
}

#[test]
fn missing_idle_config_defaults_to_timeout() {
    let profile =
        Profile::parse("bare", "command: sh\n").unwrap_or_else(|e| panic!("parse: {e}"));
    assert_eq!(profile.idle_detection.strategy, IdleStrategy::Timeout);
    assert_eq!(profile.submit_sequence, b"\n");
}

#[test]
fn non_mapping_document_rejected() {
    assert!(Profile::parse("bad", "- just\n- a list\n").is_err());
    assert!(Profile::parse("bad", "submit_sequence: nope\n").is_err());
}

#[parameterized(
    newline = { "\\n", b"\n".as_slice() },
    carriage_return = { "\\r", b"\r".as_slice() },
    tab_mix = { "a\\tb", b"a\tb".as_slice() },
    escape_byte = { "\\x1b[13;2u", b"\x1b[13;2u".as_slice() },
    esc_shorthand = { "\\e", b"\x1b".as_slice() },
    literal_backslash = { "\\\\n", b"\\n".as_slice() },
    plain = { "ok", b"ok".as_slice() },
    trailing_backslash = { "x\\", b"x\\".as_slice() },
)]
fn escape_decoding(input: &str, expected: &[u8]) {
    assert_eq!(decode_escapes(input), expected);
}

#[test]
fn built_in_profiles_parse() {
    let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("profiles");
    for name in ["claude", "gemini", "codex", "opencode", "copilot", "dummy"] {
        let raw = std::fs::read_to_string(dir.join(format!("{name}.yaml")))
            .unwrap_or_else(|e| panic!("read {name}: {e}"));
        let profile =
            Profile::parse(name, &raw).unwrap_or_else(|e| panic!("parse {name}: {e}"));
        assert!(!profile.command.is_empty(), "{name} has no command");
        assert!(!profile.submit_sequence.is_empty(), "{name} has no submit sequence");
    }
}
