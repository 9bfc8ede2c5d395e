// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::profile::IdleDetectionSpec;

fn spec(strategy: IdleStrategy, pattern: Option<&str>, pattern_use: PatternUse, timeout: f64) -> IdleDetectionSpec {
    IdleDetectionSpec {
        strategy,
        pattern: pattern.map(str::to_owned),
        pattern_use,
        timeout,
    }
}

fn screen_with(text: &[u8]) -> Screen {
    let mut screen = Screen::new(80, 24);
    screen.feed(text);
    screen
}

fn long_ago() -> Option<Instant> {
    Instant::now().checked_sub(Duration::from_secs(10))
}

#[test]
fn pattern_strategy_matches_rendered_tail() {
    let mut monitor =
        IdleMonitor::new(&spec(IdleStrategy::Pattern, Some("PROMPT:"), PatternUse::Always, 1.5));
    let screen = screen_with(b"user input\r\nPROMPT: ");
    assert!(monitor.is_ready(&screen, None));
}

#[test]
fn pattern_strategy_ignores_timeout() {
    let mut monitor =
        IdleMonitor::new(&spec(IdleStrategy::Pattern, Some("PROMPT:"), PatternUse::Always, 0.1));
    let screen = screen_with(b"still working...");
    // Output went quiet long ago, but the pattern never matched.
    assert!(!monitor.is_ready(&screen, long_ago()));
}

#[test]
fn timeout_strategy_needs_first_output() {
    let mut monitor = IdleMonitor::new(&spec(IdleStrategy::Timeout, None, PatternUse::Always, 0.5));
    let screen = screen_with(b"");
    // No output yet: never ready, however long we wait.
    assert!(!monitor.is_ready(&screen, None));
    // Once output has been seen and gone quiet, ready.
    assert!(monitor.is_ready(&screen, long_ago()));
    assert!(!monitor.is_ready(&screen, Some(Instant::now())));
}

#[test]
fn timeout_strategy_ignores_pattern() {
    let mut monitor =
        IdleMonitor::new(&spec(IdleStrategy::Timeout, Some("PROMPT:"), PatternUse::Always, 1.5));
    let screen = screen_with(b"PROMPT: ");
    assert!(!monitor.is_ready(&screen, Some(Instant::now())));
}

#[test]
fn hybrid_first_transition_requires_pattern() {
    let mut monitor = IdleMonitor::new(&spec(
        IdleStrategy::Hybrid,
        Some("PROMPT:"),
        PatternUse::StartupOnly,
        0.5,
    ));
    let screen = screen_with(b"booting...");
    // Quiet for ages, but the startup pattern hasn't appeared.
    assert!(!monitor.is_ready(&screen, long_ago()));

    let screen = screen_with(b"booted\r\nPROMPT: ");
    assert!(monitor.is_ready(&screen, Some(Instant::now())));

    // After the first match, timeout takes over; pattern is irrelevant.
    let screen = screen_with(b"no prompt here");
    assert!(monitor.is_ready(&screen, long_ago()));
    assert!(!monitor.is_ready(&screen, Some(Instant::now())));
}

#[test]
fn hybrid_always_keeps_pattern_effective() {
    let mut monitor =
        IdleMonitor::new(&spec(IdleStrategy::Hybrid, Some("PROMPT:"), PatternUse::Always, 5.0));
    let screen = screen_with(b"PROMPT: ");
    assert!(monitor.is_ready(&screen, Some(Instant::now())));
    // Pattern still works after the first match, even with fresh output.
    assert!(monitor.is_ready(&screen, Some(Instant::now())));
}

#[test]
fn bad_pattern_falls_back_to_timeout() {
    let mut monitor =
        IdleMonitor::new(&spec(IdleStrategy::Pattern, Some("([unclosed"), PatternUse::Always, 0.5));
    assert_eq!(monitor.strategy, IdleStrategy::Timeout);
    let screen = screen_with(b"whatever");
    assert!(monitor.is_ready(&screen, long_ago()));
}

#[test]
fn pattern_strategy_without_pattern_degrades() {
    let monitor = IdleMonitor::new(&spec(IdleStrategy::Pattern, None, PatternUse::Always, 0.5));
    assert_eq!(monitor.strategy, IdleStrategy::Timeout);
}

#[test]
fn bracketed_paste_literal_uses_raw_scan() {
    let mut monitor = IdleMonitor::new(&spec(
        IdleStrategy::Pattern,
        Some(BRACKETED_PASTE_MODE),
        PatternUse::Always,
        1.5,
    ));
    let mut screen = Screen::new(80, 24);
    screen.feed(b"starting up");
    assert!(!monitor.is_ready(&screen, None));
    screen.feed(b"\x1b[?2004h");
    assert!(monitor.is_ready(&screen, None));
    screen.feed(b"\x1b[?2004l");
    assert!(!monitor.is_ready(&screen, None));
}

#[test]
fn instruction_rendering_substitutes_placeholders() {
    let registry = std::sync::Arc::new(crate::registry::AgentRegistry::with_dir("/tmp/unused"));
    let controller = TerminalController::new(
        ControllerConfig {
            command: vec!["true".to_owned()],
            envs: vec![],
            submit_sequence: b"\n".to_vec(),
            idle: spec(IdleStrategy::Timeout, None, PatternUse::Always, 0.5),
            waiting_regex: None,
            identity: IdentityConfig {
                agent_id: "synapse-claude-8100".to_owned(),
                agent_type: "claude".to_owned(),
                port: 8100,
                name: Some("scout".to_owned()),
                role: Some("researcher".to_owned()),
                skill_set: None,
                instruction: Some(
                    "id={{agent_id}} name={{agent_name}} role={{agent_role}} port={{port}}"
                        .to_owned(),
                ),
                skip_initial_instructions: false,
            },
            cols: 80,
            rows: 24,
        },
        registry,
    );
    assert_eq!(
        controller.render_instruction(),
        "id=synapse-claude-8100 name=scout role=researcher port=8100"
    );
}

#[test]
fn status_starts_processing_and_gate_closed() {
    let tmp = tempfile::TempDir::new().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let controller = crate::test_support::idle_controller(tmp.path(), "synapse-dummy-8190", 8190);
    assert_eq!(controller.status(), AgentStatus::Processing);
    assert!(!controller.identity_sent());
    assert!(!*controller.subscribe_ready().borrow());
}

#[test]
fn skip_identity_opens_gate_on_first_ready() {
    let tmp = tempfile::TempDir::new().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let controller = crate::test_support::idle_controller(tmp.path(), "synapse-dummy-8190", 8190);
    controller.set_status(AgentStatus::Ready);
    assert!(controller.identity_sent());
    assert!(*controller.subscribe_ready().borrow());
}

#[test]
fn write_before_start_is_not_ready() {
    let tmp = tempfile::TempDir::new().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let controller = crate::test_support::idle_controller(tmp.path(), "synapse-dummy-8190", 8190);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| panic!("runtime: {e}"));
    let result = runtime.block_on(controller.write("hi"));
    assert!(matches!(result, Err(ControllerError::NotReady)));
}

#[test]
fn status_events_have_increasing_seq() {
    let tmp = tempfile::TempDir::new().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let controller = crate::test_support::idle_controller(tmp.path(), "synapse-dummy-8190", 8190);
    let rx = controller.subscribe_status();
    controller.set_status(AgentStatus::Ready);
    controller.set_status(AgentStatus::Processing);
    let event = *rx.borrow();
    assert_eq!(event.status, AgentStatus::Processing);
    assert!(event.seq >= 2);
}
