// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn part_wire_format_is_tagged() {
    let part = Part::text("hi");
    let json = serde_json::to_value(&part).unwrap_or_default();
    assert_eq!(json["type"], "text");
    assert_eq!(json["text"], "hi");

    let file = Part::File {
        file: FileRef {
            path: "src/main.rs".to_owned(),
            action: Some("created".to_owned()),
            mime_type: None,
            content: None,
        },
    };
    let json = serde_json::to_value(&file).unwrap_or_default();
    assert_eq!(json["type"], "file");
    assert_eq!(json["file"]["path"], "src/main.rs");
    assert!(json["file"].get("mimeType").is_none());
}

#[test]
fn part_roundtrip() {
    let raw = r#"{"type":"data","data":{"k":1}}"#;
    let part: Part = serde_json::from_str(raw).unwrap_or_else(|e| panic!("parse: {e}"));
    match part {
        Part::Data { ref data } => assert_eq!(data["k"], 1),
        other => panic!("expected data part, got {other:?}"),
    }
}

#[test]
fn unknown_part_type_rejected() {
    let raw = r#"{"type":"video","url":"x"}"#;
    assert!(serde_json::from_str::<Part>(raw).is_err());
}

#[test]
fn message_text_concatenates_text_parts() {
    let message = Message {
        role: Role::User,
        parts: vec![
            Part::text("one"),
            Part::Data { data: serde_json::json!({}) },
            Part::text("two"),
        ],
    };
    assert_eq!(message.text(), "one\ntwo");
}

#[test]
fn task_state_terminality() {
    for state in [TaskState::Completed, TaskState::Failed, TaskState::Canceled] {
        assert!(state.is_terminal(), "{state} should be terminal");
    }
    for state in [TaskState::Submitted, TaskState::Working, TaskState::InputRequired] {
        assert!(!state.is_terminal(), "{state} should not be terminal");
    }
}

#[test]
fn sender_metadata_parses() {
    let mut metadata = HashMap::new();
    metadata.insert(
        "sender".to_owned(),
        serde_json::json!({
            "sender_id": "synapse-claude-8100",
            "sender_endpoint": "http://127.0.0.1:8100",
            "sender_task_id": "abc",
        }),
    );
    metadata.insert("response_expected".to_owned(), serde_json::json!(true));
    let task = Task::new(Message::user_text("hi"), metadata);

    let sender = task.sender();
    assert_eq!(sender.as_ref().map(|s| s.sender_id.as_str()), Some("synapse-claude-8100"));
    assert_eq!(sender.and_then(|s| s.sender_task_id).as_deref(), Some("abc"));
    assert!(task.response_expected());
    assert!(task.in_reply_to().is_none());
}

#[test]
fn malformed_sender_is_none() {
    let mut metadata = HashMap::new();
    metadata.insert("sender".to_owned(), serde_json::json!("not an object"));
    let task = Task::new(Message::user_text("hi"), metadata);
    assert!(task.sender().is_none());
    assert!(!task.response_expected());
}
