// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::a2a::{FileRef, Part, Role};

fn task_with_parts(parts: Vec<Part>) -> Task {
    Task::new(Message { role: Role::User, parts }, HashMap::new())
}

#[test]
fn render_plain_text() {
    let task = task_with_parts(vec![Part::text("run the tests")]);
    assert_eq!(render_for_pty(&task), "run the tests");
}

#[test]
fn render_appends_file_references() {
    let task = task_with_parts(vec![
        Part::text("apply this patch"),
        Part::File {
            file: FileRef {
                path: "src/lib.rs".to_owned(),
                action: Some("modify".to_owned()),
                mime_type: None,
                content: None,
            },
        },
        Part::File {
            file: FileRef {
                path: "notes.md".to_owned(),
                action: None,
                mime_type: None,
                content: None,
            },
        },
    ]);
    assert_eq!(
        render_for_pty(&task),
        "apply this patch\n[file:modify] src/lib.rs\n[file] notes.md"
    );
}

#[test]
fn preview_truncates_long_messages() {
    let task = task_with_parts(vec![Part::text("x".repeat(200))]);
    let preview = preview_of(&task);
    assert_eq!(preview.chars().count(), 81);
    assert!(preview.ends_with('…'));

    let short = task_with_parts(vec![Part::text("short")]);
    assert_eq!(preview_of(&short), "short");
}

#[test]
fn sender_registration_populates_reply_stack() {
    let harness = crate::test_support::test_store();
    let mut metadata = HashMap::new();
    metadata.insert(
        "sender".to_owned(),
        serde_json::json!({
            "sender_id": "synapse-gemini-8110",
            "sender_endpoint": "http://127.0.0.1:8110",
            "sender_task_id": "t-1",
            "sender_uds_path": "/tmp/g.sock",
        }),
    );
    let task = harness.store.tasks.create(Message::user_text("hi"), metadata);
    register_sender(&harness.store, &task);

    let target = harness.store.replies.get("synapse-gemini-8110");
    assert_eq!(target.as_ref().map(|t| t.sender_endpoint.as_str()), Some("http://127.0.0.1:8110"));
    assert_eq!(
        target.and_then(|t| t.sender_uds_path).as_deref(),
        Some("/tmp/g.sock")
    );
}
