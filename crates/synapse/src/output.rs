// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output post-processing: error classification, input-required detection,
//! and artifact segmentation.
//!
//! This is the pluggable stage between the raw agent output and the A2A
//! task model. Classification drives the completed-vs-failed status of a
//! reply task and the webhook event that fires for it.

use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};

use crate::a2a::{FileRef, Part, TaskState};

/// A classified error found in agent output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputError {
    pub code: &'static str,
    pub message: &'static str,
    /// Up to ~100 chars of output surrounding the match.
    pub context: String,
}

/// Only the trailing portion of output is scanned, so stale error mentions
/// from earlier in the session don't poison fresh results.
const SCAN_WINDOW: usize = 3000;

/// Ordered error patterns; more specific entries come first, the generic
/// `error:` catch-all last.
const ERROR_PATTERNS: &[(&str, &str, &str)] = &[
    (r"command not found", "COMMAND_NOT_FOUND", "Command not found"),
    (r"permission denied", "PERMISSION_DENIED", "Permission denied"),
    (r"no such file or directory", "FILE_NOT_FOUND", "File or directory not found"),
    (r"connection refused", "CONNECTION_REFUSED", "Connection refused"),
    (r"timeout|timed out", "TIMEOUT", "Operation timed out"),
    (r"rate limit|too many requests", "RATE_LIMITED", "Rate limit exceeded"),
    (r"unauthorized|authentication failed", "AUTH_ERROR", "Authentication failed"),
    (r"api error|api failure", "API_ERROR", "API error"),
    (r"I cannot|I can't|I'm unable to|I am unable to", "AGENT_REFUSED", "Agent refused the request"),
    (r"I don't have|I do not have", "AGENT_CAPABILITY_MISSING", "Agent lacks required capability"),
    (r"not allowed|not permitted", "NOT_PERMITTED", "Action not permitted"),
    (r"\bfatal\b[:\s]", "FATAL_ERROR", "Fatal error occurred"),
    (r"\bexception\b[:\s]", "EXCEPTION", "Exception occurred"),
    (r"\bfailed\b[:\s]", "EXECUTION_FAILED", "Execution failed"),
    (r"\berror\b[:\s]", "CLI_ERROR", "CLI reported an error"),
];

/// Patterns that indicate the CLI is waiting for user input, matched
/// against the last rendered lines.
const INPUT_REQUIRED_PATTERNS: &[&str] = &[
    r"\?\s*$",
    r"\[y/n\]\s*$",
    r"\[yes/no\]\s*$",
    r"enter\s+.*:\s*$",
    r"please\s+(provide|enter|input|specify)",
    r"waiting\s+for\s+input",
    r"press\s+(enter|any key)",
    r"continue\?\s*$",
];

fn error_regexes() -> &'static Vec<(Regex, &'static str, &'static str)> {
    static CELL: OnceLock<Vec<(Regex, &'static str, &'static str)>> = OnceLock::new();
    CELL.get_or_init(|| {
        ERROR_PATTERNS
            .iter()
            .filter_map(|(pat, code, msg)| {
                RegexBuilder::new(pat)
                    .case_insensitive(true)
                    .build()
                    .ok()
                    .map(|re| (re, *code, *msg))
            })
            .collect()
    })
}

fn input_required_regexes() -> &'static Vec<Regex> {
    static CELL: OnceLock<Vec<Regex>> = OnceLock::new();
    CELL.get_or_init(|| {
        INPUT_REQUIRED_PATTERNS
            .iter()
            .filter_map(|pat| RegexBuilder::new(pat).case_insensitive(true).build().ok())
            .collect()
    })
}

/// Scan the trailing output window for a known error pattern.
pub fn detect_error(output: &str) -> Option<OutputError> {
    if output.is_empty() {
        return None;
    }
    let start = output.char_indices().rev().nth(SCAN_WINDOW - 1).map(|(i, _)| i).unwrap_or(0);
    let recent = &output[start..];

    for (re, code, message) in error_regexes() {
        if let Some(m) = re.find(recent) {
            let ctx_start = recent[..m.start()]
                .char_indices()
                .rev()
                .nth(49)
                .map(|(i, _)| i)
                .unwrap_or(0);
            let ctx_end = recent[m.end()..]
                .char_indices()
                .nth(50)
                .map(|(i, _)| m.end() + i)
                .unwrap_or(recent.len());
            return Some(OutputError {
                code,
                message,
                context: recent[ctx_start..ctx_end].trim().to_owned(),
            });
        }
    }
    None
}

/// Resolve a finished task's terminal state from its output.
pub fn detect_task_status(output: &str) -> (TaskState, Option<OutputError>) {
    match detect_error(output) {
        Some(err) => (TaskState::Failed, Some(err)),
        None => (TaskState::Completed, None),
    }
}

/// Whether the last rendered lines look like a prompt for user input.
pub fn is_input_required(output: &str) -> bool {
    if output.is_empty() {
        return false;
    }
    let tail: Vec<&str> = output.trim_end().lines().rev().take(3).collect();
    let last_content: String = tail.into_iter().rev().collect::<Vec<_>>().join("\n");
    input_required_regexes().iter().any(|re| re.is_match(&last_content))
}

/// Split agent output into ordered artifact parts.
///
/// Fenced code blocks become data parts tagged with their language, file
/// actions become file parts, everything else text. Deliberately minimal:
/// the full parser is an external collaborator.
pub fn parse_artifact_parts(output: &str) -> Vec<Part> {
    let mut parts = Vec::new();
    if output.trim().is_empty() {
        return parts;
    }

    static FENCE: OnceLock<Regex> = OnceLock::new();
    let fence = FENCE.get_or_init(|| {
        #[allow(clippy::unwrap_used)] // static pattern, exercised by tests
        Regex::new(r"(?s)```(\w*)\n(.*?)```").unwrap()
    });

    let mut cursor = 0;
    for caps in fence.captures_iter(output) {
        #[allow(clippy::unwrap_used)] // group 0 always exists
        let whole = caps.get(0).unwrap();
        let before = &output[cursor..whole.start()];
        if !before.trim().is_empty() {
            push_text_and_files(&mut parts, before);
        }
        let lang = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let code = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        parts.push(Part::Data {
            data: serde_json::json!({ "kind": "code", "language": lang, "content": code }),
        });
        cursor = whole.end();
    }
    let rest = &output[cursor..];
    if !rest.trim().is_empty() {
        push_text_and_files(&mut parts, rest);
    }
    parts
}

/// File action references like `created 'src/main.rs'`.
fn push_text_and_files(parts: &mut Vec<Part>, text: &str) {
    static FILE_ACTION: OnceLock<Regex> = OnceLock::new();
    let re = FILE_ACTION.get_or_init(|| {
        #[allow(clippy::unwrap_used)] // static pattern, exercised by tests
        RegexBuilder::new(
            r#"(created|wrote|saved|generated|modified|updated|deleted|removed)\s+(?:file\s+)?[`"']([^`"']+)[`"']"#,
        )
        .case_insensitive(true)
        .build()
        .unwrap()
    });

    parts.push(Part::text(text.trim()));
    for caps in re.captures_iter(text) {
        let action = caps.get(1).map(|m| m.as_str().to_lowercase());
        if let Some(path) = caps.get(2) {
            parts.push(Part::File {
                file: FileRef {
                    path: path.as_str().to_owned(),
                    action,
                    mime_type: None,
                    content: None,
                },
            });
        }
    }
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
