// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PTY plumbing: non-blocking master I/O and child process spawning.

pub mod nbio;
pub mod spawn;

use serde::{Deserialize, Serialize};

/// Exit status of the wrapped child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitStatus {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}
