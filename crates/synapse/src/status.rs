// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How long a `Done` status sticks before relaxing back to `Ready`.
pub const DONE_RELAX: Duration = Duration::from_secs(10);

/// Classified activity state of the wrapped CLI.
///
/// Flow: `Processing -> Ready/Waiting -> Processing -> ... -> Done -> Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentStatus {
    /// Actively producing output or handling a request.
    Processing,
    /// Idle at its prompt, accepting typed input.
    Ready,
    /// Blocked on a user choice (`[y/n]`, `Press Enter`, ...).
    Waiting,
    /// Completed a task; sticky for [`DONE_RELAX`], then `Ready`.
    Done,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "PROCESSING",
            Self::Ready => "READY",
            Self::Waiting => "WAITING",
            Self::Done => "DONE",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AgentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PROCESSING" => Ok(Self::Processing),
            "READY" => Ok(Self::Ready),
            "WAITING" => Ok(Self::Waiting),
            "DONE" => Ok(Self::Done),
            other => anyhow::bail!("invalid agent status: {other}"),
        }
    }
}
