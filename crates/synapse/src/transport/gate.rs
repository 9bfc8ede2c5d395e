// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Readiness gate for write-bearing endpoints.
//!
//! Until the controller's identity injection has completed (or been
//! skipped), writes would race the handshake and corrupt the child's first
//! prompt. Gated handlers hold the request for a bounded wait, then give
//! up with 503 and a `Retry-After` hint.

use std::time::Duration;

use crate::controller::TerminalController;
use crate::error::ErrorCode;

/// Longest a gated request is held before 503.
pub const GATE_WAIT: Duration = Duration::from_secs(5);

/// Suggested client retry delay, in seconds.
pub const RETRY_AFTER_SECS: u64 = 1;

/// Wait for the identity handshake, bounded by [`GATE_WAIT`].
pub async fn wait_ready(controller: &TerminalController) -> Result<(), ErrorCode> {
    if controller.identity_sent() {
        return Ok(());
    }
    let mut rx = controller.subscribe_ready();
    let wait = async {
        loop {
            if *rx.borrow() {
                return Ok(());
            }
            if rx.changed().await.is_err() {
                // Controller dropped; report not-ready rather than hanging.
                return Err(ErrorCode::NotReady);
            }
        }
    };
    match tokio::time::timeout(GATE_WAIT, wait).await {
        Ok(result) => result,
        Err(_elapsed) => Err(ErrorCode::NotReady),
    }
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
