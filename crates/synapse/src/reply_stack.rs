// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-sender reply targets.
//!
//! Each inbound task that carries sender metadata records "who asked me
//! last" under its sender id. Reply routing reads entries two ways:
//! `get(key)` is non-destructive (synchronous reply paths), `pop()` without
//! a key removes and returns the most recently set entry across all keys
//! (catch-all dispatch).

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Where to send a reply for one sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyTarget {
    pub sender_endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_uds_path: Option<String>,
}

struct Inner {
    targets: HashMap<String, ReplyTarget>,
    /// Keys ordered oldest-to-newest; `set` moves a key to the back.
    recency: Vec<String>,
}

/// Thread-safe keyed store with LIFO semantics for key-less pops.
pub struct ReplyStack {
    inner: Mutex<Inner>,
}

impl Default for ReplyStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplyStack {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner { targets: HashMap::new(), recency: Vec::new() }) }
    }

    /// Record (or overwrite) the reply target for a sender.
    pub fn set(&self, sender_id: &str, target: ReplyTarget) {
        let mut inner = self.inner.lock();
        inner.recency.retain(|k| k != sender_id);
        inner.recency.push(sender_id.to_owned());
        inner.targets.insert(sender_id.to_owned(), target);
    }

    /// Look up a sender's target without removing it.
    pub fn get(&self, sender_id: &str) -> Option<ReplyTarget> {
        self.inner.lock().targets.get(sender_id).cloned()
    }

    /// Remove and return a specific sender's target.
    pub fn pop(&self, sender_id: &str) -> Option<ReplyTarget> {
        let mut inner = self.inner.lock();
        let target = inner.targets.remove(sender_id)?;
        inner.recency.retain(|k| k != sender_id);
        Some(target)
    }

    /// Remove and return the most recently set target across all keys.
    pub fn pop_last(&self) -> Option<ReplyTarget> {
        let mut inner = self.inner.lock();
        let key = inner.recency.pop()?;
        inner.targets.remove(&key)
    }

    /// Most recently set target without removing it.
    pub fn peek_last(&self) -> Option<ReplyTarget> {
        let inner = self.inner.lock();
        let key = inner.recency.last()?;
        inner.targets.get(key).cloned()
    }

    /// All sender ids currently tracked, oldest first.
    pub fn senders(&self) -> Vec<String> {
        self.inner.lock().recency.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().targets.is_empty()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.targets.clear();
        inner.recency.clear();
    }
}

#[cfg(test)]
#[path = "reply_stack_tests.rs"]
mod tests;
