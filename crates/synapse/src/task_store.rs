// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory A2A task store.
//!
//! Keyed by full UUID with case-insensitive unique-prefix lookup. Status
//! transitions are monotonic into the terminal states; the store is capped
//! to bound memory, evicting terminal tasks before live ones.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::a2a::{Artifact, Message, Task, TaskState};

/// Maximum retained tasks before eviction kicks in.
const MAX_TASKS: usize = 1000;

/// Lookup failure, distinguishing an unknown id from an ambiguous prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    NotFound,
    /// The prefix matched `matches` tasks.
    Ambiguous { matches: usize },
}

/// Errors from store mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    UnknownTask,
    /// Attempted transition out of a terminal state.
    Frozen { current: TaskState },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownTask => f.write_str("unknown task"),
            Self::Frozen { current } => write!(f, "task is terminal ({current})"),
        }
    }
}

impl std::error::Error for StoreError {}

struct Inner {
    tasks: HashMap<String, Task>,
    /// Insertion order for eviction.
    order: Vec<String>,
}

/// Thread-safe task map; a single mutex is sufficient at these sizes.
pub struct TaskStore {
    inner: Mutex<Inner>,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStore {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner { tasks: HashMap::new(), order: Vec::new() }) }
    }

    /// Create a task in `submitted` state.
    pub fn create(
        &self,
        message: Message,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Task {
        let task = Task::new(message, metadata);
        let mut inner = self.inner.lock();
        inner.order.push(task.id.clone());
        inner.tasks.insert(task.id.clone(), task.clone());
        Self::evict(&mut inner);
        task
    }

    /// Exact lookup by full id.
    pub fn get(&self, id: &str) -> Option<Task> {
        self.inner.lock().tasks.get(id).cloned()
    }

    /// Case-insensitive unique-prefix lookup.
    ///
    /// A 36-char query is treated as a full id. Shorter queries scan the
    /// store: exactly one match returns the task, zero is `NotFound`, more
    /// than one is `Ambiguous`.
    pub fn get_by_prefix(&self, query: &str) -> Result<Task, LookupError> {
        if query.is_empty() {
            return Err(LookupError::NotFound);
        }
        let needle = query.to_lowercase();
        let inner = self.inner.lock();
        if needle.len() >= 36 {
            return inner.tasks.get(&needle).cloned().ok_or(LookupError::NotFound);
        }
        let mut matches = inner.tasks.values().filter(|t| t.id.starts_with(&needle));
        let first = matches.next();
        let rest = matches.count();
        match (first, rest) {
            (Some(task), 0) => Ok(task.clone()),
            (Some(_), n) => Err(LookupError::Ambiguous { matches: n + 1 }),
            (None, _) => Err(LookupError::NotFound),
        }
    }

    /// Transition a task's status. Terminal states are frozen.
    pub fn update_status(&self, id: &str, status: TaskState) -> Result<Task, StoreError> {
        let mut inner = self.inner.lock();
        let task = inner.tasks.get_mut(id).ok_or(StoreError::UnknownTask)?;
        if task.status.is_terminal() && task.status != status {
            return Err(StoreError::Frozen { current: task.status });
        }
        task.status = status;
        task.updated_at = chrono::Utc::now();
        Ok(task.clone())
    }

    /// Append an artifact, preserving order; its index is its position.
    pub fn add_artifact(&self, id: &str, parts: Vec<crate::a2a::Part>) -> Result<Task, StoreError> {
        let mut inner = self.inner.lock();
        let task = inner.tasks.get_mut(id).ok_or(StoreError::UnknownTask)?;
        let index = task.artifacts.len();
        task.artifacts.push(Artifact { index, parts });
        task.updated_at = chrono::Utc::now();
        Ok(task.clone())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().tasks.is_empty()
    }

    /// Drop tasks beyond [`MAX_TASKS`], terminal tasks first, then oldest.
    fn evict(inner: &mut Inner) {
        while inner.tasks.len() > MAX_TASKS {
            let victim = inner
                .order
                .iter()
                .position(|id| inner.tasks.get(id).map(|t| t.status.is_terminal()).unwrap_or(true))
                .unwrap_or(0);
            let id = inner.order.remove(victim);
            inner.tasks.remove(&id);
        }
    }
}

#[cfg(test)]
#[path = "task_store_tests.rs"]
mod tests;
