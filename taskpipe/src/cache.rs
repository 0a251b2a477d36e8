//! Per-input memoization of task results.
//!
//! The cache short-circuits re-execution of cacheable tasks: a hit returns
//! the previously computed value and the task body never runs again. Entries
//! live as long as the owning pipeline; there is no eviction and no TTL.

use crate::task::TaskInput;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

/// Key identifying one memoized task invocation.
///
/// Keys compare and hash by the *value* of the input, so two invocations of
/// the same task with equal inputs resolve to the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    task: String,
    input: TaskInput,
}

impl CacheKey {
    /// Creates a key for one `(task, input)` pair.
    #[must_use]
    pub fn new(task: impl Into<String>, input: TaskInput) -> Self {
        Self {
            task: task.into(),
            input,
        }
    }

    /// The task name this key belongs to.
    #[must_use]
    pub fn task(&self) -> &str {
        &self.task
    }
}

/// A thread-safe memoization table shared by every node of a pipeline.
///
/// Cloning produces another handle to the same table.
#[derive(Debug, Clone, Default)]
pub struct ResultCache {
    entries: Arc<DashMap<CacheKey, Value>>,
}

impl ResultCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the memoized value for `key`.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Stores `value` under `key`, replacing any previous entry.
    pub fn put(&self, key: CacheKey, value: Value) {
        self.entries.insert(key, value);
    }

    /// Returns the number of memoized entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been memoized yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
