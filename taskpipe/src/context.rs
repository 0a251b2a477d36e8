//! Shared per-run context.
//!
//! A pipeline run creates one [`PipelineContext`] and hands it to every task
//! invocation. It carries cross-cutting data that does not flow through the
//! graph edges; it is storage only, not a synchronization primitive.

use dashmap::DashMap;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A concurrently shared, typed key/value scratch space.
///
/// Cloning the context produces another handle to the same underlying store,
/// so all concurrently executing tasks observe each other's entries. Reads
/// are typed: a missing key and a type mismatch both yield `None`.
#[derive(Clone, Default)]
pub struct PipelineContext {
    entries: Arc<DashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl PipelineContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value under `key`, replacing any previous entry.
    pub fn put<T: Send + Sync + 'static>(&self, key: impl Into<String>, value: T) {
        self.entries.insert(key.into(), Arc::new(value));
    }

    /// Retrieves a clone of the value stored under `key`.
    ///
    /// Returns `None` when the key is absent or the stored value is not a
    /// `T` — a mismatch is not an error.
    #[must_use]
    pub fn get<T: Clone + Send + Sync + 'static>(&self, key: &str) -> Option<T> {
        let entry = self.entries.get(key)?;
        entry.value().as_ref().downcast_ref::<T>().cloned()
    }

    /// Whether any value is stored under `key`.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Removes the value stored under `key`.
    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the context holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineContext")
            .field("entries", &self.entries.len())
            .finish()
    }
}
