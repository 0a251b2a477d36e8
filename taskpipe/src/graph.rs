//! Task registration and connectivity.
//!
//! A [`TaskGraph`] holds named nodes and the directed producer → consumer
//! edges between them. Building the graph has no side effects beyond graph
//! mutation; nothing executes until the graph is handed to a pipeline.

use crate::errors::PipelineError;
use crate::task::Task;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A directed graph of named tasks with a fluent builder surface.
///
/// Linear chains are wired with [`add`](Self::add) / [`then`](Self::then);
/// fan-out and fan-in edges with [`register`](Self::register) /
/// [`connect`](Self::connect). The "current anchor" that `then` extends is an
/// explicit field, advanced on every `add` or `then`.
#[derive(Debug, Default)]
pub struct TaskGraph {
    tasks: HashMap<String, Arc<dyn Task>>,
    edges: HashMap<String, Vec<String>>,
    insertion_order: Vec<String>,
    anchor: Option<String>,
}

impl TaskGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `task` and anchors the next [`then`](Self::then) call on it.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DuplicateTask`] if the name is already
    /// registered.
    pub fn add(mut self, task: Arc<dyn Task>) -> Result<Self, PipelineError> {
        let name = task.name();
        self.insert_node(name.clone(), task)?;
        self.anchor = Some(name);
        Ok(self)
    }

    /// Registers `task` without touching the anchor.
    ///
    /// Use this for nodes wired exclusively through
    /// [`connect`](Self::connect).
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DuplicateTask`] if the name is already
    /// registered.
    pub fn register(mut self, task: Arc<dyn Task>) -> Result<Self, PipelineError> {
        self.insert_node(task.name(), task)?;
        Ok(self)
    }

    /// Extends the current linear chain with `task`.
    ///
    /// Registers `task` if it is not already present, adds an edge from the
    /// anchored task to it, and advances the anchor.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MissingAnchor`] if no task was added yet.
    pub fn then(mut self, task: Arc<dyn Task>) -> Result<Self, PipelineError> {
        let Some(from) = self.anchor.clone() else {
            return Err(PipelineError::MissingAnchor);
        };
        let to = task.name();
        self = self.connect(&from, task)?;
        self.anchor = Some(to);
        Ok(self)
    }

    /// Adds an explicit edge from the task named `from` to `to`.
    ///
    /// `to` is auto-registered if absent; the anchor is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnknownTask`] if `from` is not registered.
    pub fn connect(mut self, from: &str, to: Arc<dyn Task>) -> Result<Self, PipelineError> {
        let to_name = to.name();
        if !self.tasks.contains_key(&to_name) {
            self.insert_node(to_name.clone(), to)?;
        }

        let Some(successors) = self.edges.get_mut(from) else {
            return Err(PipelineError::UnknownTask(from.to_string()));
        };
        successors.push(to_name);
        Ok(self)
    }

    /// Looks up a registered task by name.
    #[must_use]
    pub fn task(&self, name: &str) -> Option<&Arc<dyn Task>> {
        self.tasks.get(name)
    }

    /// Whether a task with `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Registered task names, in registration order.
    #[must_use]
    pub fn task_names(&self) -> &[String] {
        &self.insertion_order
    }

    /// The direct successors of `name`, in edge-insertion order.
    #[must_use]
    pub fn successors(&self, name: &str) -> &[String] {
        match self.edges.get(name) {
            Some(successors) => successors,
            None => &[],
        }
    }

    /// The distinct direct predecessors of `name`, in registration order.
    #[must_use]
    pub fn predecessors_of(&self, name: &str) -> Vec<String> {
        self.insertion_order
            .iter()
            .filter(|candidate| self.successors(candidate).iter().any(|s| s == name))
            .cloned()
            .collect()
    }

    /// Tasks without successors, in registration order.
    #[must_use]
    pub fn sinks(&self) -> Vec<String> {
        self.insertion_order
            .iter()
            .filter(|name| self.successors(name).is_empty())
            .cloned()
            .collect()
    }

    /// Returns the number of registered tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true if no task is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn insert_node(&mut self, name: String, task: Arc<dyn Task>) -> Result<(), PipelineError> {
        if self.tasks.contains_key(&name) {
            return Err(PipelineError::DuplicateTask(name));
        }
        debug!(task = %name, "registering task");
        self.tasks.insert(name.clone(), task);
        self.edges.insert(name.clone(), Vec::new());
        self.insertion_order.push(name);
        Ok(())
    }
}
