//! Error types for the taskpipe engine.
//!
//! Two families share one enum: configuration errors, raised synchronously
//! while the graph is being built or validated, and execution failures,
//! surfaced through the asynchronous result of the failing node. The enum is
//! `Clone` so a single failure value can be delivered to every dependent of
//! the node that produced it.

use std::sync::Arc;
use thiserror::Error;

/// The error type for pipeline construction and execution.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// A task name was registered twice in the same graph.
    #[error("task '{0}' has already been added")]
    DuplicateTask(String),

    /// `then` was called before any task was added.
    #[error("'then' requires an anchor task; call 'add' first")]
    MissingAnchor,

    /// A task name was referenced but never registered.
    #[error("task '{0}' is not registered in the graph")]
    UnknownTask(String),

    /// The graph contains a dependency cycle.
    #[error("cycle detected in task graph; unresolved tasks: {}", unresolved.join(", "))]
    CycleDetected {
        /// Tasks that could not be scheduled because of the cycle.
        unresolved: Vec<String>,
    },

    /// The graph has several sink tasks, so `run` cannot pick a terminal.
    #[error("graph has multiple sinks ({}); name the terminal with 'run_to' or use 'run_all'", sinks.join(", "))]
    AmbiguousTerminal {
        /// Every sink task, in registration order.
        sinks: Vec<String>,
    },

    /// A task body returned an error.
    #[error("task '{task}' failed: {cause}")]
    TaskFailed {
        /// The task whose body failed.
        task: String,
        /// The failure the task reported.
        cause: Arc<anyhow::Error>,
    },

    /// A spawned task aborted before producing a result.
    #[error("task '{task}' panicked during execution")]
    TaskPanicked {
        /// The task whose worker aborted.
        task: String,
    },
}

impl PipelineError {
    /// Wraps a task-body failure with the name of the failing task.
    #[must_use]
    pub fn task_failed(task: impl Into<String>, cause: anyhow::Error) -> Self {
        Self::TaskFailed {
            task: task.into(),
            cause: Arc::new(cause),
        }
    }

    /// The name of the task an execution failure originated from.
    ///
    /// Returns `None` for configuration errors, which are not tied to a
    /// single task.
    #[must_use]
    pub fn failed_task(&self) -> Option<&str> {
        match self {
            Self::TaskFailed { task, .. } | Self::TaskPanicked { task } => Some(task),
            _ => None,
        }
    }

    /// Whether this error was raised before any task executed.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::DuplicateTask(_)
                | Self::MissingAnchor
                | Self::UnknownTask(_)
                | Self::CycleDetected { .. }
                | Self::AmbiguousTerminal { .. }
        )
    }
}
