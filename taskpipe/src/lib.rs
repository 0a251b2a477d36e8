//! # Taskpipe
//!
//! An asynchronous task pipeline that executes a dependency graph of named
//! tasks.
//!
//! Taskpipe organizes units of work into a directed acyclic graph and runs
//! them with:
//!
//! - **Dependency-ordered execution**: a topological order is validated on
//!   every run, before anything executes
//! - **Concurrent branches**: independent nodes run in parallel; a node
//!   starts as soon as all of its predecessors finish
//! - **Fan-in inputs**: multi-predecessor nodes receive a tagged map of
//!   upstream outputs to pattern-match on
//! - **Per-input memoization**: tasks that opt in skip re-execution for
//!   value-equal inputs
//! - **Shared context**: a typed key/value scratch space for data that does
//!   not flow through the graph edges
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use taskpipe::prelude::*;
//!
//! // Wire a linear chain with a fan-out branch
//! let graph = TaskGraph::new()
//!     .add(crawl)?
//!     .then(analyze)?
//!     .connect("analyze", write)?;
//!
//! // Execute the pipeline
//! let output = TaskPipeline::new(graph).run(input).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cache;
pub mod context;
pub mod errors;
pub mod executor;
pub mod graph;
pub mod scheduler;
pub mod task;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cache::{CacheKey, ResultCache};
    pub use crate::context::PipelineContext;
    pub use crate::errors::PipelineError;
    pub use crate::executor::TaskPipeline;
    pub use crate::graph::TaskGraph;
    pub use crate::task::{AsyncFnTask, FnTask, Task, TaskInput};
}
