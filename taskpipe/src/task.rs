//! Task trait and input model.
//!
//! Tasks are the fundamental units of work in a taskpipe graph. The engine
//! treats their inputs and outputs as opaque JSON values and never interprets
//! what a task does.

use crate::context::PipelineContext;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Debug;

/// The input handed to a task when it executes.
///
/// A task with no predecessors receives the pipeline's initial input, a task
/// with exactly one predecessor receives that predecessor's raw output, and a
/// fan-in task receives the outputs of all of its predecessors keyed by the
/// producing task's name. Consumers pattern-match on the variant instead of
/// downcasting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskInput {
    /// A single upstream value, or the initial pipeline input.
    Single(Value),
    /// One value per predecessor, keyed by the producing task's name.
    Fanned(BTreeMap<String, Value>),
}

impl TaskInput {
    /// Borrows the single upstream value, if this is not a fan-in input.
    #[must_use]
    pub fn as_single(&self) -> Option<&Value> {
        match self {
            Self::Single(value) => Some(value),
            Self::Fanned(_) => None,
        }
    }

    /// Consumes the input, returning the single upstream value.
    #[must_use]
    pub fn into_single(self) -> Option<Value> {
        match self {
            Self::Single(value) => Some(value),
            Self::Fanned(_) => None,
        }
    }

    /// Borrows the output of one named predecessor in a fan-in input.
    #[must_use]
    pub fn get(&self, producer: &str) -> Option<&Value> {
        match self {
            Self::Single(_) => None,
            Self::Fanned(values) => values.get(producer),
        }
    }

    /// Whether this input combines several predecessor outputs.
    #[must_use]
    pub fn is_fanned(&self) -> bool {
        matches!(self, Self::Fanned(_))
    }
}

impl From<Value> for TaskInput {
    fn from(value: Value) -> Self {
        Self::Single(value)
    }
}

/// An asynchronous unit of work that can be part of a pipeline.
///
/// A task owns no pipeline state; it is pure behavior plus whatever
/// configuration it was constructed with. The graph references tasks behind
/// `Arc` and never mutates them.
#[async_trait]
pub trait Task: Send + Sync + Debug {
    /// The task's name, unique within a graph.
    ///
    /// Defaults to the implementing type's identifier; override it to run
    /// several instances of one type in the same graph.
    fn name(&self) -> String {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full).to_owned()
    }

    /// Whether results of this task may be memoized per input value.
    fn cacheable(&self) -> bool {
        false
    }

    /// Executes the task.
    ///
    /// # Errors
    ///
    /// Any failure is reported to the caller of `run` wrapped with this
    /// task's name; the engine performs no retries.
    async fn execute(&self, input: TaskInput, ctx: &PipelineContext) -> anyhow::Result<Value>;
}

/// A task backed by a synchronous closure.
pub struct FnTask<F>
where
    F: Fn(TaskInput, &PipelineContext) -> anyhow::Result<Value> + Send + Sync,
{
    name: String,
    cacheable: bool,
    func: F,
}

impl<F> FnTask<F>
where
    F: Fn(TaskInput, &PipelineContext) -> anyhow::Result<Value> + Send + Sync,
{
    /// Creates a new closure-backed task with an explicit name.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            cacheable: false,
            func,
        }
    }

    /// Marks the task's results as memoizable per input value.
    #[must_use]
    pub fn with_cacheable(mut self, cacheable: bool) -> Self {
        self.cacheable = cacheable;
        self
    }
}

impl<F> Debug for FnTask<F>
where
    F: Fn(TaskInput, &PipelineContext) -> anyhow::Result<Value> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTask")
            .field("name", &self.name)
            .field("cacheable", &self.cacheable)
            .finish()
    }
}

#[async_trait]
impl<F> Task for FnTask<F>
where
    F: Fn(TaskInput, &PipelineContext) -> anyhow::Result<Value> + Send + Sync,
{
    fn name(&self) -> String {
        self.name.clone()
    }

    fn cacheable(&self) -> bool {
        self.cacheable
    }

    async fn execute(&self, input: TaskInput, ctx: &PipelineContext) -> anyhow::Result<Value> {
        (self.func)(input, ctx)
    }
}

/// A task backed by an asynchronous closure.
///
/// The closure receives the context by value; `PipelineContext` is a cheap
/// handle over shared state, so the clone does not copy the stored entries.
pub struct AsyncFnTask<F, Fut>
where
    F: Fn(TaskInput, PipelineContext) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = anyhow::Result<Value>> + Send,
{
    name: String,
    cacheable: bool,
    func: F,
    _phantom: std::marker::PhantomData<fn() -> Fut>,
}

impl<F, Fut> AsyncFnTask<F, Fut>
where
    F: Fn(TaskInput, PipelineContext) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = anyhow::Result<Value>> + Send,
{
    /// Creates a new async closure-backed task with an explicit name.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            cacheable: false,
            func,
            _phantom: std::marker::PhantomData,
        }
    }

    /// Marks the task's results as memoizable per input value.
    #[must_use]
    pub fn with_cacheable(mut self, cacheable: bool) -> Self {
        self.cacheable = cacheable;
        self
    }
}

impl<F, Fut> Debug for AsyncFnTask<F, Fut>
where
    F: Fn(TaskInput, PipelineContext) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = anyhow::Result<Value>> + Send,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncFnTask")
            .field("name", &self.name)
            .field("cacheable", &self.cacheable)
            .finish()
    }
}

#[async_trait]
impl<F, Fut> Task for AsyncFnTask<F, Fut>
where
    F: Fn(TaskInput, PipelineContext) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = anyhow::Result<Value>> + Send,
{
    fn name(&self) -> String {
        self.name.clone()
    }

    fn cacheable(&self) -> bool {
        self.cacheable
    }

    async fn execute(&self, input: TaskInput, ctx: &PipelineContext) -> anyhow::Result<Value> {
        (self.func)(input, ctx.clone()).await
    }
}
