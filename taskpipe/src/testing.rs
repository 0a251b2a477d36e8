//! Mock tasks for exercising pipelines in tests.

use crate::context::PipelineContext;
use crate::task::{Task, TaskInput};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::time::Duration;

/// A task that returns a fixed value, ignoring its input.
#[derive(Debug, Clone)]
pub struct ConstTask {
    name: String,
    value: Value,
}

impl ConstTask {
    /// Creates a task that always yields `value`.
    #[must_use]
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

#[async_trait]
impl Task for ConstTask {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn execute(&self, _input: TaskInput, _ctx: &PipelineContext) -> anyhow::Result<Value> {
        Ok(self.value.clone())
    }
}

/// A task that sleeps before echoing its single input.
#[derive(Debug, Clone)]
pub struct DelayTask {
    name: String,
    delay: Duration,
}

impl DelayTask {
    /// Creates a task that sleeps for `delay` and then passes its input on.
    #[must_use]
    pub fn new(name: impl Into<String>, delay: Duration) -> Self {
        Self {
            name: name.into(),
            delay,
        }
    }
}

#[async_trait]
impl Task for DelayTask {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn execute(&self, input: TaskInput, _ctx: &PipelineContext) -> anyhow::Result<Value> {
        tokio::time::sleep(self.delay).await;
        Ok(input.into_single().unwrap_or(Value::Null))
    }
}

/// A task that always fails with a fixed message.
#[derive(Debug, Clone)]
pub struct FailTask {
    name: String,
    message: String,
}

impl FailTask {
    /// Creates a task that fails with `message`.
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Task for FailTask {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn execute(&self, _input: TaskInput, _ctx: &PipelineContext) -> anyhow::Result<Value> {
        Err(anyhow::anyhow!(self.message.clone()))
    }
}

/// A task that records every invocation and returns a fixed value.
///
/// Keep a second `Arc` to the task to inspect [`call_count`](Self::call_count)
/// and [`recorded_inputs`](Self::recorded_inputs) after a run.
#[derive(Debug)]
pub struct RecordingTask {
    name: String,
    value: Value,
    cacheable: bool,
    call_count: Mutex<usize>,
    inputs: Mutex<Vec<TaskInput>>,
}

impl RecordingTask {
    /// Creates a recording task yielding `value` on every call.
    #[must_use]
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            cacheable: false,
            call_count: Mutex::new(0),
            inputs: Mutex::new(Vec::new()),
        }
    }

    /// Marks the task's results as memoizable per input value.
    #[must_use]
    pub fn with_cacheable(mut self, cacheable: bool) -> Self {
        self.cacheable = cacheable;
        self
    }

    /// Returns how many times the task body ran.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.call_count.lock()
    }

    /// Returns the inputs the task body received, in call order.
    #[must_use]
    pub fn recorded_inputs(&self) -> Vec<TaskInput> {
        self.inputs.lock().clone()
    }
}

#[async_trait]
impl Task for RecordingTask {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn cacheable(&self) -> bool {
        self.cacheable
    }

    async fn execute(&self, input: TaskInput, _ctx: &PipelineContext) -> anyhow::Result<Value> {
        *self.call_count.lock() += 1;
        self.inputs.lock().push(input);
        Ok(self.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn test_const_task_ignores_input() {
        let task = ConstTask::new("fixed", json!("value"));
        let ctx = PipelineContext::new();

        let out = task.execute(TaskInput::Single(json!(123)), &ctx).await;
        assert_eq!(out.ok(), Some(json!("value")));
    }

    #[tokio::test]
    async fn test_fail_task_reports_message() {
        let task = FailTask::new("broken", "designed to fail");
        let ctx = PipelineContext::new();

        let err = task
            .execute(TaskInput::Single(Value::Null), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "designed to fail");
    }

    #[tokio::test]
    async fn test_recording_task_counts_calls() {
        let task = RecordingTask::new("probe", json!(1));
        let ctx = PipelineContext::new();

        assert_eq!(task.call_count(), 0);

        let _ = task.execute(TaskInput::Single(json!("a")), &ctx).await;
        let _ = task.execute(TaskInput::Single(json!("b")), &ctx).await;

        assert_eq!(task.call_count(), 2);
        assert_eq!(
            task.recorded_inputs(),
            vec![
                TaskInput::Single(json!("a")),
                TaskInput::Single(json!("b")),
            ]
        );
    }
}
