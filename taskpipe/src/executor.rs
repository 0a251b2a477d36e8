//! Concurrent pipeline execution.
//!
//! The pipeline validates and orders its graph afresh on every run, then
//! spawns one worker per node. A node's worker waits for all of its
//! predecessors' results, assembles its input, consults the cache, executes
//! the task if needed, and publishes its result for every successor. Nodes
//! whose predecessor chains are disjoint therefore run concurrently.

use crate::cache::{CacheKey, ResultCache};
use crate::context::PipelineContext;
use crate::errors::PipelineError;
use crate::graph::TaskGraph;
use crate::scheduler;
use crate::task::{Task, TaskInput};
use futures::future::{self, BoxFuture, Shared};
use futures::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info_span, Instrument};
use uuid::Uuid;

/// Cloneable handle to one node's eventual result.
///
/// Successors and the run caller each hold a clone; the underlying worker
/// output is computed once and shared.
type NodeResult = Shared<BoxFuture<'static, Result<Value, PipelineError>>>;

/// An asynchronous task pipeline over a dependency graph of named tasks.
///
/// The pipeline owns the graph and a per-instance memoization cache.
/// Consecutive runs on one instance share cache entries; the graph is never
/// mutated once the pipeline is constructed.
#[derive(Debug)]
pub struct TaskPipeline {
    graph: TaskGraph,
    cache: ResultCache,
}

impl TaskPipeline {
    /// Creates a pipeline over `graph` with an empty cache.
    #[must_use]
    pub fn new(graph: TaskGraph) -> Self {
        Self {
            graph,
            cache: ResultCache::new(),
        }
    }

    /// The graph this pipeline executes.
    #[must_use]
    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// The memoization cache owned by this pipeline.
    #[must_use]
    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Runs the whole graph and resolves with the single sink's result.
    ///
    /// An empty graph resolves immediately to `initial`.
    ///
    /// # Errors
    ///
    /// Fails before any task executes on an invalid graph (cycle) or when
    /// several sinks make the terminal ambiguous; fails afterwards with the
    /// originating task's failure when any node on the path errors.
    pub async fn run(&self, initial: Value) -> Result<Value, PipelineError> {
        let order = scheduler::execution_order(&self.graph)?;
        if order.is_empty() {
            return Ok(initial);
        }

        let mut sinks = self.graph.sinks();
        if sinks.len() != 1 {
            return Err(PipelineError::AmbiguousTerminal { sinks });
        }
        let terminal = sinks.swap_remove(0);

        let results = self.spawn_nodes(&order, initial);
        Self::settle(results, &terminal).await
    }

    /// Runs the whole graph and resolves with the named node's result.
    ///
    /// Every node still executes; `terminal` only selects which result the
    /// call resolves with.
    ///
    /// # Errors
    ///
    /// Fails on an unregistered terminal name or an invalid graph before any
    /// task executes, and with the propagated task failure otherwise.
    pub async fn run_to(&self, terminal: &str, initial: Value) -> Result<Value, PipelineError> {
        if !self.graph.contains(terminal) {
            return Err(PipelineError::UnknownTask(terminal.to_string()));
        }
        let order = scheduler::execution_order(&self.graph)?;
        let results = self.spawn_nodes(&order, initial);
        Self::settle(results, terminal).await
    }

    /// Runs the whole graph and returns every node's outcome by name.
    ///
    /// # Errors
    ///
    /// Fails only on an invalid graph; per-node failures are reported inside
    /// the returned map.
    pub async fn run_all(
        &self,
        initial: Value,
    ) -> Result<HashMap<String, Result<Value, PipelineError>>, PipelineError> {
        let order = scheduler::execution_order(&self.graph)?;
        let results = self.spawn_nodes(&order, initial);

        let mut outcomes = HashMap::with_capacity(results.len());
        for (name, result) in results {
            outcomes.insert(name, result.await);
        }
        Ok(outcomes)
    }

    /// Spawns one worker per node, wired to its predecessors' handles.
    ///
    /// Workers start immediately; each one parks on its predecessor join
    /// until its inputs exist.
    fn spawn_nodes(&self, order: &[String], initial: Value) -> HashMap<String, NodeResult> {
        let run_id = Uuid::new_v4();
        let context = PipelineContext::new();
        let mut results: HashMap<String, NodeResult> = HashMap::with_capacity(order.len());

        for name in order {
            let Some(task) = self.graph.task(name) else {
                continue;
            };
            let predecessors = self.graph.predecessors_of(name);
            let waiters: Vec<NodeResult> = predecessors
                .iter()
                .filter_map(|p| results.get(p).cloned())
                .collect();

            let handle = tokio::spawn(
                run_node(
                    Arc::clone(task),
                    name.clone(),
                    predecessors,
                    waiters,
                    initial.clone(),
                    self.cache.clone(),
                    context.clone(),
                )
                .instrument(info_span!("task", run = %run_id, task = %name)),
            );

            let task_name = name.clone();
            let result: NodeResult = async move {
                match handle.await {
                    Ok(outcome) => outcome,
                    Err(join_err) => {
                        error!(task = %task_name, error = %join_err, "task worker aborted");
                        Err(PipelineError::TaskPanicked { task: task_name })
                    }
                }
            }
            .boxed()
            .shared();

            results.insert(name.clone(), result);
        }

        results
    }

    /// Resolves with `terminal`'s result once it settles.
    ///
    /// Remaining in-flight workers are awaited, never aborted, so no node
    /// outlives the run that spawned it.
    async fn settle(
        results: HashMap<String, NodeResult>,
        terminal: &str,
    ) -> Result<Value, PipelineError> {
        let Some(target) = results.get(terminal).cloned() else {
            return Err(PipelineError::UnknownTask(terminal.to_string()));
        };
        let outcome = target.await;
        let _ = future::join_all(results.into_values()).await;
        outcome
    }
}

/// Executes one node: predecessor join, input assembly, cache consult, task
/// body, publication.
async fn run_node(
    task: Arc<dyn Task>,
    name: String,
    predecessors: Vec<String>,
    waiters: Vec<NodeResult>,
    initial: Value,
    cache: ResultCache,
    context: PipelineContext,
) -> Result<Value, PipelineError> {
    // AND-join: every predecessor must succeed; the first failure is
    // propagated as this node's own result without running the body.
    let upstream = future::try_join_all(waiters).await?;
    let input = assemble_input(predecessors, upstream, initial);

    if task.cacheable() {
        let key = CacheKey::new(name.as_str(), input.clone());
        if let Some(hit) = cache.get(&key) {
            debug!(task = %name, "cache hit");
            return Ok(hit);
        }
        debug!(task = %name, "executing");
        let output = task
            .execute(input, &context)
            .await
            .map_err(|cause| PipelineError::task_failed(name.as_str(), cause))?;
        cache.put(key, output.clone());
        return Ok(output);
    }

    debug!(task = %name, "executing");
    task.execute(input, &context)
        .await
        .map_err(|cause| PipelineError::task_failed(name.as_str(), cause))
}

/// Builds a node's input from its predecessors' published outputs.
///
/// No predecessors: the pipeline's initial input. One predecessor: its raw
/// output. Several: a map keyed by producing task name.
fn assemble_input(predecessors: Vec<String>, mut upstream: Vec<Value>, initial: Value) -> TaskInput {
    if predecessors.is_empty() {
        TaskInput::Single(initial)
    } else if upstream.len() == 1 {
        TaskInput::Single(upstream.swap_remove(0))
    } else {
        TaskInput::Fanned(predecessors.into_iter().zip(upstream).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::FnTask;
    use crate::testing::{ConstTask, DelayTask, FailTask, RecordingTask};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::{Duration, Instant};
    use tokio_test::assert_ok;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }

    fn length_task() -> Arc<dyn Task> {
        Arc::new(FnTask::new("length", |input, _ctx| {
            let text = input
                .into_single()
                .and_then(|v| v.as_str().map(str::to_owned))
                .ok_or_else(|| anyhow::anyhow!("expected a string input"))?;
            Ok(json!(text.len()))
        }))
    }

    fn double_task() -> Arc<dyn Task> {
        Arc::new(FnTask::new("double", |input, _ctx| {
            let n = input
                .as_single()
                .and_then(Value::as_i64)
                .ok_or_else(|| anyhow::anyhow!("expected a number input"))?;
            Ok(json!(n * 2))
        }))
    }

    #[tokio::test]
    async fn test_linear_chain_maps_input_through_both_tasks() {
        init_tracing();
        let graph = TaskGraph::new()
            .add(length_task())
            .unwrap()
            .then(double_task())
            .unwrap();
        let pipeline = TaskPipeline::new(graph);

        // "hello" -> length 5 -> doubled 10
        let result = pipeline.run(json!("hello")).await;
        assert_eq!(tokio_test::assert_ok!(result), json!(10));
    }

    #[tokio::test]
    async fn test_empty_graph_resolves_to_initial_input() {
        let pipeline = TaskPipeline::new(TaskGraph::new());

        let result = pipeline.run(json!("untouched")).await;
        assert_eq!(tokio_test::assert_ok!(result), json!("untouched"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_independent_branches_run_concurrently() {
        let graph = TaskGraph::new()
            .add(Arc::new(ConstTask::new("start", json!(1))))
            .unwrap()
            .connect("start", Arc::new(DelayTask::new("slow-a", Duration::from_millis(500))))
            .unwrap()
            .connect("start", Arc::new(DelayTask::new("slow-b", Duration::from_millis(500))))
            .unwrap()
            .connect("slow-a", Arc::new(ConstTask::new("joiner", json!("done"))))
            .unwrap()
            .connect("slow-b", Arc::new(ConstTask::new("joiner", json!("done"))))
            .unwrap();
        let pipeline = TaskPipeline::new(graph);

        let started = Instant::now();
        let result = pipeline.run(json!("ignored")).await;
        let elapsed = started.elapsed();

        assert_eq!(tokio_test::assert_ok!(result), json!("done"));
        // Sequential branches would need >= 1000ms.
        assert!(
            elapsed < Duration::from_millis(900),
            "branches did not overlap: {elapsed:?}"
        );
    }

    #[tokio::test]
    async fn test_fan_in_task_sees_both_predecessors() {
        let joiner = Arc::new(FnTask::new("joiner", |input, _ctx| {
            let left = input
                .get("start-a")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow::anyhow!("missing 'start-a' output"))?;
            let right = input
                .get("start-b")
                .and_then(Value::as_i64)
                .ok_or_else(|| anyhow::anyhow!("missing 'start-b' output"))?;
            Ok(json!(format!("{left}:{right}")))
        }));

        let graph = TaskGraph::new()
            .register(Arc::new(ConstTask::new("start-a", json!("hello"))))
            .unwrap()
            .register(Arc::new(ConstTask::new("start-b", json!(100))))
            .unwrap()
            .connect("start-a", Arc::clone(&joiner) as Arc<dyn Task>)
            .unwrap()
            .connect("start-b", joiner)
            .unwrap();
        let pipeline = TaskPipeline::new(graph);

        let result = pipeline.run(json!("dummy")).await;
        assert_eq!(tokio_test::assert_ok!(result), json!("hello:100"));
    }

    #[tokio::test]
    async fn test_cacheable_task_executes_once_for_equal_inputs() {
        let probe = Arc::new(RecordingTask::new("probe", json!("computed")).with_cacheable(true));
        let graph = TaskGraph::new()
            .add(Arc::clone(&probe) as Arc<dyn Task>)
            .unwrap();
        let pipeline = TaskPipeline::new(graph);

        let first = pipeline.run(json!("same-input")).await;
        let second = pipeline.run(json!("same-input")).await;

        assert_eq!(tokio_test::assert_ok!(first), json!("computed"));
        assert_eq!(tokio_test::assert_ok!(second), json!("computed"));
        assert_eq!(probe.call_count(), 1);
        assert_eq!(pipeline.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_cacheable_task_reexecutes_for_different_inputs() {
        let probe = Arc::new(RecordingTask::new("probe", json!("computed")).with_cacheable(true));
        let graph = TaskGraph::new()
            .add(Arc::clone(&probe) as Arc<dyn Task>)
            .unwrap();
        let pipeline = TaskPipeline::new(graph);

        let _ = pipeline.run(json!("first")).await;
        let _ = pipeline.run(json!("second")).await;

        assert_eq!(probe.call_count(), 2);
        assert_eq!(pipeline.cache().len(), 2);
    }

    #[tokio::test]
    async fn test_non_cacheable_task_always_executes() {
        let probe = Arc::new(RecordingTask::new("probe", json!("computed")));
        let graph = TaskGraph::new()
            .add(Arc::clone(&probe) as Arc<dyn Task>)
            .unwrap();
        let pipeline = TaskPipeline::new(graph);

        let _ = pipeline.run(json!("same-input")).await;
        let _ = pipeline.run(json!("same-input")).await;

        assert_eq!(probe.call_count(), 2);
        assert!(pipeline.cache().is_empty());
    }

    #[tokio::test]
    async fn test_failure_mid_chain_propagates_and_skips_downstream() {
        init_tracing();
        let downstream = Arc::new(RecordingTask::new("downstream", json!("unreachable")));
        let graph = TaskGraph::new()
            .add(Arc::new(ConstTask::new("start", json!(1))))
            .unwrap()
            .then(Arc::new(FailTask::new("broken", "designed to fail")))
            .unwrap()
            .then(Arc::clone(&downstream) as Arc<dyn Task>)
            .unwrap();
        let pipeline = TaskPipeline::new(graph);

        let err = pipeline.run(json!("seed")).await.unwrap_err();

        assert_eq!(err.failed_task(), Some("broken"));
        assert!(err.to_string().contains("designed to fail"));
        assert_eq!(downstream.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cycle_fails_before_any_task_executes() {
        let a = Arc::new(RecordingTask::new("a", json!(1)));
        let b = Arc::new(RecordingTask::new("b", json!(2)));
        let graph = TaskGraph::new()
            .add(Arc::clone(&a) as Arc<dyn Task>)
            .unwrap()
            .then(Arc::clone(&b) as Arc<dyn Task>)
            .unwrap()
            .connect("b", Arc::clone(&a) as Arc<dyn Task>)
            .unwrap();
        let pipeline = TaskPipeline::new(graph);

        let err = pipeline.run(json!("seed")).await.unwrap_err();

        assert!(matches!(err, PipelineError::CycleDetected { .. }));
        assert_eq!(a.call_count(), 0);
        assert_eq!(b.call_count(), 0);
    }

    #[tokio::test]
    async fn test_multiple_sinks_require_explicit_terminal() {
        fn fan_out_graph() -> TaskGraph {
            TaskGraph::new()
                .add(Arc::new(ConstTask::new("root", json!(1))))
                .unwrap()
                .connect("root", Arc::new(ConstTask::new("left", json!("l"))))
                .unwrap()
                .connect("root", Arc::new(ConstTask::new("right", json!("r"))))
                .unwrap()
        }

        let pipeline = TaskPipeline::new(fan_out_graph());
        let err = pipeline.run(json!(null)).await.unwrap_err();
        match err {
            PipelineError::AmbiguousTerminal { sinks } => {
                assert_eq!(sinks, vec!["left".to_string(), "right".to_string()]);
            }
            other => panic!("expected ambiguous terminal, got {other:?}"),
        }

        let result = pipeline.run_to("left", json!(null)).await;
        assert_eq!(tokio_test::assert_ok!(result), json!("l"));
    }

    #[tokio::test]
    async fn test_run_all_reports_every_node() {
        let graph = TaskGraph::new()
            .add(Arc::new(ConstTask::new("root", json!(1))))
            .unwrap()
            .connect("root", Arc::new(ConstTask::new("left", json!("l"))))
            .unwrap()
            .connect("root", Arc::new(FailTask::new("right", "no output")))
            .unwrap();
        let pipeline = TaskPipeline::new(graph);

        let outcomes = pipeline.run_all(json!(null)).await.unwrap();

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes["left"].as_ref().ok(), Some(&json!("l")));
        assert!(outcomes["right"].is_err());
        assert!(outcomes["root"].is_ok());
    }

    #[tokio::test]
    async fn test_run_to_unknown_terminal_fails() {
        let graph = TaskGraph::new()
            .add(Arc::new(ConstTask::new("only", json!(1))))
            .unwrap();
        let pipeline = TaskPipeline::new(graph);

        let err = pipeline.run_to("ghost", json!(null)).await.unwrap_err();
        assert!(matches!(err, PipelineError::UnknownTask(name) if name == "ghost"));
    }

    #[tokio::test]
    async fn test_context_is_shared_between_tasks() {
        let writer = Arc::new(FnTask::new("writer", |input, ctx| {
            ctx.put("attempt", 7_i64);
            Ok(input.into_single().unwrap_or(Value::Null))
        }));
        let reader = Arc::new(FnTask::new("reader", |_input, ctx| {
            let attempt = ctx
                .get::<i64>("attempt")
                .ok_or_else(|| anyhow::anyhow!("context entry missing"))?;
            Ok(json!(attempt))
        }));

        let graph = TaskGraph::new()
            .add(writer as Arc<dyn Task>)
            .unwrap()
            .then(reader as Arc<dyn Task>)
            .unwrap();
        let pipeline = TaskPipeline::new(graph);

        let result = pipeline.run(json!("seed")).await;
        assert_eq!(tokio_test::assert_ok!(result), json!(7));
    }

    #[tokio::test]
    async fn test_context_is_fresh_per_run() {
        let reader = Arc::new(FnTask::new("reader", |_input, ctx| {
            let seen = ctx.get::<bool>("visited").unwrap_or(false);
            ctx.put("visited", true);
            Ok(json!(seen))
        }));

        let graph = TaskGraph::new().add(reader as Arc<dyn Task>).unwrap();
        let pipeline = TaskPipeline::new(graph);

        let first = pipeline.run(json!(null)).await;
        let second = pipeline.run(json!(null)).await;

        assert_eq!(tokio_test::assert_ok!(first), json!(false));
        assert_eq!(tokio_test::assert_ok!(second), json!(false));
    }
}
