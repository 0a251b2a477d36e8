//! Topological ordering of a task graph.
//!
//! Validation happens afresh on every run: the executor asks for an order
//! before anything is spawned, so an invalid graph fails fast with no partial
//! execution.

use crate::errors::PipelineError;
use crate::graph::TaskGraph;
use std::collections::{HashMap, VecDeque};

/// Computes a total execution order consistent with every edge.
///
/// In-degree counting: nodes with no unsatisfied dependencies are drained
/// into the order while their successors' counts are decremented. Ties among
/// simultaneously-ready nodes break by registration order; callers must not
/// rely on that for correctness, only the executor's dependency waiting is
/// load-bearing.
///
/// # Errors
///
/// Returns [`PipelineError::CycleDetected`] naming the unschedulable tasks
/// when the order cannot contain every node.
pub fn execution_order(graph: &TaskGraph) -> Result<Vec<String>, PipelineError> {
    let mut in_degree: HashMap<&str, usize> = graph
        .task_names()
        .iter()
        .map(|name| (name.as_str(), 0))
        .collect();

    for name in graph.task_names() {
        for successor in graph.successors(name) {
            if let Some(count) = in_degree.get_mut(successor.as_str()) {
                *count += 1;
            }
        }
    }

    let mut ready: VecDeque<&str> = graph
        .task_names()
        .iter()
        .filter(|name| in_degree.get(name.as_str()) == Some(&0))
        .map(String::as_str)
        .collect();

    let mut order = Vec::with_capacity(graph.len());
    while let Some(current) = ready.pop_front() {
        order.push(current.to_string());
        for successor in graph.successors(current) {
            if let Some(count) = in_degree.get_mut(successor.as_str()) {
                *count -= 1;
                if *count == 0 {
                    ready.push_back(successor);
                }
            }
        }
    }

    if order.len() != graph.len() {
        let unresolved = graph
            .task_names()
            .iter()
            .filter(|&name| !order.contains(name))
            .cloned()
            .collect();
        return Err(PipelineError::CycleDetected { unresolved });
    }

    Ok(order)
}
