//! Benchmarks for pipeline execution.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::{json, Value};
use std::sync::Arc;
use taskpipe::prelude::*;
use taskpipe::testing::ConstTask;

fn chain_graph(length: usize) -> TaskGraph {
    let mut graph = TaskGraph::new()
        .add(Arc::new(ConstTask::new("node-0", json!(0))))
        .unwrap();
    for i in 1..length {
        graph = graph
            .then(Arc::new(ConstTask::new(format!("node-{i}"), json!(i))))
            .unwrap();
    }
    graph
}

fn diamond_graph() -> TaskGraph {
    let joiner: Arc<dyn Task> = Arc::new(FnTask::new("joiner", |input, _ctx| {
        let left = input.get("left").cloned().unwrap_or(Value::Null);
        let right = input.get("right").cloned().unwrap_or(Value::Null);
        Ok(json!([left, right]))
    }));

    TaskGraph::new()
        .add(Arc::new(ConstTask::new("root", json!("seed"))))
        .unwrap()
        .connect("root", Arc::new(ConstTask::new("left", json!(1))))
        .unwrap()
        .connect("root", Arc::new(ConstTask::new("right", json!(2))))
        .unwrap()
        .connect("left", Arc::clone(&joiner))
        .unwrap()
        .connect("right", joiner)
        .unwrap()
}

fn pipeline_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let chain = TaskPipeline::new(chain_graph(10));
    c.bench_function("linear_chain_10", |b| {
        b.iter(|| {
            let result = rt.block_on(chain.run(black_box(json!("input"))));
            black_box(result).unwrap()
        });
    });

    let diamond = TaskPipeline::new(diamond_graph());
    c.bench_function("fan_out_fan_in", |b| {
        b.iter(|| {
            let result = rt.block_on(diamond.run(black_box(json!("input"))));
            black_box(result).unwrap()
        });
    });
}

criterion_group!(benches, pipeline_benchmark);
criterion_main!(benches);
