//! Benchmarks for graph compilation and validation.
//!
//! These benchmarks measure the performance of:
//! - Graph building and compilation (vertex/edge registration, cycle detection)
//! - Topological-order computation over linear, fan-out, and diamond shapes

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use weavedag::graph::GraphBuilder;
use weavedag::node::{FnTransform, NodeDef, Transform, Upstream};
use weavedag::payload::Payload;
use weavedag::state::RunState;

fn noop() -> Arc<dyn Transform> {
    Arc::new(FnTransform(
        |_prompt: &Payload, _upstream: &Upstream, _state: &RunState| async { Ok(Payload::Null) },
    ))
}

/// Build a linear graph: node_0 -> node_1 -> ... -> node_{n-1}.
fn build_linear_graph(node_count: usize) -> GraphBuilder {
    let mut builder = GraphBuilder::new();
    for i in 0..node_count {
        builder = builder
            .add_node(NodeDef::new(format!("node_{i}"), noop()))
            .expect("unique ids");
    }
    for i in 0..node_count.saturating_sub(1) {
        builder = builder
            .connect(&format!("node_{i}"), &format!("node_{}", i + 1))
            .expect("both ends registered");
    }
    builder
}

/// Build a fan-out graph: `hub` connects to `width` independent workers.
fn build_fanout_graph(width: usize) -> GraphBuilder {
    let mut builder = GraphBuilder::new()
        .add_node(NodeDef::new("hub", noop()))
        .expect("unique id");
    for i in 0..width {
        builder = builder
            .add_node(NodeDef::new(format!("worker_{i}"), noop()))
            .expect("unique id")
            .connect("hub", &format!("worker_{i}"))
            .expect("both ends registered");
    }
    builder
}

/// Build a layered DAG: `depth` layers of `width` nodes, each layer connected to the
/// next by a fixed fan-in pattern.
fn build_diamond_graph(depth: usize, width: usize) -> GraphBuilder {
    let mut builder = GraphBuilder::new();
    for layer in 0..depth {
        for node in 0..width {
            builder = builder
                .add_node(NodeDef::new(format!("L{layer}_N{node}"), noop()))
                .expect("unique id");
        }
    }
    for layer in 0..depth.saturating_sub(1) {
        for from_node in 0..width {
            let from = format!("L{layer}_N{from_node}");
            let to_node = from_node % width;
            let to = format!("L{}_N{to_node}", layer + 1);
            builder = builder.connect(&from, &to).expect("both ends registered");
        }
    }
    builder
}

fn bench_graph_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_compile");

    for size in [10, 50, 100, 200] {
        group.bench_with_input(BenchmarkId::new("linear", size), &size, |b, &size| {
            b.iter(|| build_linear_graph(size).compile().expect("compiles"));
        });
    }

    for width in [10, 50, 100] {
        group.bench_with_input(BenchmarkId::new("fanout", width), &width, |b, &width| {
            b.iter(|| build_fanout_graph(width).compile().expect("compiles"));
        });
    }

    for (depth, width) in [(5, 10), (10, 10), (5, 20)] {
        group.bench_with_input(
            BenchmarkId::new("diamond", format!("{depth}x{width}")),
            &(depth, width),
            |b, &(depth, width)| {
                b.iter(|| build_diamond_graph(depth, width).compile().expect("compiles"));
            },
        );
    }

    group.finish();
}

fn bench_vertex_iteration(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_iteration");

    for size in [10, 50, 100] {
        let graph = build_linear_graph(size).compile().expect("compiles");
        group.bench_with_input(BenchmarkId::new("vertices", size), &graph, |b, graph| {
            b.iter(|| graph.vertices().count());
        });
        group.bench_with_input(BenchmarkId::new("sources", size), &graph, |b, graph| {
            b.iter(|| graph.sources());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_graph_compile, bench_vertex_iteration);
criterion_main!(benches);
