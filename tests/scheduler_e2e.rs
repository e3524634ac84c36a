//! End-to-end scenarios exercising the scheduler, gate logic, and conflict detection
//! together, rather than any single module in isolation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;
use weavedag::errors::RunnerError;
use weavedag::event_bus::EventBus;
use weavedag::executor::Executor;
use weavedag::graph::GraphBuilder;
use weavedag::node::{ExecutionState, FnTransform, GatePolicy, NodeDef, Transform, Upstream};
use weavedag::payload::Payload;
use weavedag::predicate::Predicate;
use weavedag::scheduler::{self, RunOptions};
use weavedag::selector::MaxSelector;
use weavedag::processor::Parallel;
use weavedag::state::RunState;

fn constant(value: f64) -> Arc<dyn Transform> {
    Arc::new(FnTransform(
        move |_prompt: &Payload, _upstream: &Upstream, _state: &RunState| async move {
            Ok(Payload::Number(value))
        },
    ))
}

fn add(amount: f64) -> Arc<dyn Transform> {
    Arc::new(FnTransform(
        move |_prompt: &Payload, upstream: &Upstream, _state: &RunState| {
            let total: f64 = upstream
                .values()
                .map(|v| if let Payload::Number(n) = v { *n } else { 0.0 })
                .sum();
            async move { Ok(Payload::Number(total + amount)) }
        },
    ))
}

fn passthrough_single() -> Arc<dyn Transform> {
    Arc::new(FnTransform(
        |_prompt: &Payload, upstream: &Upstream, _state: &RunState| {
            let value = upstream.values().next().cloned().unwrap_or(Payload::Null);
            async move { Ok(value) }
        },
    ))
}

fn merge_all() -> Arc<dyn Transform> {
    Arc::new(FnTransform(
        |_prompt: &Payload, upstream: &Upstream, _state: &RunState| {
            let merged = upstream
                .values()
                .fold(Payload::Null, |acc, v| acc.merge(v));
            async move { Ok(merged) }
        },
    ))
}

async fn run_graph(graph: Arc<weavedag::graph::Graph>, options: RunOptions) -> (scheduler::RunReport, Arc<Executor>) {
    let state = Arc::new(RunState::new(Payload::Null, FxHashMap::default()));
    let bus = EventBus::default();
    let emitter = bus.get_emitter();
    let executor = Arc::new(Executor::new(graph, state, emitter.clone()));
    let report = scheduler::run(executor.clone(), emitter, options).await.unwrap();
    (report, executor)
}

/// S1 — linear pipeline: A returns 1, B adds 10, C adds 100; final output 111.
#[tokio::test]
async fn s1_linear_pipeline_produces_expected_sum_and_order() {
    let graph = Arc::new(
        GraphBuilder::new()
            .add_node(NodeDef::new("A", constant(1.0)))
            .unwrap()
            .add_node(NodeDef::new("B", add(10.0)))
            .unwrap()
            .add_node(NodeDef::new("C", add(100.0)))
            .unwrap()
            .connect("A", "B")
            .unwrap()
            .connect("B", "C")
            .unwrap()
            .compile()
            .unwrap(),
    );

    let (report, executor) = run_graph(graph, RunOptions::default()).await;
    assert_eq!(report.finish_order, vec!["A", "B", "C"]);
    assert_eq!(report.output, Some(Payload::Number(111.0)));
    for id in ["A", "B", "C"] {
        assert_eq!(executor.execution_state(id), ExecutionState::Finished);
    }
}

/// S2 — conditional fan-out: only the branch whose predicate matches A's output runs.
#[tokio::test]
async fn s2_conditional_fanout_routes_on_emptiness() {
    async fn run_with(a_output: Payload) -> scheduler::RunReport {
        let transform_a: Arc<dyn Transform> = {
            let out = a_output.clone();
            Arc::new(FnTransform(move |_p: &Payload, _u: &Upstream, _s: &RunState| {
                let out = out.clone();
                async move { Ok(out) }
            }))
        };
        let graph = Arc::new(
            GraphBuilder::new()
                .add_node(NodeDef::new("A", transform_a))
                .unwrap()
                .add_node(NodeDef::new("E", constant(1.0)))
                .unwrap()
                .add_node(NodeDef::new("T", constant(2.0)))
                .unwrap()
                .add_node(NodeDef::new("End", passthrough_single()))
                .unwrap()
                .connect_if("A", Predicate::Emptyset, "E")
                .unwrap()
                .connect_if("A", Predicate::NonEmptyset, "T")
                .unwrap()
                .connect("E", "End")
                .unwrap()
                .connect("T", "End")
                .unwrap()
                .set_gate_policy("End", GatePolicy::AnyUpstreamAcceptable)
                .unwrap()
                .compile()
                .unwrap(),
        );
        let (report, executor) = run_graph(graph, RunOptions::default()).await;
        assert_eq!(executor.execution_state("End"), ExecutionState::Finished);
        report
    }

    let report = run_with(Payload::sequence(Vec::new())).await;
    assert_eq!(report.output, Some(Payload::Number(1.0)));

    let report = run_with(Payload::sequence([Payload::Number(1.0)])).await;
    assert_eq!(report.output, Some(Payload::Number(2.0)));
}

/// S3 — subset/superset routing: a dispatch value matching both required subsets fans
/// out to both workers, which join back together.
#[tokio::test]
async fn s3_superset_routing_runs_both_branches_and_joins() {
    let dispatch: Arc<dyn Transform> = Arc::new(FnTransform(
        |_p: &Payload, _u: &Upstream, _s: &RunState| async {
            Ok(Payload::sequence([
                Payload::text("get_weather"),
                Payload::text("eval"),
            ]))
        },
    ));
    let tagged = |tag: &'static str| -> Arc<dyn Transform> {
        Arc::new(FnTransform(move |_p: &Payload, _u: &Upstream, _s: &RunState| async move {
            let mut map = std::collections::BTreeMap::new();
            map.insert(tag.to_string(), Payload::Bool(true));
            Ok(Payload::Mapping(map))
        }))
    };

    let graph = Arc::new(
        GraphBuilder::new()
            .add_node(NodeDef::new("Dispatch", dispatch))
            .unwrap()
            .add_node(NodeDef::new("W", tagged("weather")))
            .unwrap()
            .add_node(NodeDef::new("V", tagged("eval")))
            .unwrap()
            .add_node(NodeDef::new("Join", merge_all()))
            .unwrap()
            .connect_if(
                "Dispatch",
                Predicate::Superset(vec![Payload::text("get_weather")]),
                "W",
            )
            .unwrap()
            .connect_if("Dispatch", Predicate::Superset(vec![Payload::text("eval")]), "V")
            .unwrap()
            .connect("W", "Join")
            .unwrap()
            .connect("V", "Join")
            .unwrap()
            .set_gate_policy("Join", GatePolicy::AnyUpstreamAcceptable)
            .unwrap()
            .compile()
            .unwrap(),
    );

    let (_report, executor) = run_graph(graph, RunOptions::default()).await;
    assert_eq!(executor.execution_state("W"), ExecutionState::Finished);
    assert_eq!(executor.execution_state("V"), ExecutionState::Finished);
    assert_eq!(executor.execution_state("Join"), ExecutionState::Finished);
    let joined = executor.output_of("Join").unwrap();
    match joined {
        Payload::Mapping(map) => {
            assert!(map.contains_key("weather"));
            assert!(map.contains_key("eval"));
        }
        other => panic!("expected a merged mapping, got {other:?}"),
    }
}

/// S4 — two distinct predicates on the same edge raise a conflict at delivery time.
#[tokio::test]
async fn s4_conflicting_conditions_on_same_edge_are_rejected() {
    let graph = Arc::new(
        GraphBuilder::new()
            .add_node(NodeDef::new("u", constant(0.0)))
            .unwrap()
            .add_node(NodeDef::new("v", constant(0.0)))
            .unwrap()
            .connect_if("u", Predicate::Emptyset, "v")
            .unwrap()
            .connect_if("u", Predicate::NonEmptyset, "v")
            .unwrap()
            .compile()
            .unwrap(),
    );

    let state = Arc::new(RunState::new(Payload::Null, FxHashMap::default()));
    let bus = EventBus::default();
    let emitter = bus.get_emitter();
    let executor = Arc::new(Executor::new(graph, state, emitter.clone()));
    let result = scheduler::run(executor, emitter, RunOptions::default()).await;
    assert!(matches!(result, Err(RunnerError::Conflict(_))));
}

/// S5 — bounded parallelism: 10 sources sleeping 50ms each under MaxSelector(3), never
/// more than 3 running concurrently, wall time bounded below by ceil(10/3) rounds.
#[tokio::test]
async fn s5_bounded_parallelism_respects_max_selector() {
    let mut builder = GraphBuilder::new();
    for i in 0..10 {
        let sleeper: Arc<dyn Transform> = Arc::new(FnTransform(
            |_p: &Payload, _u: &Upstream, _s: &RunState| async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(Payload::Null)
            },
        ));
        builder = builder.add_node(NodeDef::new(format!("n{i}"), sleeper)).unwrap();
    }
    let graph = Arc::new(builder.compile().unwrap());

    let options = RunOptions {
        selector: Arc::new(MaxSelector::new(3)),
        processor: Arc::new(Parallel),
        pacing: None,
    };

    let start = Instant::now();
    let (report, _executor) = run_graph(graph, options).await;
    let elapsed = start.elapsed();

    assert_eq!(report.finish_order.len(), 10);
    let expected_floor = Duration::from_millis(50 * 4); // ceil(10/3) == 4 rounds
    assert!(elapsed >= expected_floor, "elapsed {elapsed:?} below {expected_floor:?}");
    assert!(elapsed < expected_floor + Duration::from_millis(500));
}

/// S7 — a node's `desc_fn` is invoked with its filtered upstream bundle and the result
/// is visible on its `RunRecord` once the node finishes.
#[tokio::test]
async fn s7_desc_fn_resolves_from_filtered_upstream() {
    let graph = Arc::new(
        GraphBuilder::new()
            .add_node(NodeDef::new("A", constant(7.0)))
            .unwrap()
            .add_node(
                NodeDef::new("B", passthrough_single()).with_desc_fn(Arc::new(
                    |_prompt: &Payload, upstream: &Upstream, _state: &RunState| {
                        let total: f64 = upstream
                            .values()
                            .map(|v| if let Payload::Number(n) = v { *n } else { 0.0 })
                            .sum();
                        format!("saw {total} from upstream")
                    },
                )),
            )
            .unwrap()
            .connect("A", "B")
            .unwrap()
            .compile()
            .unwrap(),
    );

    let (_report, executor) = run_graph(graph, RunOptions::default()).await;
    let record = executor.snapshot_record("B").unwrap();
    assert_eq!(record.resolved_desc.as_deref(), Some("saw 7 from upstream"));
}

/// S6 — reset idempotence: the same graph run twice with a reset in between produces
/// an identical finish order and output.
#[tokio::test]
async fn s6_reset_then_rerun_is_idempotent() {
    let graph = Arc::new(
        GraphBuilder::new()
            .add_node(NodeDef::new("A", constant(1.0)))
            .unwrap()
            .add_node(NodeDef::new("B", add(10.0)))
            .unwrap()
            .connect("A", "B")
            .unwrap()
            .compile()
            .unwrap(),
    );

    let state = Arc::new(RunState::new(Payload::Null, FxHashMap::default()));
    let bus = EventBus::default();
    let emitter = bus.get_emitter();
    let executor = Arc::new(Executor::new(graph, state, emitter.clone()));

    let first = scheduler::run(executor.clone(), emitter.clone(), RunOptions::default())
        .await
        .unwrap();
    executor.reset_all();
    let second = scheduler::run(executor.clone(), emitter, RunOptions::default())
        .await
        .unwrap();

    assert_eq!(first.finish_order, second.finish_order);
    assert_eq!(first.output, second.output);
    for id in ["A", "B"] {
        assert_eq!(executor.execution_state(id), ExecutionState::Finished);
    }
}
