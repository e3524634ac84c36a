//! The driver loop: maintains indegree/ready/running bookkeeping, dispatches batches
//! through a selector/processor pair, and delivers results to successors.

use std::sync::Arc;
use std::time::Duration;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::instrument;

use crate::errors::{NodeId, RunnerError};
use crate::event_bus::{Event, EventEmitter};
use crate::executor::Executor;
use crate::payload::Payload;
use crate::processor::{Processor, Sequential};
use crate::selector::{FullSelector, Selector};
use crate::state::RunState;

/// Configuration for one run: which selector/processor to use and an optional pacing
/// delay between scheduler iterations (sourced from `dotenvy`-backed env config at the
/// host layer, or set directly here).
pub struct RunOptions {
    pub selector: Arc<dyn Selector>,
    pub processor: Arc<dyn Processor>,
    pub pacing: Option<Duration>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            selector: Arc::new(FullSelector),
            processor: Arc::new(Sequential),
            pacing: None,
        }
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Nodes in the order they finished or aborted.
    pub finish_order: Vec<NodeId>,
    pub output: Option<Payload>,
    pub output_by_node_id: Option<NodeId>,
}

/// Drive `executor`'s graph to completion, seeding the ready set with sources and
/// looping until both the ready and running sets are empty. `executor` owns the
/// per-node `RunRecord`s for this run; callers that want `inspect`/`info` access after
/// the run completes hold onto the same `Arc<Executor>` they pass in here.
#[instrument(skip(executor, emitter, options))]
pub async fn run(
    executor: Arc<Executor>,
    emitter: Arc<dyn EventEmitter>,
    options: RunOptions,
) -> Result<RunReport, RunnerError> {
    let graph = executor.graph().clone();
    let state = executor.state().clone();
    let total = graph.vertices().count();

    let mut indegree: FxHashMap<NodeId, usize> = graph
        .vertices()
        .map(|id| (id.clone(), graph.indegree(id)))
        .collect();

    let mut ready: Vec<NodeId> = graph.sources();
    if ready.is_empty() {
        return Err(RunnerError::NoSources);
    }
    let mut running: FxHashSet<NodeId> = FxHashSet::default();
    let mut finish_order = Vec::with_capacity(total);
    let mut step: u64 = 0;

    while !ready.is_empty() || !running.is_empty() {
        step += 1;
        let running_vec: Vec<NodeId> = running.iter().cloned().collect();
        let idle: Vec<NodeId> = ready.iter().filter(|id| !running.contains(*id)).cloned().collect();
        let batch = options.selector.select(&running_vec, &idle);

        if batch.is_empty() {
            // Nothing dispatchable this tick (selector exhausted capacity); the
            // running set must be non-empty or the loop would already have exited.
            break;
        }

        for id in &batch {
            running.insert(id.clone());
        }
        ready.retain(|id| !batch.contains(id));

        tracing::debug!(step, batch = ?batch, "dispatching batch");
        executor.report_start(&batch);
        let results = options
            .processor
            .run_batch(executor.clone(), batch, step)
            .await?;
        executor.report_finish(&results);

        for result in &results {
            running.remove(&result.node_id);
            finish_order.push(result.node_id.clone());

            for successor in graph.successors(&result.node_id).to_vec() {
                executor.deliver(&result.node_id, &successor, result)?;
                if let Some(entry) = indegree.get_mut(&successor) {
                    *entry = entry.saturating_sub(1);
                    if *entry == 0 {
                        ready.push(successor);
                    }
                }
            }
        }

        let _ = emitter.emit(Event::progress(finish_order.len(), total));

        if let Some(pacing) = options.pacing {
            tokio::time::sleep(pacing).await;
        }
    }

    Ok(RunReport {
        finish_order,
        output: state.output(),
        output_by_node_id: state.output_by_node_id(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::EventBus;
    use crate::graph::GraphBuilder;
    use crate::node::{FnTransform, NodeDef};
    use rustc_hash::FxHashMap as Map;
    use std::sync::Arc;

    fn adder(amount: f64) -> Arc<dyn crate::node::Transform> {
        Arc::new(FnTransform(
            move |_prompt: &Payload, upstream: &crate::node::Upstream, _state: &RunState| {
                let total: f64 = upstream
                    .values()
                    .map(|v| if let Payload::Number(n) = v { *n } else { 0.0 })
                    .sum();
                async move { Ok(Payload::Number(total + amount)) }
            },
        ))
    }

    #[tokio::test]
    async fn linear_pipeline_produces_expected_output() {
        let graph = Arc::new(
            GraphBuilder::new()
                .add_node(NodeDef::new("a", adder(1.0)))
                .unwrap()
                .add_node(NodeDef::new("b", adder(10.0)))
                .unwrap()
                .add_node(NodeDef::new("c", adder(100.0)))
                .unwrap()
                .connect("a", "b")
                .unwrap()
                .connect("b", "c")
                .unwrap()
                .compile()
                .unwrap(),
        );
        let state = Arc::new(RunState::new(Payload::Null, Map::default()));
        let bus = EventBus::default();
        let emitter = bus.get_emitter();
        let executor = Arc::new(Executor::new(graph, state.clone(), emitter.clone()));

        let report = run(executor, emitter, RunOptions::default()).await.unwrap();

        assert_eq!(
            report.finish_order,
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }
}
