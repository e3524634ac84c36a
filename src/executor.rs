//! Builds each dispatched node's input bundle, invokes its transform, and fires the
//! lifecycle hooks the scheduler and event bus rely on.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::instrument;

use crate::errors::{ConflictingConditionsError, NodeId, RunnerError};
use crate::event_bus::{Event, EventEmitter};
use crate::graph::Graph;
use crate::node::{evaluate_gate, ExecutionState, GateOutcome, RunRecord, Upstream};
use crate::payload::Payload;
use crate::state::RunState;

/// The inputs captured for one node just before it runs.
#[derive(Debug, Clone)]
pub struct NodeParam {
    pub node_id: NodeId,
    pub prompt: Payload,
    pub upstream: Upstream,
}

/// The outcome of running (or aborting) one node.
#[derive(Debug, Clone)]
pub struct NodeResult {
    pub node_id: NodeId,
    pub execution_state: ExecutionState,
    pub output: Option<Payload>,
}

/// Drives one node through the gate/transform lifecycle and tracks every node's
/// `RunRecord` for the duration of the run.
pub struct Executor {
    graph: Arc<Graph>,
    state: Arc<RunState>,
    emitter: Arc<dyn EventEmitter>,
    records: Mutex<FxHashMap<NodeId, RunRecord>>,
}

impl Executor {
    pub fn new(graph: Arc<Graph>, state: Arc<RunState>, emitter: Arc<dyn EventEmitter>) -> Self {
        let records = graph
            .vertices()
            .map(|id| (id.clone(), RunRecord::default()))
            .collect();
        Self {
            graph,
            state,
            emitter,
            records: Mutex::new(records),
        }
    }

    /// Reset every node's `RunRecord` to its initialized state, leaving topology intact.
    pub fn reset_all(&self) {
        let mut records = self.records.lock();
        for record in records.values_mut() {
            record.reset();
        }
    }

    pub fn execution_state(&self, node_id: &str) -> ExecutionState {
        self.records
            .lock()
            .get(node_id)
            .map(|r| r.execution_state)
            .unwrap_or_default()
    }

    pub fn output_of(&self, node_id: &str) -> Option<Payload> {
        self.records.lock().get(node_id).and_then(|r| r.node_output.clone())
    }

    pub fn snapshot_record(&self, node_id: &str) -> Option<RunRecord> {
        self.records.lock().get(node_id).cloned()
    }

    /// Snapshot the node's static prompt plus a copy of the outputs its predecessors
    /// have delivered so far.
    pub fn param(&self, node_id: &str) -> NodeParam {
        let node = self.graph.node(node_id).expect("node_id came from the graph");
        let upstream = self
            .records
            .lock()
            .get(node_id)
            .map(|r| r.upstream_outputs.clone())
            .unwrap_or_default();
        NodeParam {
            node_id: node_id.to_string(),
            prompt: node.prompt.clone().unwrap_or(Payload::Null),
            upstream,
        }
    }

    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    pub fn state(&self) -> &Arc<RunState> {
        &self.state
    }

    /// Evaluate the gate, invoke the transform if permitted, and commit the outcome.
    #[instrument(skip(self, param), fields(node_id = %param.node_id, step))]
    pub async fn execute(&self, param: NodeParam, step: u64) -> Result<NodeResult, RunnerError> {
        let node = self
            .graph
            .node(&param.node_id)
            .expect("node_id came from the graph")
            .clone();
        let predecessors = self.graph.predecessors(&param.node_id);

        let gate_outcome = {
            let records = self.records.lock();
            let record = records
                .get(&param.node_id)
                .expect("record initialized for every vertex");
            evaluate_gate(record, node.gate_policy, predecessors)
        };

        let acceptable = match gate_outcome {
            GateOutcome::Abort => {
                self.finalize(&param.node_id, ExecutionState::Aborted, None);
                tracing::info!(node_id = %param.node_id, "node aborted: gate liveness failed");
                return Ok(NodeResult {
                    node_id: param.node_id,
                    execution_state: ExecutionState::Aborted,
                    output: None,
                });
            }
            GateOutcome::Run(acceptable) => acceptable,
        };

        self.set_running(&param.node_id);

        let filtered_upstream: Upstream = param
            .upstream
            .iter()
            .filter(|(id, _)| acceptable.contains(*id))
            .map(|(id, value)| (id.clone(), value.clone()))
            .collect();

        if let Some(desc_fn) = &node.desc_fn {
            let resolved = desc_fn(&param.prompt, &filtered_upstream, &self.state);
            if let Some(record) = self.records.lock().get_mut(&param.node_id) {
                record.resolved_desc = Some(resolved);
            }
        }

        let output = node
            .transform
            .call(&param.prompt, &filtered_upstream, &self.state)
            .await
            .map_err(|source| RunnerError::NodeRun {
                node_id: param.node_id.clone(),
                step,
                source,
            })?;

        self.finalize(&param.node_id, ExecutionState::Finished, Some(output.clone()));

        if let Some(rule) = &node.dag_output_when {
            if rule(&param.prompt, &filtered_upstream, &output, ExecutionState::Finished) {
                self.state.commit_output(&param.node_id, output.clone());
            }
        }

        Ok(NodeResult {
            node_id: param.node_id,
            execution_state: ExecutionState::Finished,
            output: Some(output),
        })
    }

    fn set_running(&self, node_id: &str) {
        if let Some(record) = self.records.lock().get_mut(node_id) {
            record.execution_state = ExecutionState::Running;
        }
    }

    fn finalize(&self, node_id: &str, state: ExecutionState, output: Option<Payload>) {
        let mut records = self.records.lock();
        if let Some(record) = records.get_mut(node_id) {
            record.execution_state = state;
            record.node_output = output;
        }
    }

    pub fn report_start(&self, batch: &[NodeId]) {
        for node_id in batch {
            let desc = self
                .graph
                .node(node_id)
                .and_then(|n| n.desc.clone())
                .unwrap_or_default();
            tracing::info!(node_id, desc = %desc, "node started");
            let _ = self.emitter.emit(Event::node_started(node_id.clone(), desc));
        }
    }

    pub fn report_finish(&self, results: &[NodeResult]) {
        for result in results {
            let resolved = self
                .records
                .lock()
                .get(&result.node_id)
                .and_then(|r| r.resolved_desc.clone());
            let desc = resolved
                .or_else(|| self.graph.node(&result.node_id).and_then(|n| n.desc.clone()))
                .unwrap_or_default();
            tracing::info!(
                node_id = %result.node_id,
                exec_state = crate::errors::execution_state_label(result.execution_state),
                "node finished"
            );
            let _ = self.emitter.emit(Event::node_finished(
                result.node_id.clone(),
                desc,
                result.execution_state,
                result.output.clone(),
            ));
        }
    }

    /// Install the producer's result (and any edge predicate) onto each successor's
    /// `RunRecord`, raising a conflict the first time two distinct predicates are found
    /// for the same `(from, to)` pair.
    pub fn deliver(&self, from: &str, to: &str, result: &NodeResult) -> Result<(), RunnerError> {
        let predicates = self.graph.all_predicates_for(from, to);
        if predicates.len() > 1 {
            let first = predicates[0].clone();
            let second = predicates
                .iter()
                .find(|p| *p != &first)
                .cloned()
                .unwrap_or_else(|| first.clone());
            if first != second {
                return Err(RunnerError::Conflict(ConflictingConditionsError {
                    from: from.to_string(),
                    to: to.to_string(),
                    first,
                    second,
                }));
            }
        }

        let mut records = self.records.lock();
        let Some(record) = records.get_mut(to) else {
            return Ok(());
        };
        record
            .upstream_exec_states
            .insert(from.to_string(), result.execution_state);

        if let Some(predicate) = predicates.first() {
            record.conditional_execution = true;
            record
                .execution_condition
                .insert(from.to_string(), predicate.clone());
        }

        if let Some(output) = &result.output {
            record.upstream_outputs.insert(from.to_string(), output.clone());
        }

        Ok(())
    }
}
