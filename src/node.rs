//! Node identity, the user-supplied `Transform` callback, and the per-node execution
//! gate described by the scheduler's design: fusing upstream completion state with
//! conditional-edge predicates into a run/abort decision.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::errors::{NodeId, TransformError};
use crate::predicate::Predicate;
use crate::payload::Payload;
use crate::state::RunState;

/// Upstream bundle handed to a transform: producer node id → the value it emitted.
pub type Upstream = FxHashMap<NodeId, Payload>;

/// The user-supplied unit of computation. Implementors should be stateless and
/// deterministic; anything that needs to persist across nodes belongs in `RunState`.
#[async_trait]
pub trait Transform: Send + Sync {
    async fn call(
        &self,
        prompt: &Payload,
        upstream: &Upstream,
        state: &RunState,
    ) -> Result<Payload, TransformError>;
}

/// Adapts a plain closure into a `Transform`, mirroring how most nodes in practice are
/// one-liners rather than full trait impls.
pub struct FnTransform<F>(pub F);

#[async_trait]
impl<F, Fut> Transform for FnTransform<F>
where
    F: Fn(&Payload, &Upstream, &RunState) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Payload, TransformError>> + Send,
{
    async fn call(
        &self,
        prompt: &Payload,
        upstream: &Upstream,
        state: &RunState,
    ) -> Result<Payload, TransformError> {
        (self.0)(prompt, upstream, state).await
    }
}

/// Late-bound description, computed after upstream filtering so it can reference what
/// actually arrived.
pub type DescFn = Arc<dyn Fn(&Payload, &Upstream, &RunState) -> String + Send + Sync>;

/// Decides whether a node's output becomes the run's committed final output.
pub type DagOutputWhen =
    Arc<dyn Fn(&Payload, &Upstream, &Payload, ExecutionState) -> bool + Send + Sync>;

/// Upstream-acceptance policy used by the execution gate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GatePolicy {
    /// Every predecessor must finish (and every conditional predicate attached to an
    /// incoming edge must match) before this node may run.
    #[default]
    AllUpstreamAcceptable,
    /// At least one predecessor must be acceptable.
    AnyUpstreamAcceptable,
}

/// Lifecycle state of a node within a single run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionState {
    #[default]
    Initialized,
    Running,
    Finished,
    Aborted,
}

/// A registered vertex: identity, static attributes, and the transform to invoke.
pub struct NodeDef {
    pub id: NodeId,
    pub desc: Option<String>,
    pub desc_fn: Option<DescFn>,
    pub prompt: Option<Payload>,
    pub spec: Option<Payload>,
    pub transform: Arc<dyn Transform>,
    pub dag_output_when: Option<DagOutputWhen>,
    pub gate_policy: GatePolicy,
}

impl fmt::Debug for NodeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeDef")
            .field("id", &self.id)
            .field("desc", &self.desc)
            .field("gate_policy", &self.gate_policy)
            .finish_non_exhaustive()
    }
}

impl NodeDef {
    pub fn new(id: impl Into<NodeId>, transform: Arc<dyn Transform>) -> Self {
        Self {
            id: id.into(),
            desc: None,
            desc_fn: None,
            prompt: None,
            spec: None,
            transform,
            dag_output_when: None,
            gate_policy: GatePolicy::default(),
        }
    }

    #[must_use]
    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    #[must_use]
    pub fn with_desc_fn(mut self, desc_fn: DescFn) -> Self {
        self.desc_fn = Some(desc_fn);
        self
    }

    #[must_use]
    pub fn with_prompt(mut self, prompt: Payload) -> Self {
        self.prompt = Some(prompt);
        self
    }

    #[must_use]
    pub fn with_spec(mut self, spec: Payload) -> Self {
        self.spec = Some(spec);
        self
    }

    #[must_use]
    pub fn with_dag_output_when(mut self, rule: DagOutputWhen) -> Self {
        self.dag_output_when = Some(rule);
        self
    }

    #[must_use]
    pub fn with_gate_policy(mut self, policy: GatePolicy) -> Self {
        self.gate_policy = policy;
        self
    }
}

/// Per-run mutable fields for one node. Cleared by `reset()` between runs; the node's
/// static attributes (id, transform, gate policy, ...) live on `NodeDef` instead.
#[derive(Clone, Debug, Default)]
pub struct RunRecord {
    pub upstream_outputs: Upstream,
    pub upstream_exec_states: FxHashMap<NodeId, ExecutionState>,
    pub node_output: Option<Payload>,
    pub execution_state: ExecutionState,
    pub execution_condition: FxHashMap<NodeId, Predicate>,
    pub conditional_execution: bool,
    /// Description produced by the node's `desc_fn`, if any, once its upstream bundle
    /// is known. Falls back to `NodeDef::desc` wherever unset.
    pub resolved_desc: Option<String>,
}

impl RunRecord {
    pub fn reset(&mut self) {
        *self = RunRecord::default();
    }
}

/// Outcome of evaluating a node's gate against its current `RunRecord`.
#[derive(Debug)]
pub enum GateOutcome {
    /// The node may run; carries the set of producer ids whose output should be
    /// visible to the transform (unconditional-finished ∪ conditional-matched).
    Run(FxHashSet<NodeId>),
    /// Liveness failed; the node transitions to `Aborted` without invoking its
    /// transform.
    Abort,
}

/// Implements §4.3: fuse upstream completion state with conditional-edge predicates.
///
/// `predecessors` is the full set of this node's upstream ids as known to the graph
/// (not just the ones that have reported in yet).
pub fn evaluate_gate(record: &RunRecord, gate_policy: GatePolicy, predecessors: &[NodeId]) -> GateOutcome {
    let finished_upstream: FxHashSet<NodeId> = record
        .upstream_exec_states
        .iter()
        .filter(|(_, state)| **state == ExecutionState::Finished)
        .map(|(id, _)| id.clone())
        .collect();
    let total_upstream: FxHashSet<NodeId> = predecessors.iter().cloned().collect();

    let liveness_ok = match gate_policy {
        GatePolicy::AllUpstreamAcceptable => finished_upstream == total_upstream,
        GatePolicy::AnyUpstreamAcceptable => !finished_upstream.is_empty(),
    };
    if !liveness_ok {
        return GateOutcome::Abort;
    }

    if !record.conditional_execution {
        return GateOutcome::Run(finished_upstream);
    }

    let conditioned: FxHashSet<NodeId> = record.execution_condition.keys().cloned().collect();
    let conditional_ok: FxHashSet<NodeId> = record
        .execution_condition
        .iter()
        .filter(|(producer, predicate)| {
            record
                .upstream_outputs
                .get(*producer)
                .map(|output| predicate.matches(output))
                .unwrap_or(false)
        })
        .map(|(producer, _)| producer.clone())
        .collect();
    let unconditional_finished: FxHashSet<NodeId> = finished_upstream
        .difference(&conditioned)
        .cloned()
        .collect();
    let acceptable: FxHashSet<NodeId> = conditional_ok
        .union(&unconditional_finished)
        .cloned()
        .collect();

    let acceptable_ok = match gate_policy {
        GatePolicy::AllUpstreamAcceptable => acceptable == total_upstream,
        GatePolicy::AnyUpstreamAcceptable => !acceptable.is_empty(),
    };

    if acceptable_ok {
        GateOutcome::Run(acceptable)
    } else {
        GateOutcome::Abort
    }
}
