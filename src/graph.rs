//! The graph store: vertices, edges, indegree bookkeeping, and cycle detection.
//!
//! `GraphBuilder` is the authoring surface described in the design: every call is
//! explicit and threaded through the returned builder — there is no global "current
//! graph" and no shift-operator sugar for edges.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::errors::{GraphSyntaxError, NodeId};
use crate::node::{DagOutputWhen, ExecutionState, NodeDef};
use crate::predicate::Predicate;

/// A compiled, immutable graph ready to be run by the scheduler.
pub struct Graph {
    pub(crate) nodes: FxHashMap<NodeId, Arc<NodeDef>>,
    pub(crate) order: Vec<NodeId>,
    pub(crate) edges: FxHashMap<NodeId, Vec<NodeId>>,
    pub(crate) predecessors: FxHashMap<NodeId, Vec<NodeId>>,
    pub(crate) conditional_edges: FxHashMap<(NodeId, NodeId), Vec<Predicate>>,
}

impl Graph {
    pub fn node(&self, id: &str) -> Option<&Arc<NodeDef>> {
        self.nodes.get(id)
    }

    pub fn vertices(&self) -> impl Iterator<Item = &NodeId> {
        self.order.iter()
    }

    pub fn successors(&self, id: &str) -> &[NodeId] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn predecessors(&self, id: &str) -> &[NodeId] {
        self.predecessors.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn indegree(&self, id: &str) -> usize {
        self.predecessors(id).len()
    }

    pub fn sources(&self) -> Vec<NodeId> {
        self.order
            .iter()
            .filter(|id| self.indegree(id) == 0)
            .cloned()
            .collect()
    }

    pub fn terminals(&self) -> Vec<NodeId> {
        self.order
            .iter()
            .filter(|id| self.successors(id).is_empty())
            .cloned()
            .collect()
    }

    /// Predicate declared (at `connect_if` time) from `from` to `to`, if the edge is
    /// conditional. Only the *first* registered predicate is returned here — conflicts
    /// among several are detected lazily by the executor at delivery time.
    pub fn predicate_for(&self, from: &str, to: &str) -> Option<&Predicate> {
        self.conditional_edges
            .get(&(from.to_string(), to.to_string()))
            .and_then(|preds| preds.first())
    }

    pub fn all_predicates_for(&self, from: &str, to: &str) -> &[Predicate] {
        self.conditional_edges
            .get(&(from.to_string(), to.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Builder for a `Graph`. Nodes and edges accumulate via fluent calls; `compile()`
/// validates and performs the one-time cycle check.
#[derive(Default)]
pub struct GraphBuilder {
    nodes: FxHashMap<NodeId, Arc<NodeDef>>,
    order: Vec<NodeId>,
    edges: FxHashMap<NodeId, Vec<NodeId>>,
    conditional_edges: FxHashMap<(NodeId, NodeId), Vec<Predicate>>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a vertex. Returns a `GraphSyntaxError::DuplicateNode` if `id` was
    /// already registered.
    pub fn add_node(mut self, node: NodeDef) -> Result<Self, GraphSyntaxError> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphSyntaxError::DuplicateNode { id: node.id });
        }
        self.order.push(node.id.clone());
        self.nodes.insert(node.id.clone(), Arc::new(node));
        Ok(self)
    }

    /// An unconditional edge `from -> to`.
    pub fn connect(mut self, from: &str, to: &str) -> Result<Self, GraphSyntaxError> {
        self.require_registered(from)?;
        self.require_registered(to)?;
        self.edges
            .entry(from.to_string())
            .or_default()
            .push(to.to_string());
        Ok(self)
    }

    /// A conditional edge `from -> to`, gated by `predicate`. Multiple predicates may
    /// be declared for the same pair; if they differ, a `ConflictingConditionsError` is
    /// raised lazily by the executor the first time `from` delivers to `to`.
    pub fn connect_if(
        mut self,
        from: &str,
        predicate: Predicate,
        to: &str,
    ) -> Result<Self, GraphSyntaxError> {
        self.require_registered(from)?;
        self.require_registered(to)?;
        self.edges
            .entry(from.to_string())
            .or_default()
            .push(to.to_string());
        self.conditional_edges
            .entry((from.to_string(), to.to_string()))
            .or_default()
            .push(predicate);
        Ok(self)
    }

    /// Every registered node's `spec`, keyed by id. Used to seed `RunState`'s reserved
    /// `specs` entry before a run starts.
    pub fn specs(&self) -> FxHashMap<NodeId, crate::payload::Payload> {
        self.nodes
            .iter()
            .filter_map(|(id, node)| node.spec.clone().map(|spec| (id.clone(), spec)))
            .collect()
    }

    /// Selects the upstream-acceptance policy used by the node's execution gate.
    pub fn set_gate_policy(
        mut self,
        id: &str,
        policy: crate::node::GatePolicy,
    ) -> Result<Self, GraphSyntaxError> {
        self.require_registered(id)?;
        let node = self.nodes.get_mut(id).expect("just checked registration");
        Arc::get_mut(node)
            .expect("node Arc not yet shared before compile")
            .gate_policy = policy;
        Ok(self)
    }

    fn require_registered(&self, id: &str) -> Result<(), GraphSyntaxError> {
        if self.nodes.contains_key(id) {
            Ok(())
        } else {
            Err(GraphSyntaxError::UnknownNode { id: id.to_string() })
        }
    }

    /// Validate and freeze the graph. Runs Kahn's-algorithm topological sort purely to
    /// detect cycles — the scheduler computes its own runtime order. Every terminal node
    /// (no successors) that hasn't been given an explicit `dag_output_when` rule gets the
    /// default: commit its output iff it didn't abort.
    pub fn compile(mut self) -> Result<Graph, GraphSyntaxError> {
        let predecessors = Self::invert(&self.order, &self.edges);
        detect_cycle(&self.order, &self.edges, &predecessors)?;

        let terminals: Vec<NodeId> = self
            .order
            .iter()
            .filter(|id| self.edges.get(*id).map(Vec::is_empty).unwrap_or(true))
            .cloned()
            .collect();
        for id in &terminals {
            let node = self.nodes.get_mut(id).expect("terminal id came from self.order");
            if node.dag_output_when.is_none() {
                let rule: DagOutputWhen = Arc::new(|_prompt, _upstream, _output, state| {
                    state != ExecutionState::Aborted
                });
                Arc::get_mut(node)
                    .expect("node Arc not yet shared before compile")
                    .dag_output_when = Some(rule);
            }
        }

        Ok(Graph {
            nodes: self.nodes,
            order: self.order,
            edges: self.edges,
            predecessors,
            conditional_edges: self.conditional_edges,
        })
    }

    fn invert(
        order: &[NodeId],
        edges: &FxHashMap<NodeId, Vec<NodeId>>,
    ) -> FxHashMap<NodeId, Vec<NodeId>> {
        let mut predecessors: FxHashMap<NodeId, Vec<NodeId>> =
            order.iter().map(|id| (id.clone(), Vec::new())).collect();
        for (from, targets) in edges {
            for to in targets {
                predecessors.entry(to.clone()).or_default().push(from.clone());
            }
        }
        predecessors
    }
}

/// Kahn's algorithm: repeatedly remove zero-indegree vertices. A result that doesn't
/// cover every vertex means a cycle remains among what's left.
fn detect_cycle(
    order: &[NodeId],
    edges: &FxHashMap<NodeId, Vec<NodeId>>,
    predecessors: &FxHashMap<NodeId, Vec<NodeId>>,
) -> Result<Vec<NodeId>, GraphSyntaxError> {
    let mut indegree: FxHashMap<NodeId, usize> = order
        .iter()
        .map(|id| (id.clone(), predecessors.get(id).map(Vec::len).unwrap_or(0)))
        .collect();

    let mut queue: Vec<NodeId> = order
        .iter()
        .filter(|id| indegree.get(*id).copied().unwrap_or(0) == 0)
        .cloned()
        .collect();
    queue.sort();

    let mut visited = Vec::with_capacity(order.len());
    let mut cursor = 0;
    while cursor < queue.len() {
        let current = queue[cursor].clone();
        cursor += 1;
        visited.push(current.clone());

        let mut newly_ready = Vec::new();
        for successor in edges.get(&current).map(Vec::as_slice).unwrap_or(&[]) {
            let entry = indegree.entry(successor.clone()).or_insert(0);
            *entry -= 1;
            if *entry == 0 {
                newly_ready.push(successor.clone());
            }
        }
        newly_ready.sort();
        queue.extend(newly_ready);
    }

    if visited.len() == order.len() {
        Ok(visited)
    } else {
        let involved: Vec<NodeId> = order
            .iter()
            .filter(|id| !visited.contains(id))
            .cloned()
            .collect();
        Err(GraphSyntaxError::CycleDetected { involved })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{FnTransform, NodeDef};
    use crate::payload::Payload;
    use crate::state::RunState;
    use std::sync::Arc;

    fn node(id: &str) -> NodeDef {
        let transform: Arc<dyn crate::node::Transform> = Arc::new(FnTransform(
            |_prompt: &Payload, _upstream: &crate::node::Upstream, _state: &RunState| async {
                Ok(Payload::Null)
            },
        ));
        NodeDef::new(id, transform)
    }

    #[test]
    fn linear_chain_compiles_with_expected_indegree() {
        let graph = GraphBuilder::new()
            .add_node(node("a"))
            .unwrap()
            .add_node(node("b"))
            .unwrap()
            .connect("a", "b")
            .unwrap()
            .compile()
            .unwrap();
        assert_eq!(graph.indegree("a"), 0);
        assert_eq!(graph.indegree("b"), 1);
        assert_eq!(graph.sources(), vec!["a".to_string()]);
        assert_eq!(graph.terminals(), vec!["b".to_string()]);
    }

    #[test]
    fn cycle_is_rejected_at_compile_time() {
        let result = GraphBuilder::new()
            .add_node(node("a"))
            .unwrap()
            .add_node(node("b"))
            .unwrap()
            .connect("a", "b")
            .unwrap()
            .connect("b", "a")
            .unwrap()
            .compile();
        assert!(matches!(result, Err(GraphSyntaxError::CycleDetected { .. })));
    }

    #[test]
    fn connecting_unknown_node_errors() {
        let result = GraphBuilder::new().add_node(node("a")).unwrap().connect("a", "ghost");
        assert!(matches!(result, Err(GraphSyntaxError::UnknownNode { .. })));
    }

    #[test]
    fn duplicate_node_registration_errors() {
        let result = GraphBuilder::new().add_node(node("a")).unwrap().add_node(node("a"));
        assert!(matches!(result, Err(GraphSyntaxError::DuplicateNode { .. })));
    }

    #[test]
    fn terminal_nodes_get_a_default_dag_output_when_rule() {
        let graph = GraphBuilder::new()
            .add_node(node("a"))
            .unwrap()
            .add_node(node("b"))
            .unwrap()
            .connect("a", "b")
            .unwrap()
            .compile()
            .unwrap();

        let rule = graph.node("b").unwrap().dag_output_when.clone().unwrap();
        assert!(rule(&Payload::Null, &crate::node::Upstream::default(), &Payload::Null, crate::node::ExecutionState::Finished));
        assert!(!rule(&Payload::Null, &crate::node::Upstream::default(), &Payload::Null, crate::node::ExecutionState::Aborted));
        assert!(graph.node("a").unwrap().dag_output_when.is_none());
    }

    #[test]
    fn set_gate_policy_updates_the_registered_node() {
        let graph = GraphBuilder::new()
            .add_node(node("a"))
            .unwrap()
            .set_gate_policy("a", crate::node::GatePolicy::AnyUpstreamAcceptable)
            .unwrap()
            .compile()
            .unwrap();
        assert_eq!(
            graph.node("a").unwrap().gate_policy,
            crate::node::GatePolicy::AnyUpstreamAcceptable
        );
    }
}
