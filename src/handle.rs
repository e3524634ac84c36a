//! The authoring/run surface embedders interact with: a `Handle` accumulates nodes and
//! edges, then drives a run through the scheduler. Construction errors from `connect`,
//! `connect_if`, and `add_node` are deferred (stored, not returned) so calls chain the
//! way the original `App`/`GraphBuilder` fluent surface did; the first error short-
//! circuits every later call and surfaces at `compile()`/`run()` time.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::errors::{GraphSyntaxError, NodeId, RunnerError};
use crate::event_bus::{EventBus, EventEmitter};
use crate::executor::Executor;
use crate::graph::{Graph, GraphBuilder};
use crate::inspect::Tree;
use crate::node::{GatePolicy, NodeDef};
use crate::payload::Payload;
use crate::predicate::Predicate;
use crate::scheduler::{self, RunOptions, RunReport};
use crate::state::RunState;

/// An attribute snapshot for one node, returned by [`Handle::info_node`].
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub id: NodeId,
    pub desc: Option<String>,
    pub gate_policy: GatePolicy,
    pub predecessors: Vec<NodeId>,
    pub successors: Vec<NodeId>,
}

/// An attribute snapshot of the whole run, returned by [`Handle::info`].
#[derive(Debug, Clone)]
pub struct RunInfo {
    pub node_count: usize,
    pub nodes: Vec<NodeInfo>,
    pub input: Payload,
}

/// Begins a build context, accumulates nodes/edges, then drives the run.
///
/// ```
/// use weavedag::handle::Handle;
/// use weavedag::node::{FnTransform, NodeDef};
/// use weavedag::payload::Payload;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let echo: Arc<dyn weavedag::node::Transform> = Arc::new(FnTransform(
///     |prompt: &Payload, _upstream: &_, _state: &_| {
///         let prompt = prompt.clone();
///         async move { Ok(prompt) }
///     },
/// ));
///
/// let mut handle = Handle::open_run(Payload::text("hello"));
/// handle.add_node(NodeDef::new("echo", echo));
/// let report = handle.run(None).await?;
/// assert_eq!(report.output, Some(Payload::text("hello")));
/// # Ok(())
/// # }
/// ```
pub struct Handle {
    input: Payload,
    builder: GraphBuilder,
    error: Option<GraphSyntaxError>,
    bus: EventBus,
    graph: Option<Arc<Graph>>,
    executor: Option<Arc<Executor>>,
}

impl Handle {
    pub fn open_run(input: Payload) -> Self {
        Self {
            input,
            builder: GraphBuilder::new(),
            error: None,
            bus: EventBus::default(),
            graph: None,
            executor: None,
        }
    }

    /// Replace the default stdout-only event bus, e.g. to attach a `MemorySink` or
    /// `ChannelSink` before running.
    #[must_use]
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self
    }

    pub fn add_node(&mut self, node: NodeDef) -> &mut Self {
        self.apply(|b| b.add_node(node))
    }

    pub fn connect(&mut self, from: &str, to: &str) -> &mut Self {
        self.apply(|b| b.connect(from, to))
    }

    pub fn connect_if(&mut self, from: &str, predicate: Predicate, to: &str) -> &mut Self {
        self.apply(|b| b.connect_if(from, predicate, to))
    }

    pub fn set_gate_policy(&mut self, id: &str, policy: GatePolicy) -> &mut Self {
        self.apply(|b| b.set_gate_policy(id, policy))
    }

    fn apply(
        &mut self,
        f: impl FnOnce(GraphBuilder) -> Result<GraphBuilder, GraphSyntaxError>,
    ) -> &mut Self {
        if self.error.is_none() {
            let builder = std::mem::take(&mut self.builder);
            match f(builder) {
                Ok(b) => self.builder = b,
                Err(e) => self.error = Some(e),
            }
        }
        self
    }

    /// Compiles the accumulated graph (first call only; later calls reuse the result)
    /// and seeds fresh run state and an executor for it.
    fn prepare(&mut self) -> Result<(), RunnerError> {
        if let Some(err) = self.error.take() {
            return Err(RunnerError::Syntax(err));
        }
        if self.graph.is_none() {
            let specs = self.builder.specs();
            let builder = std::mem::take(&mut self.builder);
            let graph = Arc::new(builder.compile()?);
            let state = Arc::new(RunState::new(self.input.clone(), specs));
            let emitter = self.bus.get_emitter();
            let executor = Arc::new(Executor::new(graph.clone(), state, emitter));
            self.graph = Some(graph);
            self.executor = Some(executor);
        }
        Ok(())
    }

    /// Drives the compiled graph to completion. Subsequent calls reuse the same
    /// compiled `Graph` but run against freshly `reset()` per-node records unless the
    /// caller calls `run` again without `reset` in between, in which case aborted/
    /// finished state from the previous run still gates the gate evaluation — call
    /// [`Handle::reset`] first for an independent re-run.
    pub async fn run(&mut self, options: Option<RunOptions>) -> Result<RunReport, RunnerError> {
        self.prepare()?;
        let executor = self.executor.clone().expect("prepare() populates executor");
        let emitter = self.bus.get_emitter();
        scheduler::run(executor, emitter, options.unwrap_or_default()).await
    }

    /// Clears every node's per-run mutable fields (`RunRecord`), leaving the compiled
    /// graph and its topology intact for another run.
    pub fn reset(&mut self) -> Result<(), RunnerError> {
        self.prepare()?;
        if let Some(executor) = &self.executor {
            executor.reset_all();
        }
        Ok(())
    }

    /// A human-readable tree: per-node state, output, and whether each incoming
    /// conditional edge's predicate matched.
    pub fn inspect(&mut self) -> Result<Tree, RunnerError> {
        self.prepare()?;
        let graph = self.graph.clone().expect("prepare() populates graph");
        let executor = self.executor.clone().expect("prepare() populates executor");
        Ok(crate::inspect::build_tree(&graph, &executor))
    }

    /// Attribute snapshot for the whole run, for debugging.
    pub fn info(&mut self) -> Result<RunInfo, RunnerError> {
        self.prepare()?;
        let graph = self.graph.clone().expect("prepare() populates graph");
        let nodes = graph
            .vertices()
            .map(|id| node_info(&graph, id))
            .collect::<Vec<_>>();
        Ok(RunInfo {
            node_count: nodes.len(),
            nodes,
            input: self.input.clone(),
        })
    }

    /// Attribute snapshot for a single node, for debugging.
    pub fn info_node(&mut self, id: &str) -> Result<Option<NodeInfo>, RunnerError> {
        self.prepare()?;
        let graph = self.graph.clone().expect("prepare() populates graph");
        Ok(graph.node(id).map(|_| node_info(&graph, id)))
    }

    /// Every registered node's `spec`, keyed by id, as currently accumulated. Available
    /// before `run()`/`compile()` so hosts can inspect authoring-time state.
    pub fn get_all_specs(&self) -> FxHashMap<NodeId, Payload> {
        self.builder.specs()
    }

    pub fn get_emitter(&self) -> Arc<dyn EventEmitter> {
        self.bus.get_emitter()
    }
}

fn node_info(graph: &Graph, id: &str) -> NodeInfo {
    let node = graph.node(id).expect("id came from graph.vertices()");
    NodeInfo {
        id: id.to_string(),
        desc: node.desc.clone(),
        gate_policy: node.gate_policy,
        predecessors: graph.predecessors(id).to_vec(),
        successors: graph.successors(id).to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{FnTransform, Transform, Upstream};
    use crate::state::RunState;

    fn echo() -> Arc<dyn Transform> {
        Arc::new(FnTransform(
            |prompt: &Payload, _upstream: &Upstream, _state: &RunState| {
                let prompt = prompt.clone();
                async move { Ok(prompt) }
            },
        ))
    }

    #[tokio::test]
    async fn single_node_run_commits_its_output() {
        let mut handle = Handle::open_run(Payload::text("hi"));
        handle.add_node(NodeDef::new("only", echo()));
        let report = handle.run(None).await.unwrap();
        assert_eq!(report.output, Some(Payload::text("hi")));
        assert_eq!(report.output_by_node_id, Some("only".to_string()));
    }

    #[tokio::test]
    async fn reset_allows_a_second_independent_run() {
        let mut handle = Handle::open_run(Payload::text("hi"));
        handle.add_node(NodeDef::new("only", echo()));
        handle.run(None).await.unwrap();
        handle.reset().unwrap();
        let report = handle.run(None).await.unwrap();
        assert_eq!(report.output, Some(Payload::text("hi")));
    }

    #[tokio::test]
    async fn deferred_error_surfaces_at_run_time() {
        let mut handle = Handle::open_run(Payload::Null);
        handle.connect("ghost", "also-ghost");
        let result = handle.run(None).await;
        assert!(matches!(result, Err(RunnerError::Syntax(GraphSyntaxError::UnknownNode { .. }))));
    }

    #[test]
    fn info_reports_every_registered_node() {
        let mut handle = Handle::open_run(Payload::Null);
        handle.add_node(NodeDef::new("a", echo()).with_desc("first"));
        let info = handle.info().unwrap();
        assert_eq!(info.node_count, 1);
        assert_eq!(info.nodes[0].desc.as_deref(), Some("first"));
    }
}
