//! Error taxonomy for graph construction, predicate evaluation, and run execution.
//!
//! Mirrors the layering described by the execution engine: construction errors are
//! raised at authoring time, delivery-time conflicts surface the first time a producer
//! actually hands a value to a successor, and transform errors abort the run with
//! node-id/step context attached.

use miette::Diagnostic;
use thiserror::Error;

use crate::node::ExecutionState;
use crate::predicate::Predicate;

pub type NodeId = String;

/// Errors raised while building or compiling a graph.
#[derive(Debug, Error, Diagnostic)]
pub enum GraphSyntaxError {
    #[error("node `{id}` is already registered")]
    #[diagnostic(
        code(weavedag::graph::duplicate_node),
        help("node ids must be unique within a graph; pick a different id or remove the earlier registration")
    )]
    DuplicateNode { id: NodeId },

    #[error("node `{id}` is not registered in this graph")]
    #[diagnostic(
        code(weavedag::graph::unknown_node),
        help("register the node with `add_node` before connecting it")
    )]
    UnknownNode { id: NodeId },

    #[error("graph contains a cycle; nodes {} never reach zero indegree", involved.join(", "))]
    #[diagnostic(
        code(weavedag::graph::cycle_detected),
        help("this engine does not support cycles or back-edges; break the cycle before compiling")
    )]
    CycleDetected { involved: Vec<NodeId> },
}

/// Raised when two distinct predicates are declared for the same producer/consumer edge.
///
/// Conflicts are built up at `connect_if` time but only surface here the first time the
/// producer actually delivers a result to the successor, matching the source system's
/// late-detection behavior (see the design notes for the tradeoff).
#[derive(Debug, Error, Diagnostic)]
#[error("conflicting conditional edges from `{from}` to `{to}`: {first:?} vs {second:?}")]
#[diagnostic(
    code(weavedag::graph::conflicting_conditions),
    help("declare only one `connect_if(from, predicate, to)` per producer/consumer pair")
)]
pub struct ConflictingConditionsError {
    pub from: NodeId,
    pub to: NodeId,
    pub first: Predicate,
    pub second: Predicate,
}

/// Errors raised inside a node's transform callback.
#[derive(Debug, Error, Diagnostic)]
pub enum TransformError {
    #[error("node `{node_id}` expected upstream input `{what}` but it was missing")]
    #[diagnostic(code(weavedag::node::missing_input))]
    MissingInput { node_id: NodeId, what: &'static str },

    #[error("node `{node_id}` failed: {message}")]
    #[diagnostic(code(weavedag::node::failed))]
    Failed { node_id: NodeId, message: String },

    #[error("node `{node_id}` payload error: {source}")]
    #[diagnostic(code(weavedag::node::serde))]
    Serde {
        node_id: NodeId,
        #[source]
        source: serde_json::Error,
    },
}

impl TransformError {
    pub fn node_id(&self) -> &str {
        match self {
            TransformError::MissingInput { node_id, .. } => node_id,
            TransformError::Failed { node_id, .. } => node_id,
            TransformError::Serde { node_id, .. } => node_id,
        }
    }
}

/// Errors surfaced by the scheduler driving a run to completion.
#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    #[error("graph syntax error: {0}")]
    #[diagnostic(transparent)]
    Syntax(#[from] GraphSyntaxError),

    #[error("conflicting conditional edges: {0}")]
    #[diagnostic(transparent)]
    Conflict(#[from] ConflictingConditionsError),

    #[error("node `{node_id}` (step {step}) failed: {source}")]
    #[diagnostic(code(weavedag::scheduler::node_run))]
    NodeRun {
        node_id: NodeId,
        step: u64,
        #[source]
        source: TransformError,
    },

    #[error("graph has no source nodes (every node has at least one predecessor)")]
    #[diagnostic(
        code(weavedag::scheduler::no_sources),
        help("every run needs at least one node with indegree zero to seed the ready set")
    )]
    NoSources,

    #[error("worker task panicked or was cancelled: {0}")]
    #[diagnostic(code(weavedag::scheduler::join))]
    Join(#[from] tokio::task::JoinError),
}

/// A node's liveness/acceptability computation never mutates shared state, so predicate
/// evaluation failures are not fatal; they just resolve to a boolean and are logged here.
pub fn log_predicate_failure(which: &str, error: &dyn std::error::Error) {
    tracing::warn!(target: "weavedag::predicate", which, %error, "predicate evaluation raised; resolving per combinator's error policy");
}

pub fn execution_state_label(state: ExecutionState) -> &'static str {
    match state {
        ExecutionState::Initialized => "initialized",
        ExecutionState::Running => "running",
        ExecutionState::Finished => "finished",
        ExecutionState::Aborted => "aborted",
    }
}
