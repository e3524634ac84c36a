use std::fmt;

use serde::{Deserialize, Serialize};

use crate::node::ExecutionState;
use crate::payload::Payload;

pub const STREAM_END_SCOPE: &str = "__weavedag_stream_end__";

/// Fire-and-forget events published on the event bus: per-node lifecycle, aggregate
/// progress, and free-form diagnostics (predicate failures, conflict detection,
/// construction errors).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum Event {
    Node(NodeEvent),
    Diagnostic(DiagnosticEvent),
    NodeStarted { node_id: String, desc: String },
    NodeFinished {
        node_id: String,
        desc: String,
        execution_state: ExecutionState,
        output: Option<Payload>,
    },
    Progress { finished: usize, total: usize },
}

impl Event {
    pub fn node_message(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Event::Node(NodeEvent::new(None, None, scope.into(), message.into()))
    }

    pub fn node_message_with_meta(
        node_id: impl Into<String>,
        step: u64,
        scope: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Event::Node(NodeEvent::new(
            Some(node_id.into()),
            Some(step),
            scope.into(),
            message.into(),
        ))
    }

    pub fn diagnostic(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Event::Diagnostic(DiagnosticEvent {
            scope: scope.into(),
            message: message.into(),
        })
    }

    pub fn node_started(node_id: impl Into<String>, desc: impl Into<String>) -> Self {
        Event::NodeStarted {
            node_id: node_id.into(),
            desc: desc.into(),
        }
    }

    pub fn node_finished(
        node_id: impl Into<String>,
        desc: impl Into<String>,
        execution_state: ExecutionState,
        output: Option<Payload>,
    ) -> Self {
        Event::NodeFinished {
            node_id: node_id.into(),
            desc: desc.into(),
            execution_state,
            output,
        }
    }

    pub fn progress(finished: usize, total: usize) -> Self {
        Event::Progress { finished, total }
    }

    pub fn scope_label(&self) -> Option<&str> {
        match self {
            Event::Node(node) => Some(node.scope()),
            Event::Diagnostic(diag) => Some(diag.scope()),
            Event::NodeStarted { .. } => Some("node_started"),
            Event::NodeFinished { .. } => Some("node_finished"),
            Event::Progress { .. } => Some("progress"),
        }
    }

    pub fn message(&self) -> String {
        match self {
            Event::Node(node) => node.message().to_string(),
            Event::Diagnostic(diag) => diag.message().to_string(),
            Event::NodeStarted { node_id, desc } => format!("{node_id} started: {desc}"),
            Event::NodeFinished {
                node_id,
                desc,
                execution_state,
                ..
            } => format!(
                "{node_id} {desc}: {}",
                crate::errors::execution_state_label(*execution_state)
            ),
            Event::Progress { finished, total } => format!("{finished}/{total} nodes finished"),
        }
    }

    /// Convert event to structured JSON value with a normalized schema.
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "type": self.scope_label(),
            "message": self.message(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "payload": self,
        })
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_json_value())
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_json_value())
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Node(node) => match (node.node_id(), node.step()) {
                (Some(id), Some(step)) => write!(f, "[{id}@{step}] {}", node.message()),
                (Some(id), None) => write!(f, "[{id}] {}", node.message()),
                (None, Some(step)) => write!(f, "[step {step}] {}", node.message()),
                (None, None) => write!(f, "{}", node.message()),
            },
            Event::Diagnostic(diag) => write!(f, "{}", diag.message()),
            other => write!(f, "{}", other.message()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NodeEvent {
    node_id: Option<String>,
    step: Option<u64>,
    scope: String,
    message: String,
}

impl NodeEvent {
    pub fn new(node_id: Option<String>, step: Option<u64>, scope: String, message: String) -> Self {
        Self {
            node_id,
            step,
            scope,
            message,
        }
    }

    pub fn node_id(&self) -> Option<&str> {
        self.node_id.as_deref()
    }

    pub fn step(&self) -> Option<u64> {
        self.step
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DiagnosticEvent {
    scope: String,
    message: String,
}

impl DiagnosticEvent {
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
