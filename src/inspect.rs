//! Human-readable execution tree, grounded in the original implementation's
//! `walk_dag`/`show_tree` console renderer: per-node state, output, and whether each
//! incoming conditional edge's predicate matched.

use std::fmt;

use crate::errors::{execution_state_label, NodeId};
use crate::executor::Executor;
use crate::graph::Graph;
use crate::node::ExecutionState;
use crate::payload::Payload;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// Whether an incoming conditional edge's predicate matched by the time its child ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionNote {
    Met,
    NotMet,
}

/// One node's rendered subtree.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub id: NodeId,
    pub desc: Option<String>,
    pub execution_state: ExecutionState,
    pub output: Option<Payload>,
    pub condition: Option<ConditionNote>,
    pub children: Vec<TreeNode>,
}

/// The full execution tree for one run: the input plus every source node's subtree.
#[derive(Debug, Clone)]
pub struct Tree {
    pub input: Payload,
    pub roots: Vec<TreeNode>,
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{RED}DAG INPUT:{RESET} {}", self.input)?;
        for (i, root) in self.roots.iter().enumerate() {
            let is_last = i + 1 == self.roots.len();
            write_node(f, root, "", is_last)?;
        }
        Ok(())
    }
}

fn write_node(f: &mut fmt::Formatter<'_>, node: &TreeNode, prefix: &str, is_last: bool) -> fmt::Result {
    let connector = if is_last { "└── " } else { "├── " };
    let marker = match node.execution_state {
        ExecutionState::Finished => format!("{GREEN}(√){RESET}"),
        ExecutionState::Aborted => format!("{RED}(X){RESET}"),
        _ => "(-)".to_string(),
    };
    let condition = match node.condition {
        Some(ConditionNote::Met) => " CONDITION MET".to_string(),
        Some(ConditionNote::NotMet) => " CONDITION NOT MET".to_string(),
        None => String::new(),
    };
    let desc = node
        .desc
        .as_deref()
        .map(|d| format!(" (DESC: {d})"))
        .unwrap_or_default();
    let dim = matches!(node.execution_state, ExecutionState::Aborted) || matches!(node.condition, Some(ConditionNote::NotMet));
    let (open, close) = if dim { (DIM, RESET) } else { ("", "") };

    writeln!(
        f,
        "{prefix}{connector}{open}{}{desc} {marker}{condition}{close}",
        node.id
    )?;
    if let Some(output) = &node.output {
        writeln!(f, "{prefix}{}    {RED}OUTPUT:{RESET} {output}", if is_last { "    " } else { "│   " })?;
    }

    let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
    for (i, child) in node.children.iter().enumerate() {
        let child_is_last = i + 1 == node.children.len();
        write_node(f, child, &child_prefix, child_is_last)?;
    }
    Ok(())
}

/// Builds the tree by walking from every source node, sorting siblings by id at each
/// level (mirrors the original's `sorted(child_nodes, key=lambda x: x.node_id)`).
pub fn build_tree(graph: &Graph, executor: &Executor) -> Tree {
    let mut roots: Vec<NodeId> = graph.sources();
    roots.sort();
    let root_nodes = roots
        .iter()
        .map(|id| build_node(graph, executor, id, None))
        .collect();
    Tree {
        input: executor.state().input(),
        roots: root_nodes,
    }
}

fn build_node(graph: &Graph, executor: &Executor, id: &str, parent: Option<&str>) -> TreeNode {
    let node = graph.node(id).expect("id came from graph topology");
    let record = executor.snapshot_record(id).unwrap_or_default();

    let condition = parent.and_then(|parent_id| {
        record.execution_condition.get(parent_id).map(|predicate| {
            let matched = record
                .upstream_outputs
                .get(parent_id)
                .map(|output| predicate.matches(output))
                .unwrap_or(false);
            if matched {
                ConditionNote::Met
            } else {
                ConditionNote::NotMet
            }
        })
    });

    let mut children: Vec<NodeId> = graph.successors(id).to_vec();
    children.sort();
    let children = children
        .iter()
        .map(|child_id| build_node(graph, executor, child_id, Some(id)))
        .collect();

    TreeNode {
        id: id.to_string(),
        desc: record.resolved_desc.clone().or_else(|| node.desc.clone()),
        execution_state: record.execution_state,
        output: record.node_output.clone(),
        condition,
        children,
    }
}

/// Shorthand used by diagnostics and tests that just want the execution-state glyph.
pub fn state_label(state: ExecutionState) -> &'static str {
    execution_state_label(state)
}
