//! Shared per-run state.
//!
//! A single `RunState` is created per run and handed to every transform as `Arc<RunState>`.
//! Reserved keys (`input`, `specs`, `output`, `output_by_node_id`) are written only by the
//! scheduler; everything else is a freeform map transforms may read and write through an
//! interior-mutability lock, so the engine never needs `&mut` access mid-superstep.

use rustc_hash::FxHashMap;

use crate::errors::NodeId;
use crate::payload::Payload;

const KEY_INPUT: &str = "input";
const KEY_SPECS: &str = "specs";
const KEY_OUTPUT: &str = "output";
const KEY_OUTPUT_BY_NODE_ID: &str = "output_by_node_id";

/// Shared mutable state threaded through every node in a run.
#[derive(Debug, Default)]
pub struct RunState {
    inner: parking_lot::RwLock<FxHashMap<String, Payload>>,
}

impl RunState {
    /// Construct run state seeded with the run's initial input and every registered
    /// node's spec (keyed by node id, in registration order).
    pub fn new(input: Payload, specs: FxHashMap<NodeId, Payload>) -> Self {
        let mut map = FxHashMap::default();
        map.insert(KEY_INPUT.to_string(), input);
        map.insert(
            KEY_SPECS.to_string(),
            Payload::Mapping(specs.into_iter().collect()),
        );
        Self {
            inner: parking_lot::RwLock::new(map),
        }
    }

    pub fn input(&self) -> Payload {
        self.inner
            .read()
            .get(KEY_INPUT)
            .cloned()
            .unwrap_or(Payload::Null)
    }

    pub fn specs(&self) -> Payload {
        self.inner
            .read()
            .get(KEY_SPECS)
            .cloned()
            .unwrap_or(Payload::Null)
    }

    pub fn output(&self) -> Option<Payload> {
        self.inner.read().get(KEY_OUTPUT).cloned()
    }

    pub fn output_by_node_id(&self) -> Option<NodeId> {
        match self.inner.read().get(KEY_OUTPUT_BY_NODE_ID) {
            Some(Payload::Text(id)) => Some(id.clone()),
            _ => None,
        }
    }

    /// Commit a node's output as the run's final output. Called by the driver only;
    /// transforms never call this directly.
    pub(crate) fn commit_output(&self, node_id: &NodeId, output: Payload) {
        let mut guard = self.inner.write();
        guard.insert(KEY_OUTPUT.to_string(), output);
        guard.insert(
            KEY_OUTPUT_BY_NODE_ID.to_string(),
            Payload::Text(node_id.clone()),
        );
    }

    /// Read an arbitrary (non-reserved) key from the freeform map.
    pub fn get(&self, key: &str) -> Option<Payload> {
        self.inner.read().get(key).cloned()
    }

    /// Write an arbitrary (non-reserved) key into the freeform map. Transforms use this
    /// to pass side-channel data to later nodes.
    pub fn set(&self, key: impl Into<String>, value: Payload) {
        self.inner.write().insert(key.into(), value);
    }

    /// Snapshot the entire freeform map, reserved keys included. Used by `info(handle)`.
    pub fn snapshot(&self) -> FxHashMap<String, Payload> {
        self.inner.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_keys_seeded_at_construction() {
        let mut specs = FxHashMap::default();
        specs.insert("a".to_string(), Payload::text("tool-a"));
        let state = RunState::new(Payload::text("hello"), specs);
        assert_eq!(state.input(), Payload::text("hello"));
        assert!(state.output().is_none());
    }

    #[test]
    fn commit_output_sets_both_reserved_keys() {
        let state = RunState::new(Payload::Null, FxHashMap::default());
        state.commit_output(&"terminal".to_string(), Payload::Number(42.0));
        assert_eq!(state.output(), Some(Payload::Number(42.0)));
        assert_eq!(state.output_by_node_id(), Some("terminal".to_string()));
    }

    #[test]
    fn freeform_keys_round_trip() {
        let state = RunState::new(Payload::Null, FxHashMap::default());
        state.set("scratch", Payload::Bool(true));
        assert_eq!(state.get("scratch"), Some(Payload::Bool(true)));
    }
}
