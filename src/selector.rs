//! Policies for choosing which idle nodes the scheduler dispatches next.

use crate::errors::NodeId;

/// Picks a (possibly empty) ordered subset of the currently idle, ready nodes.
pub trait Selector: Send + Sync {
    fn select(&self, running: &[NodeId], idle: &[NodeId]) -> Vec<NodeId>;
}

/// Dispatches every idle node at once, sorted by id for determinism.
#[derive(Debug, Default, Clone, Copy)]
pub struct FullSelector;

impl Selector for FullSelector {
    fn select(&self, _running: &[NodeId], idle: &[NodeId]) -> Vec<NodeId> {
        let mut batch = idle.to_vec();
        batch.sort();
        batch
    }
}

/// Caps the number of concurrently running nodes at `max_concurrent` (clamped to ≥1).
#[derive(Debug, Clone, Copy)]
pub struct MaxSelector {
    max_concurrent: usize,
}

impl MaxSelector {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
        }
    }
}

impl Selector for MaxSelector {
    fn select(&self, running: &[NodeId], idle: &[NodeId]) -> Vec<NodeId> {
        let mut batch = idle.to_vec();
        batch.sort();
        let capacity = self.max_concurrent.saturating_sub(running.len());
        batch.truncate(capacity);
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_selector_sorts_by_id() {
        let idle = vec!["b".to_string(), "a".to_string()];
        let selected = FullSelector.select(&[], &idle);
        assert_eq!(selected, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn max_selector_respects_running_count() {
        let selector = MaxSelector::new(3);
        let running = vec!["x".to_string()];
        let idle = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let selected = selector.select(&running, &idle);
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn max_selector_clamps_to_at_least_one() {
        let selector = MaxSelector::new(0);
        assert_eq!(selector.max_concurrent, 1);
    }

    #[test]
    fn max_selector_never_goes_negative_when_oversubscribed() {
        let selector = MaxSelector::new(2);
        let running = vec!["x".to_string(), "y".to_string(), "z".to_string()];
        let idle = vec!["a".to_string()];
        assert!(selector.select(&running, &idle).is_empty());
    }
}
