//! Dispatch policies: run a selected batch of nodes sequentially or concurrently.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinSet;

use crate::errors::{NodeId, RunnerError};
use crate::executor::{Executor, NodeResult};

#[async_trait]
pub trait Processor: Send + Sync {
    async fn run_batch(
        &self,
        executor: Arc<Executor>,
        batch: Vec<NodeId>,
        step: u64,
    ) -> Result<Vec<NodeResult>, RunnerError>;
}

/// Runs each dispatched node one at a time on the caller's task. Pairs naturally with
/// `MaxSelector(1)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sequential;

#[async_trait]
impl Processor for Sequential {
    async fn run_batch(
        &self,
        executor: Arc<Executor>,
        batch: Vec<NodeId>,
        step: u64,
    ) -> Result<Vec<NodeResult>, RunnerError> {
        let mut results = Vec::with_capacity(batch.len());
        for node_id in batch {
            let param = executor.param(&node_id);
            results.push(executor.execute(param, step).await?);
        }
        Ok(results)
    }
}

/// Runs dispatched nodes concurrently as tokio tasks, joined via `JoinSet`. Preserves
/// no ordering among completions.
#[derive(Debug, Default, Clone, Copy)]
pub struct Parallel;

#[async_trait]
impl Processor for Parallel {
    async fn run_batch(
        &self,
        executor: Arc<Executor>,
        batch: Vec<NodeId>,
        step: u64,
    ) -> Result<Vec<NodeResult>, RunnerError> {
        let mut set = JoinSet::new();
        for node_id in batch {
            let executor = executor.clone();
            set.spawn(async move {
                let param = executor.param(&node_id);
                executor.execute(param, step).await
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = set.join_next().await {
            let outcome = joined.map_err(RunnerError::Join)?;
            results.push(outcome?);
        }
        Ok(results)
    }
}
