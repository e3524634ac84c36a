//! # weavedag: concurrent DAG workflow execution
//!
//! weavedag runs a graph of async nodes to completion: each node declares its
//! predecessors (plain or conditional), the scheduler tracks indegree and dispatches
//! ready nodes through a pluggable selector/processor pair, and a predicate algebra
//! decides which conditional edges fire based on what a producer actually emitted.
//!
//! ## Core Concepts
//!
//! - **Payload**: a closed value type (`Null | Bool | Number | Text | Sequence |
//!   Mapping | Opaque`) carried as prompts, node outputs, and run-state entries.
//! - **Predicate**: the conditional-edge algebra — `Subset`, `Superset`, `Emptyset`,
//!   `NonEmptyset`, `PretransformSet`/`NotPretransformSet`, `Literal`.
//! - **NodeDef / Transform**: a registered vertex and the async unit of work it runs.
//! - **Graph / GraphBuilder**: the compiled, immutable topology and its authoring
//!   surface.
//! - **Executor**: evaluates each node's gate, invokes its transform, and tracks the
//!   per-node `RunRecord` for a run.
//! - **Selector / Processor**: choose which ready nodes to dispatch next, and whether
//!   to run a dispatched batch sequentially or concurrently.
//! - **Handle**: the embedder-facing authoring/run surface built on top of all of the
//!   above.
//!
//! ## Quick Start
//!
//! ```
//! use weavedag::handle::Handle;
//! use weavedag::node::{FnTransform, NodeDef, Transform};
//! use weavedag::payload::Payload;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! fn adder(amount: f64) -> Arc<dyn Transform> {
//!     Arc::new(FnTransform(move |_prompt: &Payload, upstream: &_, _state: &_| {
//!         let total: f64 = upstream
//!             .values()
//!             .map(|v| if let Payload::Number(n) = v { *n } else { 0.0 })
//!             .sum();
//!         async move { Ok(Payload::Number(total + amount)) }
//!     }))
//! }
//!
//! let mut handle = Handle::open_run(Payload::Null);
//! handle
//!     .add_node(NodeDef::new("a", adder(1.0)))
//!     .add_node(NodeDef::new("b", adder(10.0)))
//!     .connect("a", "b");
//!
//! let report = handle.run(None).await?;
//! assert_eq!(report.output, Some(Payload::Number(11.0)));
//! # Ok(())
//! # }
//! ```
//!
//! ### Conditional edges
//!
//! ```
//! use weavedag::handle::Handle;
//! use weavedag::node::{FnTransform, NodeDef, Transform};
//! use weavedag::payload::Payload;
//! use weavedag::predicate::Predicate;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! fn constant(value: Payload) -> Arc<dyn Transform> {
//!     Arc::new(FnTransform(move |_p: &Payload, _u: &_, _s: &_| {
//!         let value = value.clone();
//!         async move { Ok(value) }
//!     }))
//! }
//!
//! let mut handle = Handle::open_run(Payload::Null);
//! handle
//!     .add_node(NodeDef::new("dispatch", constant(Payload::sequence(Vec::new()))))
//!     .add_node(NodeDef::new("empty_branch", constant(Payload::text("handled empty"))))
//!     .connect_if("dispatch", Predicate::Emptyset, "empty_branch");
//!
//! let report = handle.run(None).await?;
//! assert_eq!(report.output, Some(Payload::text("handled empty")));
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Guide
//!
//! - [`payload`] - the value type carried through the graph
//! - [`predicate`] - the conditional-edge predicate algebra
//! - [`node`] - node identity, `Transform`, and the execution gate
//! - [`graph`] - graph storage and the `GraphBuilder` authoring surface
//! - [`state`] - shared per-run state
//! - [`selector`] / [`processor`] - dispatch policies
//! - [`executor`] - drives one node through gate evaluation and its transform
//! - [`scheduler`] - the driver loop that runs a graph to completion
//! - [`handle`] - the embedder-facing authoring/run surface
//! - [`inspect`] - a human-readable run tree for debugging
//! - [`event_bus`] - pluggable sinks for node lifecycle and diagnostic events
//! - [`telemetry`] - plain-text rendering of events and error chains
//! - [`errors`] - the error taxonomy for construction, predicates, and runs

pub mod errors;
pub mod event_bus;
pub mod executor;
pub mod graph;
pub mod handle;
pub mod inspect;
pub mod node;
pub mod payload;
pub mod predicate;
pub mod processor;
pub mod scheduler;
pub mod selector;
pub mod state;
pub mod telemetry;
