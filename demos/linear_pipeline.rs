//! A three-node linear pipeline: each node adds its own contribution to a running
//! total, and the terminal node's output becomes the run's committed output.
//!
//! Run with: `cargo run --example linear_pipeline`

use miette::Result;
use std::sync::Arc;
use tracing_error::ErrorLayer;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use weavedag::handle::Handle;
use weavedag::node::{FnTransform, NodeDef, Transform, Upstream};
use weavedag::payload::Payload;
use weavedag::state::RunState;

fn adder(amount: f64) -> Arc<dyn Transform> {
    Arc::new(FnTransform(
        move |_prompt: &Payload, upstream: &Upstream, _state: &RunState| {
            let running: f64 = upstream
                .values()
                .map(|v| if let Payload::Number(n) = v { *n } else { 0.0 })
                .sum();
            async move { Ok(Payload::Number(running + amount)) }
        },
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .with(ErrorLayer::default())
        .init();

    let mut handle = Handle::open_run(Payload::Number(0.0));
    handle
        .add_node(NodeDef::new("double", adder(2.0)).with_desc("adds 2"))
        .add_node(NodeDef::new("triple", adder(3.0)).with_desc("adds 3"))
        .add_node(NodeDef::new("finish", adder(10.0)).with_desc("adds 10, commits output"))
        .connect("double", "triple")
        .connect("triple", "finish");

    let report = handle.run(None).await.map_err(|e| miette::miette!("{e}"))?;
    println!("finish order: {:?}", report.finish_order);
    println!("output: {:?}", report.output);

    Ok(())
}
