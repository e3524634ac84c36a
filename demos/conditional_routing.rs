//! A classifier node fans out to two conditional branches; only the branch whose
//! predicate matches the classifier's output runs, the other aborts.
//!
//! Run with: `cargo run --example conditional_routing`

use miette::Result;
use std::sync::Arc;
use tracing_error::ErrorLayer;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use weavedag::handle::Handle;
use weavedag::node::{FnTransform, NodeDef, Transform, Upstream};
use weavedag::payload::Payload;
use weavedag::predicate::Predicate;
use weavedag::state::RunState;

fn classify() -> Arc<dyn Transform> {
    Arc::new(FnTransform(
        |prompt: &Payload, _upstream: &Upstream, _state: &RunState| {
            let prompt = prompt.clone();
            async move { Ok(prompt) }
        },
    ))
}

fn label(text: &str) -> Arc<dyn Transform> {
    let text = text.to_string();
    Arc::new(FnTransform(move |_prompt: &Payload, _upstream: &Upstream, _state: &RunState| {
        let text = text.clone();
        async move { Ok(Payload::text(text)) }
    }))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .with(ErrorLayer::default())
        .init();

    let mut handle = Handle::open_run(Payload::text("urgent"));
    handle
        .add_node(NodeDef::new("classify", classify()))
        .add_node(NodeDef::new("urgent-path", label("paged the on-call")))
        .add_node(NodeDef::new("routine-path", label("filed for later")))
        .connect_if(
            "classify",
            Predicate::Subset(vec![Payload::text("urgent")]),
            "urgent-path",
        )
        .connect_if(
            "classify",
            Predicate::Subset(vec![Payload::text("routine")]),
            "routine-path",
        );

    let report = handle.run(None).await.map_err(|e| miette::miette!("{e}"))?;
    println!("finish order: {:?}", report.finish_order);
    println!("output: {:?}", report.output);

    Ok(())
}
