use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use starling::cli;
use starling::node::Node;
use starling::transport::StdioTransport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout is the wire; all diagnostics go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "starling=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Parse args and env vars
    let args = cli::Cli::parse();
    let settings = args.into_settings();

    info!(
        "Starting {} {} (delivery: {}, sync: {})",
        cli::APP_NAME,
        cli::APP_VERSION,
        settings.delivery_mode,
        settings.sync_trigger
    );

    let transport = Arc::new(StdioTransport::new());
    let node = Arc::new(Node::new(settings, transport.clone()));
    let _sync_loop = node.start_background();

    transport.run(node).await?;

    Ok(())
}
