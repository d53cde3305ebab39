//! Sonarr to Slack relay binary.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sonarr_slack::{server, Config, OutboundDispatcher, Relay};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    let level = if config.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(format!("sonarr_slack={level},tower_http=info")))?,
        )
        .init();

    info!(
        endpoint = %config.endpoint,
        timeout_secs = config.timeout,
        "Starting Sonarr relay"
    );

    let dispatcher = OutboundDispatcher::new(config.webhook.clone(), config.dispatch_timeout())
        .context("Failed to create HTTP client")?;
    info!(host = ?dispatcher.webhook().host_str(), "Forwarding to Slack webhook");

    let relay = Relay::new(Arc::new(dispatcher));

    let listener = server::bind(&config.endpoint)
        .with_context(|| format!("Failed to listen on {}", config.endpoint))?;

    server::run_server(relay, listener)
        .await
        .context("HTTP server failed")?;

    info!("Sonarr relay stopped");
    Ok(())
}
