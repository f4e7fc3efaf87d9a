//! edgepin server entry point.
//!
//! Boots the pin cache against a Kubo node and serves the MCP tools on stdio.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use edgepin_client::{KuboClient, KuboConfig};
use edgepin_core::{AppConfig, PinCache};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
#[cfg(test)]
mod testing;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let client = KuboClient::new(KuboConfig::from(&config))?;
    tracing::info!(api_base = client.api_base(), index = %config.index_path.display(), "starting edgepin on stdio transport");

    let cache = Arc::new(PinCache::start(config.cache_settings(), config.index_path.clone(), Arc::new(client)).await);

    let handler = handler::EdgePinServer::new(Arc::clone(&cache));
    let server = serve_server(handler, stdio()).await?;

    let outcome = tokio::select! {
        quit = server.waiting() => quit.map(|_| ()).map_err(anyhow::Error::from),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received; shutting down");
            Ok(())
        }
    };

    cache.stop().await;
    outcome
}
