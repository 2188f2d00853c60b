//! offline-shell server entry point.
//!
//! Boots the cache lifecycle manager and exposes it as an MCP server on
//! stdio transport. The configured version is registered at startup, the way
//! a page registers its worker on load.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use offline_client::{FetchClient, FetchConfig};
use offline_core::{AppConfig, CacheDb};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod state;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        version = %config.version,
        origin = %config.origin,
        db = %config.db_path.display(),
        "Starting offline-shell server on stdio transport"
    );

    let db = CacheDb::open(&config.db_path).await?;
    let fetcher = Arc::new(FetchClient::new(FetchConfig::from_app_config(&config)?)?);
    let state = Arc::new(state::ShellState::new(config, db, fetcher)?);

    match state.registration().register(state.manager_for(None)?).await {
        Ok(outcome) => tracing::info!(
            cache = %outcome.install.cache_name,
            precached = outcome.install.precached,
            replaced = ?outcome.replaced,
            "registered worker version"
        ),
        Err(e) => tracing::warn!(error = %e, "startup registration failed; requests pass through"),
    }

    let handler = handler::OfflineShellServer::new(state);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
