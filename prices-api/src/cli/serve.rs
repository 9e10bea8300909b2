//! Serve command - run the HTTP endpoint and the worker pool

use anyhow::{Context, Result};
use clap::Args;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use prices_worker::storage::run_migrations;

use crate::config::Settings;
use crate::server::{self, AppState};

/// Arguments for the serve command
#[derive(Args)]
pub struct ServeArgs {
    /// Bind address (overrides server.bind_address and server.port)
    #[arg(long)]
    pub bind: Option<String>,

    /// Skip schema migrations on startup
    #[arg(long)]
    pub skip_migrations: bool,
}

/// Execute the serve command
pub async fn execute(args: ServeArgs) -> Result<()> {
    let settings = Settings::load()?;

    let addr: SocketAddr = match &args.bind {
        Some(bind) => bind
            .parse()
            .with_context(|| format!("invalid bind address {:?}", bind))?,
        None => settings.server.socket_addr()?,
    };

    info!("Starting daily average price service");
    info!("  Bind address: {}", addr);
    info!("  Route prefix: {:?}", settings.server.route_prefix);
    info!("  Workers: {}", settings.queue.workers);
    info!("  Wait timeout: {:?}", settings.dispatcher.wait_timeout());

    let store = super::connect_store(&settings).await?;
    if args.skip_migrations {
        warn!("Skipping migrations");
    } else {
        run_migrations(store.pool()).await.context("migration failed")?;
    }

    let (queue, dispatcher) = super::start_workers(&store, &settings);
    let state = Arc::new(AppState::new(dispatcher, &settings.server.route_prefix));
    info!("Endpoint: POST {}", state.average_path());

    let result = server::serve(addr, state, shutdown_signal()).await;

    queue.shutdown().await;
    store.close().await;

    result.context("HTTP server error")?;
    info!("Service stopped gracefully");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
    }
}
