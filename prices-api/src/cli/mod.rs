//! Command-line interface

pub mod average;
pub mod migrate;
pub mod serve;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;

use prices_worker::{LocalTaskQueue, PgPriceStore, TaskRegistry};

use crate::config::Settings;
use crate::dispatcher::AverageDispatcher;

/// Daily Average Price API
#[derive(Parser)]
#[command(name = "prices-api")]
#[command(about = "Daily average prices computed by a background worker")]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server and the worker pool
    Serve(serve::ServeArgs),
    /// Create the prices table and indexes
    Migrate(migrate::MigrateArgs),
    /// Compute daily averages for a range and print the JSON response
    Average(average::AverageArgs),
}

/// Connect the process-wide database pool
pub(crate) async fn connect_store(settings: &Settings) -> Result<PgPriceStore> {
    info!(
        "Connecting to database ({}-{} connections)...",
        settings.database.min_connections, settings.database.max_connections
    );
    let store = PgPriceStore::connect(&settings.database)
        .await
        .context("failed to connect to database")?;
    store.ping().await.context("database ping failed")?;
    info!("Database connection established");
    Ok(store)
}

/// Start the worker pool and wire a dispatcher to it
pub(crate) fn start_workers(
    store: &PgPriceStore,
    settings: &Settings,
) -> (Arc<LocalTaskQueue>, AverageDispatcher) {
    let registry = TaskRegistry::with_price_tasks(Arc::new(store.clone()));
    let queue = Arc::new(LocalTaskQueue::start(registry, &settings.queue));
    let dispatcher = AverageDispatcher::new(queue.clone())
        .with_wait_timeout(settings.dispatcher.wait_timeout());
    (queue, dispatcher)
}
