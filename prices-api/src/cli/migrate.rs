//! Migrate command - create the price schema

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use prices_worker::storage::run_migrations;

use crate::config::Settings;

/// Arguments for the migrate command
#[derive(Args)]
pub struct MigrateArgs {
    /// Database URL (overrides configuration)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,
}

pub async fn execute(args: MigrateArgs) -> Result<()> {
    let mut settings = Settings::load()?;
    if let Some(url) = args.database_url {
        settings.database.url = url;
    }

    let store = super::connect_store(&settings).await?;
    run_migrations(store.pool())
        .await
        .context("migration failed")?;
    store.close().await;

    info!("Migrations complete");
    Ok(())
}
