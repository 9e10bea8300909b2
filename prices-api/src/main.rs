//! Daily Average Price API
//!
//! Provides commands for:
//! - `serve`: Start the HTTP endpoint and the worker pool
//! - `migrate`: Create the price schema
//! - `average`: Compute daily averages once from the command line

use anyhow::Result;
use clap::Parser;

use prices_api::cli::{Cli, Commands};
use prices_common::logging::{init_logging, LogConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    init_logging(LogConfig::from_env())?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => prices_api::cli::serve::execute(args).await?,
        Commands::Migrate(args) => prices_api::cli::migrate::execute(args).await?,
        Commands::Average(args) => prices_api::cli::average::execute(args).await?,
    }

    Ok(())
}
