//! Average command - one request through the same path as the endpoint

use anyhow::{bail, Result};
use clap::Args;

use crate::config::Settings;
use crate::handler::{self, AverageRequest};

/// Arguments for the average command
#[derive(Args)]
pub struct AverageArgs {
    /// First day (YYYY-MM-DD)
    #[arg(long)]
    pub start: String,

    /// Last day, inclusive (YYYY-MM-DD)
    #[arg(long)]
    pub end: String,
}

pub async fn execute(args: AverageArgs) -> Result<()> {
    let settings = Settings::load()?;
    let store = super::connect_store(&settings).await?;
    let (queue, dispatcher) = super::start_workers(&store, &settings);

    let body = serde_json::to_vec(&AverageRequest {
        start_date: args.start,
        end_date: args.end,
    })?;
    let result = handler::average_prices(&dispatcher, &body).await;

    queue.shutdown().await;
    store.close().await;

    match result {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Err(err) => {
            println!("{}", serde_json::to_string_pretty(&err.envelope())?);
            bail!("request failed with status {}", err.status_code())
        }
    }
}
