//! Price storage and the daily aggregation query
//!
//! The aggregation itself is a trait seam: [`PgPriceStore`] pushes it down to
//! PostgreSQL, [`InMemoryPriceStore`] mirrors the same semantics for tests
//! and local runs.

pub mod memory;
pub mod migrations;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

use prices_common::DailyAverage;

pub use memory::InMemoryPriceStore;
pub use migrations::{run_migrations, MIGRATION_SQL};
pub use postgres::{DatabaseSettings, PgPriceStore, DAILY_AVERAGE_SQL};

/// Repository errors
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Connection acquire timed out after {0:?}")]
    AcquireTimeout(Duration),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Source of per-day average prices.
#[async_trait]
pub trait DailyAverageSource: Send + Sync {
    /// One [`DailyAverage`] per UTC calendar day with at least one record in
    /// `[start, end_exclusive)`, ascending by day. Days without records are
    /// omitted.
    async fn daily_averages(
        &self,
        start: DateTime<Utc>,
        end_exclusive: DateTime<Utc>,
    ) -> RepositoryResult<Vec<DailyAverage>>;
}
