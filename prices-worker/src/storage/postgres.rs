//! PostgreSQL price store
//!
//! The per-day grouping is computed by the database in one statement; rows
//! are only converted into [`DailyAverage`] on the way out.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::debug;

use prices_common::{DailyAverage, PricePoint};

use super::{DailyAverageSource, RepositoryError, RepositoryResult};

/// Daily mean price over a half-open window. Days are UTC calendar days.
pub const DAILY_AVERAGE_SQL: &str = r#"
    SELECT
        (recorded_at AT TIME ZONE 'UTC')::date AS day,
        AVG(price)::float8 AS avg_price
    FROM prices
    WHERE recorded_at >= $1
      AND recorded_at < $2
    GROUP BY day
    ORDER BY day ASC
"#;

/// Database connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Seconds to wait for a free connection
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    2
}

fn default_acquire_timeout_secs() -> u64 {
    30
}

impl DatabaseSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

/// Price store backed by a PostgreSQL pool.
///
/// The pool is process-wide; each query checks a connection out and returns
/// it when the query finishes, whether it succeeded or not.
#[derive(Clone)]
pub struct PgPriceStore {
    pool: PgPool,
    acquire_timeout: Duration,
}

impl PgPriceStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            acquire_timeout: Duration::from_secs(default_acquire_timeout_secs()),
        }
    }

    /// Build the pool from settings
    pub async fn connect(settings: &DatabaseSettings) -> RepositoryResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(settings.acquire_timeout())
            .idle_timeout(Duration::from_secs(600))
            .connect(&settings.url)
            .await?;

        Ok(Self {
            pool,
            acquire_timeout: settings.acquire_timeout(),
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Round-trip check against the database
    pub async fn ping(&self) -> RepositoryResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Insert a single price observation
    pub async fn insert_price(&self, point: &PricePoint) -> RepositoryResult<()> {
        sqlx::query("INSERT INTO prices (recorded_at, price) VALUES ($1, $2)")
            .bind(point.recorded_at)
            .bind(point.price)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Close the pool, waiting for checked-out connections to return
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl DailyAverageSource for PgPriceStore {
    async fn daily_averages(
        &self,
        start: DateTime<Utc>,
        end_exclusive: DateTime<Utc>,
    ) -> RepositoryResult<Vec<DailyAverage>> {
        let mut conn = self.pool.acquire().await.map_err(|e| match e {
            sqlx::Error::PoolTimedOut => RepositoryError::AcquireTimeout(self.acquire_timeout),
            other => RepositoryError::Database(other),
        })?;

        // `conn` goes back to the pool when it drops, on the error path too
        let rows = sqlx::query(DAILY_AVERAGE_SQL)
            .bind(start)
            .bind(end_exclusive)
            .fetch_all(&mut *conn)
            .await?;

        let averages = rows
            .iter()
            .map(|row| {
                let date: NaiveDate = row.try_get("day")?;
                let average_price: f64 = row.try_get("avg_price")?;
                Ok(DailyAverage {
                    date,
                    average_price,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        debug!(
            "Aggregated {} day(s) in [{}, {})",
            averages.len(),
            start,
            end_exclusive
        );
        Ok(averages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_is_half_open_and_ordered() {
        assert!(DAILY_AVERAGE_SQL.contains("recorded_at >= $1"));
        assert!(DAILY_AVERAGE_SQL.contains("recorded_at < $2"));
        assert!(DAILY_AVERAGE_SQL.contains("GROUP BY day"));
        assert!(DAILY_AVERAGE_SQL.contains("ORDER BY day ASC"));
    }

    #[test]
    fn test_database_settings_defaults() {
        let settings: DatabaseSettings =
            serde_json::from_str(r#"{"url": "postgres://localhost/prices"}"#).unwrap();
        assert_eq!(settings.max_connections, 10);
        assert_eq!(settings.min_connections, 2);
        assert_eq!(settings.acquire_timeout(), Duration::from_secs(30));
    }
}
