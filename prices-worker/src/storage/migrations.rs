//! Schema for the `prices` table

use sqlx::{Executor, PgPool};
use tracing::info;

use super::RepositoryResult;

/// Idempotent schema definition
pub const MIGRATION_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS prices (
    id BIGSERIAL PRIMARY KEY,
    recorded_at TIMESTAMPTZ NOT NULL,
    price NUMERIC(12, 4) NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_prices_recorded_at ON prices (recorded_at);
"#;

/// Create the `prices` table and its index if missing.
pub async fn run_migrations(pool: &PgPool) -> RepositoryResult<()> {
    info!("Running price schema migrations...");

    // Multiple statements: sent through the simple query protocol
    pool.execute(MIGRATION_SQL).await?;

    info!("Price schema ready");
    Ok(())
}
