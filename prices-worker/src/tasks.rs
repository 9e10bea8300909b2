//! The `compute_daily_average` worker task
//!
//! Takes two ISO date strings, turns them into the half-open UTC window
//! `[start, end + 1 day)`, runs the aggregation and hands back
//! [`DailyAverageRecord`]s as JSON.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use prices_common::types::DateParseError;
use prices_common::{
    parse_iso_date, DailyAverageRecord, ErrorCode, TaskFailure, TaskOutcome,
    COMPUTE_DAILY_AVERAGE,
};

use crate::registry::{TaskExecutor, TaskRegistry};
use crate::storage::{DailyAverageSource, RepositoryError};

/// Task-level errors
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TaskError {
    #[error("Invalid argument: {0}")]
    InvalidDate(#[from] DateParseError),

    #[error("Expected {expected} arguments, got {actual}")]
    ArgumentCount { expected: usize, actual: usize },

    #[error("Date {0} has no following day")]
    DateOverflow(NaiveDate),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TaskError {
    /// Store failures are reported as upstream errors, everything else as a
    /// failed task.
    pub fn code(&self) -> ErrorCode {
        match self {
            TaskError::Repository(_) => ErrorCode::UpstreamError,
            _ => ErrorCode::TaskFailed,
        }
    }

    pub fn to_failure(&self) -> TaskFailure {
        TaskFailure::new(self.code(), self.to_string())
    }
}

/// `[start 00:00 UTC, (end + 1 day) 00:00 UTC)`
pub fn half_open_window(
    start: NaiveDate,
    end: NaiveDate,
) -> Result<(DateTime<Utc>, DateTime<Utc>), TaskError> {
    let end_exclusive = end.succ_opt().ok_or(TaskError::DateOverflow(end))?;
    Ok((
        start.and_time(NaiveTime::MIN).and_utc(),
        end_exclusive.and_time(NaiveTime::MIN).and_utc(),
    ))
}

/// Compute per-day averages for the inclusive date range given as ISO strings.
///
/// Read-only; running it twice over unchanged data yields the same records.
pub async fn compute_daily_average<S>(
    store: &S,
    start_date: &str,
    end_date: &str,
) -> Result<Vec<DailyAverageRecord>, TaskError>
where
    S: DailyAverageSource + ?Sized,
{
    let start = parse_iso_date(start_date)?;
    let end = parse_iso_date(end_date)?;
    let (window_start, window_end) = half_open_window(start, end)?;

    let averages = store.daily_averages(window_start, window_end).await?;

    Ok(averages.iter().map(DailyAverageRecord::from).collect())
}

/// Executor registered under [`COMPUTE_DAILY_AVERAGE`]
pub struct DailyAverageTask {
    store: Arc<dyn DailyAverageSource>,
}

impl DailyAverageTask {
    pub fn new(store: Arc<dyn DailyAverageSource>) -> Self {
        Self { store }
    }

    async fn run(&self, args: &[String]) -> Result<serde_json::Value, TaskError> {
        let [start_date, end_date] = args else {
            return Err(TaskError::ArgumentCount {
                expected: 2,
                actual: args.len(),
            });
        };

        let records = compute_daily_average(self.store.as_ref(), start_date, end_date).await?;
        debug!(
            "{} produced {} record(s) for {}..={}",
            COMPUTE_DAILY_AVERAGE,
            records.len(),
            start_date,
            end_date
        );
        Ok(serde_json::to_value(records)?)
    }
}

#[async_trait]
impl TaskExecutor for DailyAverageTask {
    async fn execute(&self, args: &[String]) -> TaskOutcome {
        self.run(args).await.map_err(|e| {
            warn!("{} failed: {}", COMPUTE_DAILY_AVERAGE, e);
            e.to_failure()
        })
    }
}

impl TaskRegistry {
    /// Registry holding every task the price worker knows about
    pub fn with_price_tasks(store: Arc<dyn DailyAverageSource>) -> Self {
        TaskRegistry::new().with(
            COMPUTE_DAILY_AVERAGE,
            Arc::new(DailyAverageTask::new(store)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryPriceStore;

    fn date(s: &str) -> NaiveDate {
        parse_iso_date(s).unwrap()
    }

    #[test]
    fn test_window_covers_whole_end_day() {
        let (start, end) = half_open_window(date("2024-01-05"), date("2024-01-05")).unwrap();
        assert_eq!(start.to_rfc3339(), "2024-01-05T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2024-01-06T00:00:00+00:00");
    }

    #[test]
    fn test_window_overflow_is_an_error() {
        let result = half_open_window(NaiveDate::MIN, NaiveDate::MAX);
        assert!(matches!(result, Err(TaskError::DateOverflow(_))));
    }

    #[test]
    fn test_error_codes() {
        let parse = TaskError::InvalidDate(DateParseError("x".into()));
        assert_eq!(parse.code(), ErrorCode::TaskFailed);

        let store = TaskError::Repository(RepositoryError::Unavailable("down".into()));
        assert_eq!(store.code(), ErrorCode::UpstreamError);
        assert_eq!(store.to_failure().message, "Repository error: Store unavailable: down");
    }

    #[tokio::test]
    async fn test_executor_rejects_wrong_argument_count() {
        let task = DailyAverageTask::new(Arc::new(InMemoryPriceStore::new()));
        let failure = task.execute(&["2024-01-01".to_string()]).await.unwrap_err();

        assert_eq!(failure.code, ErrorCode::TaskFailed);
        assert!(failure.message.contains("Expected 2 arguments, got 1"));
    }

    #[tokio::test]
    async fn test_executor_rejects_malformed_dates() {
        let store = Arc::new(InMemoryPriceStore::new());
        let task = DailyAverageTask::new(store.clone());
        for start in ["2024-13-01", "+2024-1-01", " 2024-1-01"] {
            let failure = task
                .execute(&[start.to_string(), "2024-01-02".to_string()])
                .await
                .unwrap_err();
            assert_eq!(failure.code, ErrorCode::TaskFailed, "{start:?}");
        }

        assert_eq!(store.query_count(), 0, "bad input must not reach the store");
    }

    #[tokio::test]
    async fn test_registry_lists_price_tasks() {
        let registry = TaskRegistry::with_price_tasks(Arc::new(InMemoryPriceStore::new()));
        assert_eq!(registry.names(), vec![COMPUTE_DAILY_AVERAGE]);
        assert!(registry.get(COMPUTE_DAILY_AVERAGE).is_some());
        assert!(registry.get("unknown").is_none());
    }
}
