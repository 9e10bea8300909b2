//! Worker task behaviour against the in-memory store

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

use prices_common::{
    AwaitError, DailyAverageRecord, ErrorCode, PricePoint, TaskQueue, TaskRequest,
    COMPUTE_DAILY_AVERAGE,
};
use prices_worker::{
    compute_daily_average, InMemoryPriceStore, LocalTaskQueue, QueueConfig, TaskError,
    TaskRegistry,
};

// ============================================================================
// Helpers
// ============================================================================

fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
}

fn seeded_store() -> InMemoryPriceStore {
    InMemoryPriceStore::with_points(vec![
        PricePoint::new(at(2024, 1, 3, 12, 0, 0), dec!(7.5)),
        PricePoint::new(at(2024, 1, 5, 0, 0, 0), dec!(10)),
        PricePoint::new(at(2024, 1, 5, 23, 59, 59), dec!(20)),
        PricePoint::new(at(2024, 1, 7, 8, 30, 0), dec!(42.1234)),
        PricePoint::new(at(2024, 1, 8, 0, 0, 0), dec!(1000)),
    ])
}

fn record(date: &str, average_price: f64) -> DailyAverageRecord {
    DailyAverageRecord {
        date: date.to_string(),
        average_price,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_single_day_includes_last_second() {
    let store = seeded_store();

    let records = compute_daily_average(&store, "2024-01-05", "2024-01-05")
        .await
        .unwrap();

    assert_eq!(records, vec![record("2024-01-05", 15.0)]);
}

#[tokio::test]
async fn test_range_is_sparse_and_ascending() {
    let store = seeded_store();

    let records = compute_daily_average(&store, "2024-01-01", "2024-01-07")
        .await
        .unwrap();

    let dates: Vec<&str> = records.iter().map(|r| r.date.as_str()).collect();
    assert_eq!(dates, vec!["2024-01-03", "2024-01-05", "2024-01-07"]);
    assert!((records[2].average_price - 42.1234).abs() < 1e-9);
}

#[tokio::test]
async fn test_day_after_end_is_excluded() {
    let store = seeded_store();

    let records = compute_daily_average(&store, "2024-01-07", "2024-01-07")
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].date, "2024-01-07");
}

#[tokio::test]
async fn test_empty_range_returns_no_records() {
    let store = seeded_store();

    let records = compute_daily_average(&store, "2023-06-01", "2023-06-30")
        .await
        .unwrap();

    assert!(records.is_empty());
}

#[tokio::test]
async fn test_repeated_execution_is_identical() {
    let store = seeded_store();

    let first = compute_daily_average(&store, "2024-01-01", "2024-01-31")
        .await
        .unwrap();
    let second = compute_daily_average(&store, "2024-01-01", "2024-01-31")
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(store.query_count(), 2);
}

#[tokio::test]
async fn test_malformed_dates_are_rejected() {
    let store = seeded_store();

    for (start, end) in [("2024-01-32", "2024-02-01"), ("2024-01-01", "yesterday")] {
        let result = compute_daily_average(&store, start, end).await;
        assert!(
            matches!(result, Err(TaskError::InvalidDate(_))),
            "{start}..{end} should fail"
        );
    }
    assert_eq!(store.query_count(), 0);
}

#[tokio::test]
async fn test_store_failure_is_reported() {
    let store = InMemoryPriceStore::new().with_failure("connection refused");

    let err = compute_daily_average(&store, "2024-01-01", "2024-01-02")
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::UpstreamError);
}

#[tokio::test]
async fn test_task_runs_through_local_queue() {
    let store = Arc::new(seeded_store());
    let queue = LocalTaskQueue::start(
        TaskRegistry::with_price_tasks(store.clone()),
        &QueueConfig::default(),
    );

    let handle = queue
        .submit(TaskRequest::new(
            COMPUTE_DAILY_AVERAGE,
            vec!["2024-01-05".into(), "2024-01-05".into()],
        ))
        .await
        .unwrap();
    let payload = queue
        .await_result(handle, Duration::from_secs(5))
        .await
        .unwrap();

    let records: Vec<DailyAverageRecord> = serde_json::from_value(payload).unwrap();
    assert_eq!(records, vec![record("2024-01-05", 15.0)]);

    queue.shutdown().await;
}

#[tokio::test]
async fn test_queue_reports_store_failure_as_upstream() {
    let store = Arc::new(InMemoryPriceStore::new().with_failure("connection refused"));
    let queue = LocalTaskQueue::start(
        TaskRegistry::with_price_tasks(store),
        &QueueConfig::default(),
    );

    let handle = queue
        .submit(TaskRequest::new(
            COMPUTE_DAILY_AVERAGE,
            vec!["2024-01-01".into(), "2024-01-02".into()],
        ))
        .await
        .unwrap();

    match queue.await_result(handle, Duration::from_secs(5)).await {
        Err(AwaitError::Failed(failure)) => assert_eq!(failure.code, ErrorCode::UpstreamError),
        other => panic!("expected failure, got {other:?}"),
    }
}
