//! Task dispatcher: one queued task per request, awaited with a deadline
//!
//! The request future is suspended (not a blocked thread) until the worker
//! answers or the deadline passes. On timeout the task is left to finish on
//! its own and its result is dropped; nothing here cancels or retries it.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use prices_common::{
    AwaitError, DailyAverage, DailyAverageRecord, DateRange, QueueError, TaskFailure, TaskPayload,
    TaskQueue, TaskRequest, COMPUTE_DAILY_AVERAGE,
};

/// Default wait before a request gives up on its task
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Dispatch errors
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DispatchError {
    #[error("no result within {0:?}")]
    Timeout(Duration),

    #[error("task failed: {0}")]
    TaskFailed(TaskFailure),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("task result unavailable: {0}")]
    ResultLost(String),

    #[error("invalid task payload: {0}")]
    InvalidPayload(String),
}

impl From<AwaitError> for DispatchError {
    fn from(err: AwaitError) -> Self {
        match err {
            AwaitError::Timeout(waited) => DispatchError::Timeout(waited),
            AwaitError::Failed(failure) => DispatchError::TaskFailed(failure),
            other => DispatchError::ResultLost(other.to_string()),
        }
    }
}

pub struct AverageDispatcher {
    queue: Arc<dyn TaskQueue>,
    wait_timeout: Duration,
}

impl AverageDispatcher {
    pub fn new(queue: Arc<dyn TaskQueue>) -> Self {
        Self {
            queue,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }

    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }

    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }

    /// Run `compute_daily_average` for `range` and wait for its rows.
    pub async fn dispatch(&self, range: &DateRange) -> Result<Vec<DailyAverage>, DispatchError> {
        let request = TaskRequest::new(COMPUTE_DAILY_AVERAGE, range.to_task_args());
        let handle = self.queue.submit(request).await?;
        debug!("Dispatched {} for {} as {}", COMPUTE_DAILY_AVERAGE, range, handle);

        let payload = self.queue.await_result(handle, self.wait_timeout).await?;
        decode_payload(payload)
    }
}

/// Decode the worker's records, checking dates and ascending order.
fn decode_payload(payload: TaskPayload) -> Result<Vec<DailyAverage>, DispatchError> {
    let records: Vec<DailyAverageRecord> = serde_json::from_value(payload)
        .map_err(|e| DispatchError::InvalidPayload(e.to_string()))?;

    let averages = records
        .into_iter()
        .map(DailyAverage::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| DispatchError::InvalidPayload(e.to_string()))?;

    if averages.windows(2).any(|pair| pair[0].date >= pair[1].date) {
        return Err(DispatchError::InvalidPayload(
            "days are not strictly ascending".to_string(),
        ));
    }

    Ok(averages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_valid_payload() {
        let averages = decode_payload(json!([
            { "date": "2024-01-03", "average_price": 7.5 },
            { "date": "2024-01-05", "average_price": 15.0 }
        ]))
        .unwrap();

        assert_eq!(averages.len(), 2);
        assert_eq!(averages[1].average_price, 15.0);
    }

    #[test]
    fn test_decode_rejects_untyped_shapes() {
        for payload in [
            json!({ "date": "2024-01-03" }),
            json!([{ "day": "2024-01-03", "avg": 1.0 }]),
            json!([{ "date": "03/01/2024", "average_price": 1.0 }]),
        ] {
            assert!(matches!(
                decode_payload(payload),
                Err(DispatchError::InvalidPayload(_))
            ));
        }
    }

    #[test]
    fn test_decode_rejects_unordered_days() {
        let result = decode_payload(json!([
            { "date": "2024-01-05", "average_price": 1.0 },
            { "date": "2024-01-03", "average_price": 2.0 }
        ]));
        assert!(matches!(result, Err(DispatchError::InvalidPayload(_))));
    }

    #[test]
    fn test_await_errors_map_to_dispatch_errors() {
        let timeout = DispatchError::from(AwaitError::Timeout(Duration::from_secs(10)));
        assert!(matches!(timeout, DispatchError::Timeout(d) if d == Duration::from_secs(10)));

        let failed = DispatchError::from(AwaitError::Failed(TaskFailure::task_failed("x")));
        assert!(matches!(failed, DispatchError::TaskFailed(_)));

        let lost = DispatchError::from(AwaitError::Lost(prices_common::TaskHandle::new()));
        assert!(matches!(lost, DispatchError::ResultLost(_)));
    }
}
