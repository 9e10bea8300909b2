// prices-common: Shared types, error codes and the task protocol
// Used by both prices-worker (task consumer) and prices-api (HTTP producer)

pub mod error;
pub mod logging;
pub mod task;
pub mod types;

pub use error::{ErrorCode, ErrorEnvelope};
pub use task::{
    AwaitError, QueueError, TaskFailure, TaskHandle, TaskOutcome, TaskPayload, TaskQueue,
    TaskRequest, COMPUTE_DAILY_AVERAGE,
};
pub use types::{parse_iso_date, DailyAverage, DailyAverageRecord, DateRange, PricePoint};
