// prices-worker: Background task execution for the daily average price service
//
// Hosts the aggregation query, the `compute_daily_average` task and the
// in-process task queue that runs it.

pub mod queue;
pub mod registry;
pub mod storage;
pub mod tasks;

pub use queue::{LocalTaskQueue, QueueConfig, QueueStats};
pub use registry::{TaskExecutor, TaskRegistry};
pub use storage::{
    DailyAverageSource, DatabaseSettings, InMemoryPriceStore, PgPriceStore, RepositoryError,
    RepositoryResult,
};
pub use tasks::{compute_daily_average, half_open_window, DailyAverageTask, TaskError};
