//! Producer/consumer contract for background tasks.
//!
//! The HTTP side submits a [`TaskRequest`] and waits on the returned
//! [`TaskHandle`]; the worker side executes the named task and stores either
//! a JSON payload or a [`TaskFailure`]. Broker mechanics stay behind the
//! [`TaskQueue`] trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::error::ErrorCode;

/// Task computing per-day average prices. Args: `[start_date, end_date]`.
pub const COMPUTE_DAILY_AVERAGE: &str = "compute_daily_average";

/// Identifier correlating a submitted task with its eventual result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskHandle(Uuid);

impl TaskHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unit of work: task name plus positional string arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub name: String,
    pub args: Vec<String>,
}

impl TaskRequest {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Successful task result, already in transport form
pub type TaskPayload = serde_json::Value;

/// Failure recorded by a worker in place of a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub code: ErrorCode,
    pub message: String,
}

impl TaskFailure {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn task_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TaskFailed, message)
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

pub type TaskOutcome = Result<TaskPayload, TaskFailure>;

/// Errors raised while submitting work.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QueueError {
    #[error("task queue is closed")]
    Closed,

    #[error("task queue full (capacity: {capacity})")]
    Full { capacity: usize },
}

/// Errors raised while waiting on a submitted task.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AwaitError {
    /// The deadline elapsed. The task itself may still run to completion.
    #[error("no result after {0:?}")]
    Timeout(Duration),

    #[error("task failed: {0}")]
    Failed(TaskFailure),

    /// The worker went away without recording a result
    #[error("result for task {0} was lost")]
    Lost(TaskHandle),

    /// Never submitted, already awaited, or expired from the result store
    #[error("no pending result for task {0}")]
    UnknownHandle(TaskHandle),
}

/// Queue with a result store.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Enqueue a task and return its handle without waiting for execution.
    async fn submit(&self, request: TaskRequest) -> Result<TaskHandle, QueueError>;

    /// Wait up to `timeout` for the task's result. Consumes the stored result.
    async fn await_result(
        &self,
        handle: TaskHandle,
        timeout: Duration,
    ) -> Result<TaskPayload, AwaitError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_unique() {
        assert_ne!(TaskHandle::new(), TaskHandle::new());
    }

    #[test]
    fn test_failure_display_includes_code() {
        let failure = TaskFailure::task_failed("bad date");
        assert_eq!(failure.to_string(), "TASK_FAILED: bad date");
    }

    #[test]
    fn test_failure_round_trips_through_json() {
        let failure = TaskFailure::new(ErrorCode::UpstreamError, "store down");
        let json = serde_json::to_string(&failure).unwrap();
        assert!(json.contains("\"UPSTREAM_ERROR\""));
        assert_eq!(serde_json::from_str::<TaskFailure>(&json).unwrap(), failure);
    }
}
