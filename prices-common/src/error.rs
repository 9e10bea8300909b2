//! Canonical error codes and the error envelope returned to HTTP clients.
//!
//! `ErrorCode` is the single source of truth for both the status mapping
//! table and the envelope builder. Worker failure results carry a code from
//! the same enum.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Stable error codes exposed in every error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input dates are missing, malformed, or `start_date > end_date`
    InvalidDateRange,
    /// The background computation did not finish before the wait deadline
    Timeout,
    /// The worker or the store failed while computing the result
    UpstreamError,
    /// Failure recorded by the worker itself on its task result
    TaskFailed,
    /// Anything not otherwise classified
    InternalError,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 5] = [
        ErrorCode::InvalidDateRange,
        ErrorCode::Timeout,
        ErrorCode::UpstreamError,
        ErrorCode::TaskFailed,
        ErrorCode::InternalError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidDateRange => "INVALID_DATE_RANGE",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::UpstreamError => "UPSTREAM_ERROR",
            ErrorCode::TaskFailed => "TASK_FAILED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }

    /// HTTP status code for responses carrying this code.
    ///
    /// Worker-side failures (`UPSTREAM_ERROR`, `TASK_FAILED`) are reported as
    /// 502 so clients can tell them apart from local faults.
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorCode::InvalidDateRange => 400,
            ErrorCode::Timeout => 504,
            ErrorCode::UpstreamError | ErrorCode::TaskFailed => 502,
            ErrorCode::InternalError => 500,
        }
    }

    /// Generic client-facing message. Never includes the underlying cause.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidDateRange => "start_date must be <= end_date",
            ErrorCode::Timeout => "Background computation timed out",
            ErrorCode::UpstreamError => "Failed to compute daily averages",
            ErrorCode::TaskFailed => "Background task failed",
            ErrorCode::InternalError => "Internal server error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniform `{code, message}` body for every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorEnvelope {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorEnvelope {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Envelope with the code's generic message
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_serialize_as_screaming_snake_case() {
        for code in ErrorCode::ALL {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code.as_str()));
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(ErrorCode::InvalidDateRange.status_code(), 400);
        assert_eq!(ErrorCode::Timeout.status_code(), 504);
        assert_eq!(ErrorCode::UpstreamError.status_code(), 502);
        assert_eq!(ErrorCode::TaskFailed.status_code(), 502);
        assert_eq!(ErrorCode::InternalError.status_code(), 500);
    }

    #[test]
    fn test_envelope_shape() {
        let envelope = ErrorEnvelope::from_code(ErrorCode::Timeout);
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["code"], "TIMEOUT");
        assert_eq!(value["message"], "Background computation timed out");
        assert_eq!(value.as_object().unwrap().len(), 2);
    }
}
