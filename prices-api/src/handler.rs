//! Daily average request handling
//!
//! `POST /average-prices` takes a JSON body; the public `GET /prices/average`
//! takes the same fields as a query string. Both are validated before
//! anything is dispatched, and every failure leaves this module as an
//! [`ApiError`] whose envelope carries a generic message.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};
use utoipa::{IntoParams, ToSchema};

use prices_common::{parse_iso_date, DailyAverage, DateRange, ErrorCode, ErrorEnvelope};

use crate::dispatcher::{AverageDispatcher, DispatchError};

const MALFORMED_BODY: &str =
    "request body must be JSON with start_date and end_date formatted as YYYY-MM-DD";
const MALFORMED_QUERY: &str =
    "query must carry start_date and end_date formatted as YYYY-MM-DD";

/// Requested date range. Dates stay strings until validated.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AverageRequest {
    /// First day, YYYY-MM-DD
    #[schema(example = "2024-01-01")]
    pub start_date: String,
    /// Last day (inclusive), YYYY-MM-DD
    #[schema(example = "2024-01-31")]
    pub end_date: String,
}

impl AverageRequest {
    /// Strict date parsing, then the `start_date <= end_date` check
    pub fn validate(&self) -> Result<DateRange, ApiError> {
        let start = parse_iso_date(&self.start_date).map_err(|_| {
            ApiError::InvalidDateRange("start_date must be formatted as YYYY-MM-DD")
        })?;
        let end = parse_iso_date(&self.end_date)
            .map_err(|_| ApiError::InvalidDateRange("end_date must be formatted as YYYY-MM-DD"))?;

        DateRange::new(start, end).map_err(|_| {
            ApiError::InvalidDateRange(ErrorCode::InvalidDateRange.default_message())
        })
    }
}

/// Success body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AverageResponse {
    /// One entry per day with data, ascending by date
    pub data: Vec<DailyAverage>,
}

/// Handler errors. Causes are kept for logging only.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ApiError {
    #[error("invalid date range: {0}")]
    InvalidDateRange(&'static str),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ApiError::InvalidDateRange(_) => ErrorCode::InvalidDateRange,
            ApiError::Timeout(_) => ErrorCode::Timeout,
            ApiError::Upstream(_) => ErrorCode::UpstreamError,
            ApiError::Internal(_) => ErrorCode::InternalError,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.code().status_code()
    }

    /// Client-facing envelope
    pub fn envelope(&self) -> ErrorEnvelope {
        match self {
            ApiError::InvalidDateRange(message) => {
                ErrorEnvelope::new(ErrorCode::InvalidDateRange, *message)
            }
            other => ErrorEnvelope::from_code(other.code()),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Timeout(waited) => ApiError::Timeout(waited),
            DispatchError::TaskFailed(_)
            | DispatchError::Queue(_)
            | DispatchError::ResultLost(_)
            | DispatchError::InvalidPayload(_) => ApiError::Upstream(err.to_string()),
        }
    }
}

/// Parse and validate a JSON body into a [`DateRange`].
pub fn parse_request(body: &[u8]) -> Result<DateRange, ApiError> {
    let request: AverageRequest =
        serde_json::from_slice(body).map_err(|_| ApiError::InvalidDateRange(MALFORMED_BODY))?;
    request.validate()
}

/// Parse and validate a `start_date=..&end_date=..` query string.
pub fn parse_query(query: &str) -> Result<DateRange, ApiError> {
    let request: AverageRequest = serde_urlencoded::from_str(query)
        .map_err(|_| ApiError::InvalidDateRange(MALFORMED_QUERY))?;
    request.validate()
}

/// Compute one average price per day between start_date and end_date
/// (inclusive).
#[utoipa::path(
    post,
    path = "/average-prices",
    request_body = AverageRequest,
    responses(
        (status = 200, description = "Daily averages", body = AverageResponse),
        (status = 400, description = "Invalid date range", body = ErrorEnvelope),
        (status = 500, description = "Internal server error", body = ErrorEnvelope),
        (status = 502, description = "Upstream service failure", body = ErrorEnvelope),
        (status = 504, description = "Background computation timed out", body = ErrorEnvelope)
    ),
    tag = "prices"
)]
pub async fn average_prices(
    dispatcher: &AverageDispatcher,
    body: &[u8],
) -> Result<AverageResponse, ApiError> {
    let range = parse_request(body)?;
    average_for_range(dispatcher, range).await
}

/// Public variant of [`average_prices`] taking the dates as query parameters.
#[utoipa::path(
    get,
    path = "/prices/average",
    params(AverageRequest),
    responses(
        (status = 200, description = "Daily averages", body = AverageResponse),
        (status = 400, description = "Invalid date range", body = ErrorEnvelope),
        (status = 500, description = "Internal server error", body = ErrorEnvelope),
        (status = 502, description = "Upstream service failure", body = ErrorEnvelope),
        (status = 504, description = "Background computation timed out", body = ErrorEnvelope)
    ),
    tag = "prices"
)]
pub async fn average_prices_query(
    dispatcher: &AverageDispatcher,
    query: &str,
) -> Result<AverageResponse, ApiError> {
    let range = parse_query(query)?;
    average_for_range(dispatcher, range).await
}

async fn average_for_range(
    dispatcher: &AverageDispatcher,
    range: DateRange,
) -> Result<AverageResponse, ApiError> {
    match dispatcher.dispatch(&range).await {
        Ok(data) => Ok(AverageResponse { data }),
        Err(err) => {
            let api_err = ApiError::from(err);
            match &api_err {
                ApiError::Timeout(waited) => {
                    warn!("Daily averages for {} timed out after {:?}", range, waited)
                }
                ApiError::Upstream(cause) => {
                    error!("Daily averages for {} failed: {}", range, cause)
                }
                _ => {}
            }
            Err(api_err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prices_common::{TaskFailure, TaskHandle};

    #[test]
    fn test_parse_valid_request() {
        let range =
            parse_request(br#"{"start_date":"2024-01-01","end_date":"2024-01-31"}"#).unwrap();
        assert_eq!(range.to_task_args(), vec!["2024-01-01", "2024-01-31"]);
    }

    #[test]
    fn test_parse_rejects_inverted_range() {
        let err = parse_request(br#"{"start_date":"2024-02-01","end_date":"2024-01-31"}"#)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidDateRange);
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.envelope().message, "start_date must be <= end_date");
    }

    #[test]
    fn test_parse_rejects_missing_and_malformed_fields() {
        let bodies: [&[u8]; 5] = [
            b"",
            b"not json",
            br#"{"start_date":"2024-01-01"}"#,
            br#"{"start_date":"2024-01-01","end_date":"31/01/2024"}"#,
            br#"{"start_date":20240101,"end_date":"2024-01-31"}"#,
        ];
        for body in bodies {
            let err = parse_request(body).unwrap_err();
            assert_eq!(err.status_code(), 400, "{:?}", String::from_utf8_lossy(body));
        }
    }

    #[test]
    fn test_parse_query() {
        let range = parse_query("start_date=2024-01-01&end_date=2024-01-31").unwrap();
        assert_eq!(range.to_task_args(), vec!["2024-01-01", "2024-01-31"]);

        for query in [
            "",
            "start_date=2024-01-01",
            "start_date=2024-01-31&end_date=2024-01-01",
            "start_date=%202024-1-01&end_date=2024-01-31",
        ] {
            let err = parse_query(query).unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidDateRange, "{query:?}");
        }
    }

    #[test]
    fn test_dispatch_errors_map_to_codes() {
        let timeout = ApiError::from(DispatchError::Timeout(std::time::Duration::from_secs(10)));
        assert_eq!(timeout.status_code(), 504);
        assert_eq!(timeout.code(), ErrorCode::Timeout);

        let failed = ApiError::from(DispatchError::TaskFailed(TaskFailure::task_failed(
            "password authentication failed for user \"prices\"",
        )));
        assert_eq!(failed.status_code(), 502);
        let envelope = failed.envelope();
        assert_eq!(envelope.code, ErrorCode::UpstreamError);
        assert!(!envelope.message.contains("password"));

        let lost = ApiError::from(DispatchError::ResultLost(TaskHandle::new().to_string()));
        assert_eq!(lost.code(), ErrorCode::UpstreamError);
    }
}
