//! Core data types shared by the HTTP producer and the task consumer.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use utoipa::ToSchema;

/// Wire format for calendar dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a strict `YYYY-MM-DD` date.
pub fn parse_iso_date(s: &str) -> Result<NaiveDate, DateParseError> {
    let well_formed = s.len() == 10
        && s.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !well_formed {
        return Err(DateParseError(s.to_string()));
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|_| DateParseError(s.to_string()))
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid ISO-8601 date: {0:?}")]
pub struct DateParseError(pub String);

/// Returned by [`DateRange::new`] when `start > end`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("start date {start} is after end date {end}")]
pub struct InvertedRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Inclusive range of calendar dates with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, InvertedRange> {
        if start > end {
            return Err(InvertedRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Task arguments: both bounds as ISO date strings
    pub fn to_task_args(&self) -> Vec<String> {
        vec![
            self.start.format(DATE_FORMAT).to_string(),
            self.end.format(DATE_FORMAT).to_string(),
        ]
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// A single stored price observation. Read-only for this service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub recorded_at: DateTime<Utc>,
    pub price: Decimal,
}

impl PricePoint {
    pub fn new(recorded_at: DateTime<Utc>, price: Decimal) -> Self {
        Self { recorded_at, price }
    }
}

/// Mean price for one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DailyAverage {
    /// UTC calendar day
    #[schema(value_type = String, format = Date, example = "2024-01-05")]
    pub date: NaiveDate,
    #[schema(example = 15.0)]
    pub average_price: f64,
}

/// Transport-safe form of [`DailyAverage`] passed across the task boundary.
///
/// Only strings and floats: nothing store-native leaks out of the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAverageRecord {
    pub date: String,
    pub average_price: f64,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum RecordError {
    #[error(transparent)]
    Date(#[from] DateParseError),

    #[error("average_price for {date} is not finite")]
    NonFinite { date: String },
}

impl From<&DailyAverage> for DailyAverageRecord {
    fn from(avg: &DailyAverage) -> Self {
        Self {
            date: avg.date.format(DATE_FORMAT).to_string(),
            average_price: avg.average_price,
        }
    }
}

impl TryFrom<DailyAverageRecord> for DailyAverage {
    type Error = RecordError;

    fn try_from(record: DailyAverageRecord) -> Result<Self, Self::Error> {
        let date = parse_iso_date(&record.date)?;
        if !record.average_price.is_finite() {
            return Err(RecordError::NonFinite { date: record.date });
        }
        Ok(Self {
            date,
            average_price: record.average_price,
        })
    }
}
