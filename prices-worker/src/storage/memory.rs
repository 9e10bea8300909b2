//! In-memory price store
//!
//! Applies the same grouping rules as the SQL query (UTC calendar days,
//! half-open window, ascending, sparse). Can be told to fail or to stall so
//! worker failure and timeout paths can be exercised without a database.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use prices_common::{DailyAverage, PricePoint};

use super::{DailyAverageSource, RepositoryError, RepositoryResult};

#[derive(Default)]
pub struct InMemoryPriceStore {
    points: RwLock<Vec<PricePoint>>,
    failure: Option<String>,
    delay: Option<Duration>,
    queries: AtomicU64,
}

impl InMemoryPriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_points(points: Vec<PricePoint>) -> Self {
        Self {
            points: RwLock::new(points),
            ..Self::default()
        }
    }

    /// Every query fails with [`RepositoryError::Unavailable`]
    pub fn with_failure(mut self, reason: impl Into<String>) -> Self {
        self.failure = Some(reason.into());
        self
    }

    /// Every query sleeps before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn insert(&self, point: PricePoint) {
        self.points.write().push(point);
    }

    /// Number of aggregation queries served (including failed ones)
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DailyAverageSource for InMemoryPriceStore {
    async fn daily_averages(
        &self,
        start: DateTime<Utc>,
        end_exclusive: DateTime<Utc>,
    ) -> RepositoryResult<Vec<DailyAverage>> {
        self.queries.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = &self.failure {
            return Err(RepositoryError::Unavailable(reason.clone()));
        }

        let mut days: BTreeMap<NaiveDate, (Decimal, u32)> = BTreeMap::new();
        for point in self.points.read().iter() {
            if point.recorded_at < start || point.recorded_at >= end_exclusive {
                continue;
            }
            let entry = days
                .entry(point.recorded_at.date_naive())
                .or_insert((Decimal::ZERO, 0));
            entry.0 += point.price;
            entry.1 += 1;
        }

        days.into_iter()
            .map(|(date, (sum, count))| -> RepositoryResult<DailyAverage> {
                let average_price = (sum / Decimal::from(count)).to_f64().ok_or_else(|| {
                    RepositoryError::InvalidData(format!("average for {date} is not representable"))
                })?;
                Ok(DailyAverage {
                    date,
                    average_price,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[tokio::test]
    async fn test_groups_by_utc_day_in_order() {
        let store = InMemoryPriceStore::with_points(vec![
            PricePoint::new(at(2024, 1, 6, 9, 0, 0), dec!(30)),
            PricePoint::new(at(2024, 1, 5, 0, 0, 0), dec!(10)),
            PricePoint::new(at(2024, 1, 5, 23, 59, 59), dec!(20)),
        ]);

        let averages = store
            .daily_averages(at(2024, 1, 5, 0, 0, 0), at(2024, 1, 7, 0, 0, 0))
            .await
            .unwrap();

        assert_eq!(averages.len(), 2);
        assert_eq!(averages[0].date, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!(averages[0].average_price, 15.0);
        assert_eq!(averages[1].average_price, 30.0);
    }

    #[tokio::test]
    async fn test_end_bound_is_exclusive() {
        let store = InMemoryPriceStore::with_points(vec![PricePoint::new(
            at(2024, 1, 6, 0, 0, 0),
            dec!(99),
        )]);

        let averages = store
            .daily_averages(at(2024, 1, 5, 0, 0, 0), at(2024, 1, 6, 0, 0, 0))
            .await
            .unwrap();
        assert!(averages.is_empty());
    }

    #[tokio::test]
    async fn test_failure_mode() {
        let store = InMemoryPriceStore::new().with_failure("connection refused");
        let result = store
            .daily_averages(at(2024, 1, 5, 0, 0, 0), at(2024, 1, 6, 0, 0, 0))
            .await;

        assert!(matches!(result, Err(RepositoryError::Unavailable(_))));
        assert_eq!(store.query_count(), 1);
    }
}
