use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::models::Bar;
use crate::types::Interval;

/// Remote or local provider of bar data.
///
/// Implementations must return at most one bar per (symbol, datetime, interval).
/// Any session or credential the provider needs is owned by the implementation.
#[async_trait]
pub trait BarSource: Send + Sync {
    async fn fetch_bars(
        &self,
        symbol: &str,
        interval: Interval,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>>;

    async fn fetch_symbols(&self) -> Result<Vec<String>>;
}
