use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use quant_core::error::{QuantError, Result};
use quant_core::models::BarTable;
use quant_core::traits::BarSource;
use quant_core::types::{Interval, Market};

use crate::storage::BarStore;

/// Per-symbol status of a download run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    Succeeded,
    Empty,
    Failed,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DownloadReport {
    pub tasks: Vec<(String, Option<QueryStatus>)>,
    pub bars_saved: usize,
}

impl DownloadReport {
    pub fn count(&self, status: QueryStatus) -> usize {
        self.tasks.iter().filter(|(_, s)| *s == Some(status)).count()
    }
}

/// Glue between a bar source and the local bar store.
///
/// The source is passed in per call; the handler never owns a session.
pub struct DataHandler {
    market: Market,
    store: BarStore,
}

impl DataHandler {
    pub fn new(market: Market, store: BarStore) -> Self {
        Self { market, store }
    }

    pub fn store(&self) -> &BarStore {
        &self.store
    }

    /// Download daily bars symbol by symbol into the store.
    ///
    /// A failing or empty symbol is recorded and logged; the remaining symbols
    /// are still processed. `pause` is slept between requests.
    pub async fn download_bars_to_store(
        &self,
        source: &dyn BarSource,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
        pause: Duration,
    ) -> DownloadReport {
        let mut report = DownloadReport {
            tasks: symbols.iter().map(|s| (s.clone(), None)).collect(),
            bars_saved: 0,
        };

        for (i, symbol) in symbols.iter().enumerate() {
            let status = match source.fetch_bars(symbol, Interval::Daily, start, end).await {
                Ok(bars) if bars.is_empty() => {
                    info!("No bars for {}", symbol);
                    QueryStatus::Empty
                }
                Ok(bars) => match self.store.save_bars(&bars) {
                    Ok(n) => {
                        report.bars_saved += n;
                        info!("Saved {} new bars for {} ({}/{})", n, symbol, i + 1, symbols.len());
                        QueryStatus::Succeeded
                    }
                    Err(e) => {
                        warn!("Failed to store bars for {}: {}", symbol, e);
                        QueryStatus::Failed
                    }
                },
                Err(e) => {
                    warn!("Query failed for {}: {}", symbol, e);
                    QueryStatus::Failed
                }
            };
            report.tasks[i].1 = Some(status);

            if !pause.is_zero() && i + 1 < symbols.len() {
                tokio::time::sleep(pause).await;
            }
        }

        info!(
            "Download finished: {} succeeded, {} empty, {} failed",
            report.count(QueryStatus::Succeeded),
            report.count(QueryStatus::Empty),
            report.count(QueryStatus::Failed)
        );
        report
    }

    /// Expand `["all"]` into the full symbol list from the source.
    pub async fn resolve_symbols(&self, source: &dyn BarSource, symbols: &[String]) -> Result<Vec<String>> {
        match symbols {
            [only] if only.eq_ignore_ascii_case("all") => source.fetch_symbols().await,
            _ => Ok(symbols.to_vec()),
        }
    }

    /// Read a bar table from the store. An empty result is a source failure.
    pub fn get_bar_table(
        &self,
        symbols: &[String],
        interval: Interval,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BarTable> {
        let symbols = match symbols {
            [only] if only.eq_ignore_ascii_case("all") => self.store.symbols()?,
            _ => symbols.to_vec(),
        };
        let bars = self.store.query_bars(&symbols, interval, start, end)?;
        if bars.is_empty() {
            return Err(QuantError::ExternalSourceFailure(format!(
                "No {} bars stored for {} symbol(s) between {} and {}",
                interval,
                symbols.len(),
                start,
                end
            )));
        }
        let table = BarTable::new(self.market, bars);
        info!("Bar data loaded from store: {}", table.summary());
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quant_core::models::Bar;

    struct FakeSource;

    fn bar(symbol: &str, day: u32) -> Bar {
        Bar {
            symbol: symbol.into(),
            exchange: "sh".into(),
            interval: Interval::Daily,
            datetime: NaiveDate::from_ymd_opt(2024, 1, day)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            open_price: 1.0,
            high_price: 1.0,
            low_price: 1.0,
            close_price: 1.0,
            volume: 1.0,
            turnover: 1.0,
        }
    }

    #[async_trait]
    impl BarSource for FakeSource {
        async fn fetch_bars(
            &self,
            symbol: &str,
            _interval: Interval,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<Bar>> {
            match symbol {
                "600000" => Ok(vec![bar(symbol, 2), bar(symbol, 3)]),
                "600001" => Ok(Vec::new()),
                _ => Err(QuantError::ExternalSourceFailure("boom".into())),
            }
        }

        async fn fetch_symbols(&self) -> Result<Vec<String>> {
            Ok(vec!["600000".into(), "600001".into()])
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[tokio::test]
    async fn test_download_isolates_failures() {
        let handler = DataHandler::new(Market::Ashare, BarStore::in_memory().unwrap());
        let symbols: Vec<String> = vec!["600002".into(), "600000".into(), "600001".into()];
        let report = handler
            .download_bars_to_store(&FakeSource, &symbols, day(1), day(31), Duration::ZERO)
            .await;
        assert_eq!(report.count(QueryStatus::Failed), 1);
        assert_eq!(report.count(QueryStatus::Succeeded), 1);
        assert_eq!(report.count(QueryStatus::Empty), 1);
        assert_eq!(report.bars_saved, 2);
    }

    #[tokio::test]
    async fn test_resolve_all_symbols() {
        let handler = DataHandler::new(Market::Ashare, BarStore::in_memory().unwrap());
        let all = handler.resolve_symbols(&FakeSource, &["all".into()]).await.unwrap();
        assert_eq!(all.len(), 2);
        let some = handler.resolve_symbols(&FakeSource, &["600519".into()]).await.unwrap();
        assert_eq!(some, vec!["600519"]);
    }

    #[test]
    fn test_get_bar_table_empty_is_error() {
        let handler = DataHandler::new(Market::Ashare, BarStore::in_memory().unwrap());
        let err = handler
            .get_bar_table(&["600000".into()], Interval::Daily, day(1), day(31))
            .unwrap_err();
        assert!(matches!(err, QuantError::ExternalSourceFailure(_)));

        handler.store().save_bars(&[bar("600000", 2)]).unwrap();
        let table = handler
            .get_bar_table(&["all".into()], Interval::Daily, day(1), day(31))
            .unwrap();
        assert_eq!(table.len(), 1);
    }
}
