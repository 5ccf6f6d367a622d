use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::types::{Interval, Market};

// ── Market Data ──────────────────────────────────────────────

/// One OHLCV observation. `datetime` is timezone-naive on ingest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub exchange: String,
    pub interval: Interval,
    pub datetime: NaiveDateTime,
    pub open_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub close_price: f64,
    pub volume: f64,
    /// Traded value.
    pub turnover: f64,
}

/// Flat table of bars for one market, as produced by a bar source or a file load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarTable {
    pub market: Market,
    pub bars: Vec<Bar>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarTableSummary {
    pub market: Market,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub symbols_num: usize,
    pub rows: usize,
}

impl BarTable {
    pub fn new(market: Market, bars: Vec<Bar>) -> Self {
        Self { market, bars }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Sorted unique symbols.
    pub fn symbols(&self) -> Vec<String> {
        self.bars
            .iter()
            .map(|b| b.symbol.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub fn summary(&self) -> BarTableSummary {
        BarTableSummary {
            market: self.market,
            start: self.bars.iter().map(|b| b.datetime).min(),
            end: self.bars.iter().map(|b| b.datetime).max(),
            symbols_num: self.symbols().len(),
            rows: self.bars.len(),
        }
    }
}

impl std::fmt::Display for BarTableSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fmt_dt = |dt: Option<NaiveDateTime>| {
            dt.map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string())
        };
        write!(
            f,
            "market: {}  start: {}  end: {}  symbols: {}  rows: {}",
            self.market,
            fmt_dt(self.start),
            fmt_dt(self.end),
            self.symbols_num,
            self.rows
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar(symbol: &str, day: u32) -> Bar {
        Bar {
            symbol: symbol.into(),
            exchange: "sh".into(),
            interval: Interval::Daily,
            datetime: NaiveDate::from_ymd_opt(2024, 1, day)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            open_price: 10.0,
            high_price: 10.5,
            low_price: 9.5,
            close_price: 10.2,
            volume: 1000.0,
            turnover: 10_200.0,
        }
    }

    #[test]
    fn test_summary() {
        let table = BarTable::new(
            Market::Ashare,
            vec![bar("600519", 3), bar("600000", 2), bar("600519", 4)],
        );
        let summary = table.summary();
        assert_eq!(summary.symbols_num, 2);
        assert_eq!(summary.rows, 3);
        assert_eq!(summary.start, Some(bar("x", 2).datetime));
        assert_eq!(summary.end, Some(bar("x", 4).datetime));
        assert_eq!(table.symbols(), vec!["600000", "600519"]);
    }

    #[test]
    fn test_empty_summary() {
        let summary = BarTable::new(Market::Ashare, Vec::new()).summary();
        assert_eq!(summary.start, None);
        assert!(summary.to_string().contains("start: -"));
    }
}
