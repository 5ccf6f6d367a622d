//! Bar-table loading from CSV files with configurable column headers.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use tracing::info;

use quant_core::error::{QuantError, Result};
use quant_core::models::{Bar, BarTable};
use quant_core::types::{Exchange, Interval, Market};
use quant_core::utils::parse_datetime;

/// Maps source CSV headers onto the canonical bar fields.
///
/// Every field defaults to its canonical name, so a file written with the
/// canonical headers loads with `ColumnMapping::default()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    pub symbol: String,
    pub exchange: String,
    pub interval: String,
    pub datetime: String,
    pub open_price: String,
    pub high_price: String,
    pub low_price: String,
    pub close_price: String,
    pub volume: String,
    pub turnover: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            symbol: "symbol".into(),
            exchange: "exchange".into(),
            interval: "interval".into(),
            datetime: "datetime".into(),
            open_price: "open_price".into(),
            high_price: "high_price".into(),
            low_price: "low_price".into(),
            close_price: "close_price".into(),
            volume: "volume".into(),
            turnover: "turnover".into(),
        }
    }
}

/// Resolved column positions for one CSV header row.
struct ColumnIndex {
    symbol: usize,
    exchange: Option<usize>,
    interval: Option<usize>,
    datetime: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
    turnover: Option<usize>,
}

impl ColumnIndex {
    fn resolve(headers: &StringRecord, mapping: &ColumnMapping) -> Result<Self> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| QuantError::DataError(format!("Missing CSV column '{}'", name)))
        };
        Ok(Self {
            symbol: require(&mapping.symbol)?,
            exchange: find(&mapping.exchange),
            interval: find(&mapping.interval),
            datetime: require(&mapping.datetime)?,
            open: require(&mapping.open_price)?,
            high: require(&mapping.high_price)?,
            low: require(&mapping.low_price)?,
            close: require(&mapping.close_price)?,
            volume: require(&mapping.volume)?,
            turnover: find(&mapping.turnover),
        })
    }
}

/// Empty cells load as missing (`NaN`).
fn parse_f64(record: &StringRecord, idx: usize, line: usize) -> Result<f64> {
    let raw = record.get(idx).unwrap_or("").trim();
    if raw.is_empty() {
        return Ok(f64::NAN);
    }
    raw.parse::<f64>()
        .map_err(|e| QuantError::DataError(format!("Line {}: bad number '{}': {}", line, raw, e)))
}

fn parse_record(record: &StringRecord, cols: &ColumnIndex, line: usize) -> Result<Bar> {
    let symbol = record.get(cols.symbol).unwrap_or("").trim().to_string();
    if symbol.is_empty() {
        return Err(QuantError::DataError(format!("Line {}: empty symbol", line)));
    }
    let raw_dt = record.get(cols.datetime).unwrap_or("");
    let datetime = parse_datetime(raw_dt).ok_or_else(|| {
        QuantError::DataError(format!("Line {}: bad datetime '{}'", line, raw_dt))
    })?;
    let exchange = cols
        .exchange
        .and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Exchange::from_symbol(&symbol).prefix().to_string());
    let interval = match cols.interval.and_then(|i| record.get(i)).map(str::trim) {
        Some(code) if !code.is_empty() => code.parse::<Interval>()?,
        _ => Interval::Daily,
    };
    let turnover = match cols.turnover {
        Some(i) => parse_f64(record, i, line)?,
        None => f64::NAN,
    };

    Ok(Bar {
        symbol,
        exchange,
        interval,
        datetime,
        open_price: parse_f64(record, cols.open, line)?,
        high_price: parse_f64(record, cols.high, line)?,
        low_price: parse_f64(record, cols.low, line)?,
        close_price: parse_f64(record, cols.close, line)?,
        volume: parse_f64(record, cols.volume, line)?,
        turnover,
    })
}

/// Read a bar table from any CSV reader.
pub fn read_bar_table<R: Read>(reader: R, mapping: &ColumnMapping, market: Market) -> Result<BarTable> {
    let mut reader = ReaderBuilder::new().trim(csv::Trim::Headers).from_reader(reader);
    let headers = reader.headers()?.clone();
    let cols = ColumnIndex::resolve(&headers, mapping)?;

    let mut bars = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result?;
        // Header is line 1.
        bars.push(parse_record(&record, &cols, i + 2)?);
    }
    Ok(BarTable::new(market, bars))
}

/// Load a bar table from a CSV file on disk.
pub fn load_bar_table_from_csv(
    path: impl AsRef<Path>,
    mapping: &ColumnMapping,
    market: Market,
) -> Result<BarTable> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| QuantError::IoError(format!("Failed to open {}: {}", path.display(), e)))?;
    let table = read_bar_table(file, mapping, market)?;
    info!("Loaded {} bars from {}", table.len(), path.display());
    Ok(table)
}
