//! SQLite-backed bar store.
//!
//! Bars are keyed by (symbol, interval, datetime). The exchange label is
//! payload, so saving a bar again under a different label replaces the
//! stored row and queries never return duplicate bars.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, params_from_iter, Connection};
use tracing::info;

use quant_core::error::{QuantError, Result};
use quant_core::models::Bar;
use quant_core::types::Interval;

const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Thread-safe SQLite bar store.
pub struct BarStore {
    conn: Mutex<Connection>,
}

impl BarStore {
    /// Open (or create) a bar database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path.as_ref())?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_tables()?;
        info!("BarStore opened at {}", path.as_ref().display());
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_tables()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| QuantError::DatabaseError("bar store lock poisoned".into()))
    }

    fn init_tables(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS bar_data (
                symbol TEXT NOT NULL,
                exchange TEXT NOT NULL,
                interval TEXT NOT NULL,
                datetime TEXT NOT NULL,
                open_price REAL,
                high_price REAL,
                low_price REAL,
                close_price REAL,
                volume REAL,
                turnover REAL,
                PRIMARY KEY (symbol, interval, datetime)
            );
            CREATE INDEX IF NOT EXISTS idx_bar_interval_dt ON bar_data(interval, datetime);",
        )?;
        Ok(())
    }

    /// Upsert bars; a bar whose key is already stored overwrites it.
    /// Returns the number of rows written.
    pub fn save_bars(&self, bars: &[Bar]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO bar_data
                    (symbol, exchange, interval, datetime,
                     open_price, high_price, low_price, close_price, volume, turnover)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT (symbol, interval, datetime) DO UPDATE SET
                     exchange = excluded.exchange,
                     open_price = excluded.open_price,
                     high_price = excluded.high_price,
                     low_price = excluded.low_price,
                     close_price = excluded.close_price,
                     volume = excluded.volume,
                     turnover = excluded.turnover",
            )?;
            for bar in bars {
                written += stmt.execute(params![
                    bar.symbol,
                    bar.exchange,
                    bar.interval.code(),
                    bar.datetime.format(DATETIME_FMT).to_string(),
                    bar.open_price,
                    bar.high_price,
                    bar.low_price,
                    bar.close_price,
                    bar.volume,
                    bar.turnover,
                ])?;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    /// Query bars for the given symbols within `[start, end]` (whole days), ordered by datetime.
    pub fn query_bars(
        &self,
        symbols: &[String],
        interval: Interval,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }
        let start_dt = start.and_hms_opt(0, 0, 0).unwrap_or_default();
        let end_dt = end.and_hms_opt(23, 59, 59).unwrap_or_default();

        let placeholders = (0..symbols.len())
            .map(|i| format!("?{}", i + 4))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT symbol, exchange, interval, datetime,
                    open_price, high_price, low_price, close_price, volume, turnover
             FROM bar_data
             WHERE interval = ?1 AND datetime >= ?2 AND datetime <= ?3
               AND symbol IN ({})
             ORDER BY datetime ASC, symbol ASC",
            placeholders
        );

        let mut values: Vec<String> = vec![
            interval.code().to_string(),
            start_dt.format(DATETIME_FMT).to_string(),
            end_dt.format(DATETIME_FMT).to_string(),
        ];
        values.extend(symbols.iter().cloned());

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                [
                    row.get::<_, Option<f64>>(4)?,
                    row.get::<_, Option<f64>>(5)?,
                    row.get::<_, Option<f64>>(6)?,
                    row.get::<_, Option<f64>>(7)?,
                    row.get::<_, Option<f64>>(8)?,
                    row.get::<_, Option<f64>>(9)?,
                ],
            ))
        })?;

        let mut bars = Vec::new();
        for row in rows {
            let (symbol, exchange, interval_code, dt, prices) = row?;
            let datetime = NaiveDateTime::parse_from_str(&dt, DATETIME_FMT)
                .map_err(|e| QuantError::DatabaseError(format!("bad datetime '{}': {}", dt, e)))?;
            // SQLite stores NaN as NULL.
            let [open, high, low, close, volume, turnover] = prices.map(|v| v.unwrap_or(f64::NAN));
            bars.push(Bar {
                symbol,
                exchange,
                interval: interval_code.parse()?,
                datetime,
                open_price: open,
                high_price: high,
                low_price: low,
                close_price: close,
                volume,
                turnover,
            });
        }
        Ok(bars)
    }

    /// All stored symbols, sorted.
    pub fn symbols(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT DISTINCT symbol FROM bar_data ORDER BY symbol ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row?);
        }
        Ok(symbols)
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM bar_data", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}
