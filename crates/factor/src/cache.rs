//! Pivot a flat bar table into aligned time × symbol matrices, computed lazily
//! and at most once per field.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use ndarray::Array2;
use tracing::{debug, info};

use quant_core::error::{QuantError, Result};
use quant_core::models::{Bar, BarTable};
use quant_core::types::BarField;

use crate::matrix::BarMatrix;

/// Anything that can serve bar matrices to factor formulas.
pub trait MatrixProvider: Send + Sync {
    fn matrix(&self, field: BarField) -> Result<Arc<BarMatrix>>;
}

/// Row/column position of every bar, computed once when the cache is built.
struct PivotLayout {
    index: Arc<[DateTime<Tz>]>,
    columns: Arc<[String]>,
    cells: Vec<(usize, usize)>,
}

impl PivotLayout {
    fn build(bars: &[Bar], tz: Tz) -> Result<Self> {
        let naive: Vec<NaiveDateTime> = bars
            .iter()
            .map(|b| b.datetime)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let columns: Vec<String> = bars
            .iter()
            .map(|b| b.symbol.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();

        let ncols = columns.len();
        let mut seen = vec![false; naive.len() * ncols];
        let mut cells = Vec::with_capacity(bars.len());
        for bar in bars {
            // Both lookups hit: the axes were built from these bars.
            let row = naive.binary_search(&bar.datetime).unwrap_or_default();
            let col = columns
                .binary_search_by(|c| c.as_str().cmp(bar.symbol.as_str()))
                .unwrap_or_default();
            let slot = row * ncols + col;
            if seen[slot] {
                return Err(QuantError::DuplicateBarKey {
                    symbol: bar.symbol.clone(),
                    datetime: bar.datetime,
                });
            }
            seen[slot] = true;
            cells.push((row, col));
        }

        let index = naive
            .iter()
            .map(|dt| localize(dt, tz))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            index: index.into(),
            columns: columns.into(),
            cells,
        })
    }
}

/// Tag a wall-clock time with `tz`. Ambiguous times take the earlier instant.
fn localize(naive: &NaiveDateTime, tz: Tz) -> Result<DateTime<Tz>> {
    tz.from_local_datetime(naive).earliest().ok_or_else(|| {
        QuantError::DataError(format!("{} does not exist in timezone {}", naive, tz.name()))
    })
}

fn raw_value(bar: &Bar, field: BarField) -> f64 {
    match field {
        BarField::Open => bar.open_price,
        BarField::High => bar.high_price,
        BarField::Low => bar.low_price,
        BarField::Close => bar.close_price,
        BarField::Volume => bar.volume,
        BarField::Turnover => bar.turnover,
        BarField::LogReturn => f64::NAN,
    }
}

/// Memoized matrices over one loaded bar table.
///
/// Every matrix shares the same row index and column index. Each field has a
/// write-once slot, so concurrent first requests compute it exactly once and
/// never observe a partially built matrix.
pub struct MatrixCache {
    table: BarTable,
    tz: Tz,
    layout: PivotLayout,
    slots: [OnceLock<Arc<BarMatrix>>; BarField::ALL.len()],
    computations: AtomicUsize,
}

impl MatrixCache {
    /// Build the pivot layout for `table`.
    ///
    /// Fails with [`QuantError::DuplicateBarKey`] when two bars share a
    /// (symbol, datetime) pair.
    pub fn new(table: BarTable, tz: Tz) -> Result<Self> {
        let layout = PivotLayout::build(&table.bars, tz)?;
        info!(
            "Matrix cache ready: {} rows x {} symbols ({})",
            layout.index.len(),
            layout.columns.len(),
            tz.name()
        );
        Ok(Self {
            table,
            tz,
            layout,
            slots: Default::default(),
            computations: AtomicUsize::new(0),
        })
    }

    pub fn table(&self) -> &BarTable {
        &self.table
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn index(&self) -> &Arc<[DateTime<Tz>]> {
        &self.layout.index
    }

    pub fn columns(&self) -> &Arc<[String]> {
        &self.layout.columns
    }

    /// Matrix for `field`, computing it on first request.
    pub fn matrix_for(&self, field: BarField) -> Arc<BarMatrix> {
        let slot = &self.slots[field.ordinal()];
        Arc::clone(slot.get_or_init(|| Arc::new(self.compute(field))))
    }

    pub fn is_cached(&self, field: BarField) -> bool {
        self.slots[field.ordinal()].get().is_some()
    }

    /// Number of matrices computed so far.
    pub fn computations(&self) -> usize {
        self.computations.load(Ordering::SeqCst)
    }

    fn compute(&self, field: BarField) -> BarMatrix {
        self.computations.fetch_add(1, Ordering::SeqCst);
        debug!("Computing {} matrix", field);
        match field {
            BarField::LogReturn => self.matrix_for(BarField::Close).ln().diff(),
            raw => self.pivot(raw),
        }
    }

    fn pivot(&self, field: BarField) -> BarMatrix {
        let shape = (self.layout.index.len(), self.layout.columns.len());
        let mut values = Array2::from_elem(shape, f64::NAN);
        for (bar, &(row, col)) in self.table.bars.iter().zip(&self.layout.cells) {
            values[[row, col]] = raw_value(bar, field);
        }
        BarMatrix::from_layout(
            Arc::clone(&self.layout.index),
            Arc::clone(&self.layout.columns),
            values,
        )
    }
}

impl MatrixProvider for MatrixCache {
    fn matrix(&self, field: BarField) -> Result<Arc<BarMatrix>> {
        Ok(self.matrix_for(field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use quant_core::types::{Interval, Market};

    fn bar(symbol: &str, day: u32, close: f64) -> Bar {
        Bar {
            symbol: symbol.into(),
            exchange: "sh".into(),
            interval: Interval::Daily,
            datetime: NaiveDate::from_ymd_opt(2024, 1, day)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            open_price: close - 0.5,
            high_price: close + 1.0,
            low_price: close - 1.0,
            close_price: close,
            volume: 100.0,
            turnover: close * 100.0,
        }
    }

    fn cache(bars: Vec<Bar>) -> Result<MatrixCache> {
        MatrixCache::new(BarTable::new(Market::Ashare, bars), chrono_tz::Asia::Shanghai)
    }

    fn sample() -> MatrixCache {
        // 600001 has no bar on the 3rd; bars arrive out of order.
        cache(vec![
            bar("600001", 4, 20.0),
            bar("600000", 2, 10.0),
            bar("600000", 3, 11.0),
            bar("600001", 2, 21.0),
            bar("600000", 4, 12.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_pivot_sorts_and_marks_missing() {
        let cache = sample();
        let close = cache.matrix_for(BarField::Close);
        assert_eq!(close.columns().to_vec(), vec!["600000", "600001"]);
        assert_eq!(close.nrows(), 3);
        assert_eq!(close.get(0, 0), 10.0);
        assert_eq!(close.get(2, 1), 20.0);
        assert!(close.get(1, 1).is_nan());
        assert_eq!(close.index()[0].timezone(), chrono_tz::Asia::Shanghai);
        assert_eq!(close.index()[0].naive_local(), bar("x", 2, 0.0).datetime);
    }

    #[test]
    fn test_all_matrices_share_axes() {
        let cache = sample();
        let close = cache.matrix_for(BarField::Close);
        for field in BarField::ALL {
            let m = cache.matrix_for(field);
            assert!(Arc::ptr_eq(m.index(), close.index()));
            assert!(Arc::ptr_eq(m.columns(), close.columns()));
        }
    }

    #[test]
    fn test_log_return() {
        let cache = sample();
        let lr = cache.matrix_for(BarField::LogReturn);
        assert!(lr.values().row(0).iter().all(|v| v.is_nan()));
        assert!((lr.get(1, 0) - (11.0f64.ln() - 10.0f64.ln())).abs() < 1e-12);
        // Missing close on either side propagates.
        assert!(lr.get(1, 1).is_nan());
        assert!(lr.get(2, 1).is_nan());
    }

    #[test]
    fn test_each_field_computed_once() {
        let cache = sample();
        let a = cache.matrix_for(BarField::LogReturn);
        assert_eq!(cache.computations(), 2); // log_return + close
        let b = cache.matrix_for(BarField::LogReturn);
        let _ = cache.matrix_for(BarField::Close);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.computations(), 2);
        assert!(!cache.is_cached(BarField::Open));
    }

    #[test]
    fn test_concurrent_first_access_computes_once() {
        let cache = sample();
        let results: Vec<Arc<BarMatrix>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| cache.matrix_for(BarField::High)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(results.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(cache.computations(), 1);
    }

    #[test]
    fn test_duplicate_bar_fails() {
        let err = cache(vec![bar("600000", 2, 10.0), bar("600000", 2, 10.5)])
            .err()
            .unwrap();
        match err {
            QuantError::DuplicateBarKey { symbol, .. } => assert_eq!(symbol, "600000"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_empty_table_gives_empty_matrices() {
        let cache = cache(Vec::new()).unwrap();
        let close = cache.matrix_for(BarField::Close);
        assert_eq!((close.nrows(), close.ncols()), (0, 0));
    }
}
