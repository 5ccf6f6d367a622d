//! Time × symbol matrices and the vectorized operations factor formulas are built from.
//!
//! Missing cells are `NaN`. All operations work column by column (one column
//! per symbol) and only ever look backwards in time, except [`BarMatrix::lead`],
//! which exists for forward-return construction and must not be used by factors.

use std::sync::Arc;

use chrono::DateTime;
use chrono_tz::Tz;
use ndarray::{Array2, Zip};

use quant_core::error::{QuantError, Result};

use crate::series::{FactorEntry, FactorSeries};

#[derive(Debug, Clone)]
pub struct BarMatrix {
    index: Arc<[DateTime<Tz>]>,
    columns: Arc<[String]>,
    values: Array2<f64>,
}

impl BarMatrix {
    /// Build a matrix. The index and columns must be strictly increasing and
    /// match the value shape.
    pub fn new(index: Arc<[DateTime<Tz>]>, columns: Arc<[String]>, values: Array2<f64>) -> Result<Self> {
        if values.dim() != (index.len(), columns.len()) {
            return Err(QuantError::DataError(format!(
                "Matrix shape {:?} does not match index {} x columns {}",
                values.dim(),
                index.len(),
                columns.len()
            )));
        }
        if index.windows(2).any(|w| w[0] >= w[1]) {
            return Err(QuantError::DataError("Matrix index must be sorted and unique".into()));
        }
        if columns.windows(2).any(|w| w[0] >= w[1]) {
            return Err(QuantError::DataError("Matrix columns must be sorted and unique".into()));
        }
        Ok(Self { index, columns, values })
    }

    /// Build from axes the caller already holds sorted and sized to `values`.
    pub(crate) fn from_layout(index: Arc<[DateTime<Tz>]>, columns: Arc<[String]>, values: Array2<f64>) -> Self {
        debug_assert_eq!(values.dim(), (index.len(), columns.len()));
        Self { index, columns, values }
    }

    /// Convenience constructor from row vectors.
    pub fn from_rows(index: Vec<DateTime<Tz>>, columns: Vec<String>, rows: &[Vec<f64>]) -> Result<Self> {
        let ncols = columns.len();
        if rows.len() != index.len() || rows.iter().any(|r| r.len() != ncols) {
            return Err(QuantError::DataError("Ragged rows for matrix".into()));
        }
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        let values = Array2::from_shape_vec((index.len(), ncols), flat)
            .map_err(|e| QuantError::DataError(e.to_string()))?;
        Self::new(index.into(), columns.into(), values)
    }

    pub fn index(&self) -> &Arc<[DateTime<Tz>]> {
        &self.index
    }

    pub fn columns(&self) -> &Arc<[String]> {
        &self.columns
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[[row, col]]
    }

    pub fn row_position(&self, datetime: &DateTime<Tz>) -> Option<usize> {
        self.index.binary_search(datetime).ok()
    }

    pub fn column_position(&self, symbol: &str) -> Option<usize> {
        self.columns.binary_search_by(|c| c.as_str().cmp(symbol)).ok()
    }

    /// Value at (datetime, symbol); `None` when either key is absent.
    pub fn value_at(&self, datetime: &DateTime<Tz>, symbol: &str) -> Option<f64> {
        Some(self.get(self.row_position(datetime)?, self.column_position(symbol)?))
    }

    /// True when both matrices share the same row and column index.
    pub fn is_aligned_with(&self, other: &BarMatrix) -> bool {
        let same_index = Arc::ptr_eq(&self.index, &other.index) || self.index == other.index;
        let same_columns = Arc::ptr_eq(&self.columns, &other.columns) || self.columns == other.columns;
        same_index && same_columns
    }

    fn with_values(&self, values: Array2<f64>) -> BarMatrix {
        BarMatrix {
            index: Arc::clone(&self.index),
            columns: Arc::clone(&self.columns),
            values,
        }
    }

    // ── Elementwise ─────────────────────────────────────────────────

    pub fn map(&self, f: impl Fn(f64) -> f64) -> BarMatrix {
        self.with_values(self.values.mapv(f))
    }

    /// Combine two aligned matrices cell by cell.
    pub fn zip_with(&self, other: &BarMatrix, f: impl Fn(f64, f64) -> f64) -> Result<BarMatrix> {
        if !self.is_aligned_with(other) {
            return Err(QuantError::DataError(
                "Cannot combine matrices with different row or column index".into(),
            ));
        }
        let mut out = Array2::from_elem(self.values.dim(), f64::NAN);
        Zip::from(&mut out)
            .and(&self.values)
            .and(&other.values)
            .for_each(|o, &a, &b| *o = f(a, b));
        Ok(self.with_values(out))
    }

    pub fn ln(&self) -> BarMatrix {
        self.map(f64::ln)
    }

    pub fn abs(&self) -> BarMatrix {
        self.map(f64::abs)
    }

    pub fn scale(&self, k: f64) -> BarMatrix {
        self.map(|v| v * k)
    }

    pub fn fill_missing(&self, fill: f64) -> BarMatrix {
        self.map(|v| if v.is_nan() { fill } else { v })
    }

    /// Overwrite every cell of one row.
    pub fn set_row(&mut self, row: usize, value: f64) {
        if row < self.nrows() {
            self.values.row_mut(row).fill(value);
        }
    }

    // ── Time shifts ─────────────────────────────────────────────────

    /// Lag by `periods` rows: row `t` holds the value of row `t - periods`.
    pub fn shift(&self, periods: usize) -> BarMatrix {
        let (nrows, ncols) = self.values.dim();
        let mut out = Array2::from_elem((nrows, ncols), f64::NAN);
        for i in periods..nrows {
            out.row_mut(i).assign(&self.values.row(i - periods));
        }
        self.with_values(out)
    }

    /// Lead by `periods` rows: row `t` holds the value of row `t + periods`.
    /// Only for building forward returns.
    pub fn lead(&self, periods: usize) -> BarMatrix {
        let (nrows, ncols) = self.values.dim();
        let mut out = Array2::from_elem((nrows, ncols), f64::NAN);
        for i in 0..nrows.saturating_sub(periods) {
            out.row_mut(i).assign(&self.values.row(i + periods));
        }
        self.with_values(out)
    }

    /// Keep the first `nrows` rows.
    pub fn head(&self, nrows: usize) -> BarMatrix {
        let n = nrows.min(self.nrows());
        BarMatrix {
            index: self.index[..n].to_vec().into(),
            columns: Arc::clone(&self.columns),
            values: self.values.slice(ndarray::s![..n, ..]).to_owned(),
        }
    }

    /// First difference; the first row is missing.
    pub fn diff(&self) -> BarMatrix {
        let lagged = self.shift(1);
        self.with_values(&self.values - &lagged.values)
    }

    /// Percent change against the previous row. Gaps are padded with the last
    /// observed value before the change is taken, so the row after a missing
    /// stretch compares against the last known value.
    pub fn pct_change(&self) -> BarMatrix {
        let (nrows, ncols) = self.values.dim();
        let mut out = Array2::from_elem((nrows, ncols), f64::NAN);
        for j in 0..ncols {
            let mut prev = f64::NAN;
            for i in 0..nrows {
                let cur = match self.values[[i, j]] {
                    v if v.is_nan() => prev,
                    v => v,
                };
                if i > 0 {
                    out[[i, j]] = cur / prev - 1.0;
                }
                prev = cur;
            }
        }
        self.with_values(out)
    }

    /// Running sum down each column; missing cells stay missing and are skipped.
    pub fn cumsum(&self) -> BarMatrix {
        let mut out = self.values.clone();
        for mut col in out.columns_mut() {
            let mut acc = 0.0;
            for v in col.iter_mut() {
                if !v.is_nan() {
                    acc += *v;
                    *v = acc;
                }
            }
        }
        self.with_values(out)
    }

    // ── Rolling windows ─────────────────────────────────────────────

    /// Apply `f` over each trailing window of `window` rows (current row included).
    ///
    /// The result is missing until the window is full and whenever the window
    /// holds a missing cell.
    pub fn rolling(&self, window: usize, f: impl Fn(&[f64]) -> f64) -> BarMatrix {
        let (nrows, ncols) = self.values.dim();
        let mut out = Array2::from_elem((nrows, ncols), f64::NAN);
        if window == 0 {
            return self.with_values(out);
        }
        let mut buf = Vec::with_capacity(window);
        for j in 0..ncols {
            let col = self.values.column(j);
            for i in (window - 1)..nrows {
                buf.clear();
                buf.extend((i + 1 - window..=i).map(|k| col[k]));
                if buf.iter().all(|v| !v.is_nan()) {
                    out[[i, j]] = f(&buf);
                }
            }
        }
        self.with_values(out)
    }

    pub fn rolling_sum(&self, window: usize) -> BarMatrix {
        self.rolling(window, |w| w.iter().sum())
    }

    pub fn rolling_mean(&self, window: usize) -> BarMatrix {
        self.rolling(window, mean)
    }

    /// Sample standard deviation (n - 1 denominator).
    pub fn rolling_std(&self, window: usize) -> BarMatrix {
        self.rolling(window, sample_std)
    }

    // ── Long form ───────────────────────────────────────────────────

    /// Flatten to a (datetime, symbol) series, dropping rows where every cell is missing.
    pub fn stack(&self) -> FactorSeries {
        let mut entries = Vec::new();
        for (i, row) in self.values.rows().into_iter().enumerate() {
            if row.iter().all(|v| v.is_nan()) {
                continue;
            }
            entries.extend(row.iter().enumerate().map(|(j, &value)| FactorEntry {
                row: i,
                col: j,
                value,
            }));
        }
        FactorSeries::new(Arc::clone(&self.index), Arc::clone(&self.columns), entries)
    }
}

/// Arithmetic mean; `NaN` for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1); `NaN` below two values.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}


#[cfg(test)]
mod tests {
    use super::test_util::matrix;
    use super::*;

    const NAN: f64 = f64::NAN;

    fn col(m: &BarMatrix, j: usize) -> Vec<f64> {
        m.values().column(j).to_vec()
    }

    fn assert_col(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            if e.is_nan() {
                assert!(a.is_nan(), "expected NaN, got {}", a);
            } else {
                assert!((a - e).abs() < 1e-12, "expected {}, got {}", e, a);
            }
        }
    }

    #[test]
    fn test_new_rejects_unsorted_columns() {
        let m = BarMatrix::from_rows(
            test_util::dates(1),
            vec!["600001".into(), "600000".into()],
            &[vec![1.0, 2.0]],
        );
        assert!(m.is_err());
    }

    #[test]
    fn test_shift_looks_back_only() {
        let m = matrix(&[vec![1.0], vec![2.0], vec![3.0]]);
        assert_col(&col(&m.shift(1), 0), &[NAN, 1.0, 2.0]);
        assert_col(&col(&m.shift(5), 0), &[NAN, NAN, NAN]);
        assert_col(&col(&m.lead(1), 0), &[2.0, 3.0, NAN]);
    }

    #[test]
    fn test_diff_and_pct_change() {
        let m = matrix(&[vec![2.0], vec![3.0], vec![NAN], vec![6.0]]);
        assert_col(&col(&m.diff(), 0), &[NAN, 1.0, NAN, NAN]);
        // The gap is padded with 3.0, so the last change is 6/3 - 1.
        assert_col(&col(&m.pct_change(), 0), &[NAN, 0.5, 0.0, 1.0]);
    }

    #[test]
    fn test_rolling_needs_full_window() {
        let m = matrix(&[vec![1.0], vec![2.0], vec![3.0], vec![NAN], vec![5.0], vec![6.0]]);
        assert_col(&col(&m.rolling_sum(2), 0), &[NAN, 3.0, 5.0, NAN, NAN, 11.0]);
        assert_col(&col(&m.rolling_mean(3), 0), &[NAN, NAN, 2.0, NAN, NAN, NAN]);
        let std = col(&m.rolling_std(2), 0);
        assert!((std[1] - (0.5f64).sqrt()).abs() < 1e-12);
        assert!(m.rolling_std(1).values().iter().all(|v| v.is_nan()));
        assert!(m.rolling_sum(0).values().iter().all(|v| v.is_nan()));
        assert!(m.rolling_sum(10).values().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_cumsum_skips_missing() {
        let m = matrix(&[vec![1.0], vec![NAN], vec![2.0]]);
        assert_col(&col(&m.cumsum(), 0), &[1.0, NAN, 3.0]);
        assert_col(&col(&m.fill_missing(0.0).cumsum(), 0), &[1.0, 1.0, 3.0]);
    }

    #[test]
    fn test_zip_requires_alignment() {
        let a = matrix(&[vec![1.0, 2.0]]);
        let b = matrix(&[vec![3.0, 4.0]]);
        let sum = a.zip_with(&b, |x, y| x + y).unwrap();
        assert_eq!(sum.values().row(0).to_vec(), vec![4.0, 6.0]);

        let c = matrix(&[vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert!(a.zip_with(&c, |x, y| x + y).is_err());
    }

    #[test]
    fn test_stack_drops_all_missing_rows() {
        let m = matrix(&[vec![NAN, NAN], vec![1.0, NAN], vec![2.0, 3.0]]);
        let series = m.stack();
        assert_eq!(series.len(), 4);
        let idx = m.index().clone();
        assert_eq!(series.get(&idx[0], "600000"), None);
        assert!(series.get(&idx[1], "600001").unwrap().is_nan());
        assert_eq!(series.get(&idx[2], "600001"), Some(3.0));
    }

    #[test]
    fn test_head_and_lookup() {
        let m = matrix(&[vec![1.0], vec![2.0], vec![3.0]]);
        let h = m.head(2);
        assert_eq!(h.nrows(), 2);
        assert_eq!(h.value_at(&m.index()[1], "600000"), Some(2.0));
        assert_eq!(h.value_at(&m.index()[2], "600000"), None);
        assert_eq!(m.value_at(&m.index()[0], "999999"), None);
    }
}
