use std::sync::Arc;

use chrono::DateTime;
use chrono_tz::Tz;

/// One cell of a stacked matrix. `row`/`col` index into the series' shared axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorEntry {
    pub row: usize,
    pub col: usize,
    pub value: f64,
}

/// Long-form factor values keyed by (datetime, symbol), ordered by datetime then symbol.
///
/// The datetime and symbol axes are shared with the matrix the series was
/// stacked from, so entries stay small.
#[derive(Debug, Clone)]
pub struct FactorSeries {
    index: Arc<[DateTime<Tz>]>,
    columns: Arc<[String]>,
    entries: Vec<FactorEntry>,
}

impl FactorSeries {
    pub fn new(index: Arc<[DateTime<Tz>]>, columns: Arc<[String]>, entries: Vec<FactorEntry>) -> Self {
        Self { index, columns, entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index(&self) -> &Arc<[DateTime<Tz>]> {
        &self.index
    }

    pub fn columns(&self) -> &Arc<[String]> {
        &self.columns
    }

    pub fn entries(&self) -> &[FactorEntry] {
        &self.entries
    }

    pub fn datetime(&self, entry: &FactorEntry) -> &DateTime<Tz> {
        &self.index[entry.row]
    }

    pub fn symbol(&self, entry: &FactorEntry) -> &str {
        &self.columns[entry.col]
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DateTime<Tz>, &str, f64)> + '_ {
        self.entries
            .iter()
            .map(move |e| (&self.index[e.row], self.columns[e.col].as_str(), e.value))
    }

    pub fn get(&self, datetime: &DateTime<Tz>, symbol: &str) -> Option<f64> {
        let row = self.index.binary_search(datetime).ok()?;
        let col = self.columns.binary_search_by(|c| c.as_str().cmp(symbol)).ok()?;
        let pos = self
            .entries
            .binary_search_by(|e| (e.row, e.col).cmp(&(row, col)))
            .ok()?;
        Some(self.entries[pos].value)
    }

    /// Number of entries holding a value (neither missing nor infinite).
    pub fn count_finite(&self) -> usize {
        self.entries.iter().filter(|e| e.value.is_finite()).count()
    }

    /// Mean and sample standard deviation over the finite entries.
    pub fn moments(&self) -> (f64, f64) {
        let finite: Vec<f64> = self
            .entries
            .iter()
            .map(|e| e.value)
            .filter(|v| v.is_finite())
            .collect();
        (crate::matrix::mean(&finite), crate::matrix::sample_std(&finite))
    }

    pub fn map_values(&self, f: impl Fn(f64) -> f64) -> FactorSeries {
        FactorSeries {
            index: Arc::clone(&self.index),
            columns: Arc::clone(&self.columns),
            entries: self
                .entries
                .iter()
                .map(|e| FactorEntry { value: f(e.value), ..*e })
                .collect(),
        }
    }

    /// Global z-score: one mean and one standard deviation over every finite
    /// entry of the series, not per date. Missing entries stay missing.
    pub fn standardize(&self) -> FactorSeries {
        let (mean, std) = self.moments();
        self.map_values(|v| (v - mean) / std)
    }
}

#[cfg(test)]
mod tests {
    use crate::matrix::test_util::matrix;

    const NAN: f64 = f64::NAN;

    #[test]
    fn test_standardize_global_moments() {
        let series = matrix(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, NAN]]).stack();
        let z = series.standardize();
        let (mean, std) = z.moments();
        assert!(mean.abs() < 1e-12);
        assert!((std - 1.0).abs() < 1e-12);
        assert_eq!(z.len(), 6);
        assert_eq!(z.count_finite(), 5);
    }

    #[test]
    fn test_standardize_ignores_infinite_in_moments() {
        let series = matrix(&[vec![1.0, f64::INFINITY], vec![3.0, 5.0]]).stack();
        let (mean, _) = series.moments();
        assert!((mean - 3.0).abs() < 1e-12);
        let z = series.standardize();
        assert!(z.entries()[1].value.is_infinite());
    }

    #[test]
    fn test_restandardizing_is_stable_only_after_first_pass() {
        // A second pass over standardized output changes nothing; the first
        // pass over raw values does.
        let raw = matrix(&[vec![10.0, 20.0], vec![30.0, 60.0]]).stack();
        let once = raw.standardize();
        let twice = once.standardize();
        for (a, b) in once.entries().iter().zip(twice.entries()) {
            assert!((a.value - b.value).abs() < 1e-12);
        }
        assert!((raw.entries()[0].value - once.entries()[0].value).abs() > 1.0);
    }

    #[test]
    fn test_iter_order_and_lookup() {
        let m = matrix(&[vec![1.0, 2.0], vec![3.0, 4.0]]);
        let series = m.stack();
        let items: Vec<(String, f64)> = series.iter().map(|(_, s, v)| (s.to_string(), v)).collect();
        assert_eq!(items[0], ("600000".to_string(), 1.0));
        assert_eq!(items[3], ("600001".to_string(), 4.0));
        assert_eq!(series.get(&m.index()[1], "600000"), Some(3.0));
    }
}
