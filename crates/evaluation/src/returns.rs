use serde::Serialize;

use crate::forward::{horizon_labels, CleanFactorData};

/// Mean forward return of each factor quantile, per horizon.
#[derive(Debug, Clone, Serialize)]
pub struct QuantileReturns {
    pub periods: Vec<usize>,
    /// `mean_returns[quantile - 1][horizon]`
    pub mean_returns: Vec<Vec<f64>>,
    /// Observations per quantile.
    pub counts: Vec<usize>,
}

impl QuantileReturns {
    pub fn calculate(data: &CleanFactorData) -> Self {
        let q = data.quantiles();
        let h = data.periods().len();
        let mut sums = vec![vec![0.0; h]; q];
        let mut counts = vec![0usize; q];
        for row in data.rows() {
            let bucket = row.quantile.saturating_sub(1).min(q.saturating_sub(1));
            counts[bucket] += 1;
            for (k, r) in row.forward.iter().enumerate() {
                sums[bucket][k] += r;
            }
        }
        let mean_returns = sums
            .into_iter()
            .zip(&counts)
            .map(|(row, &n)| {
                row.into_iter()
                    .map(|s| if n > 0 { s / n as f64 } else { f64::NAN })
                    .collect()
            })
            .collect();
        Self {
            periods: data.periods().to_vec(),
            mean_returns,
            counts,
        }
    }

    pub fn quantiles(&self) -> usize {
        self.mean_returns.len()
    }

    /// Top quantile minus bottom quantile mean return for one horizon.
    pub fn spread(&self, period_idx: usize) -> f64 {
        match (self.mean_returns.first(), self.mean_returns.last()) {
            (Some(bottom), Some(top)) => top[period_idx] - bottom[period_idx],
            _ => f64::NAN,
        }
    }

    /// Table rows: one per quantile, then the top-minus-bottom spread.
    pub fn rows(&self) -> Vec<QuantileReturnRow> {
        let labels = horizon_labels(&self.periods);
        let mut rows: Vec<QuantileReturnRow> = self
            .mean_returns
            .iter()
            .enumerate()
            .map(|(i, means)| QuantileReturnRow {
                quantile: (i + 1).to_string(),
                count: self.counts[i],
                returns: labels.iter().cloned().zip(means.iter().copied()).collect(),
            })
            .collect();
        rows.push(QuantileReturnRow {
            quantile: "top_minus_bottom".into(),
            count: self.counts.iter().sum(),
            returns: labels
                .iter()
                .cloned()
                .enumerate()
                .map(|(k, label)| (label, self.spread(k)))
                .collect(),
        });
        rows
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuantileReturnRow {
    pub quantile: String,
    pub count: usize,
    pub returns: Vec<(String, f64)>,
}
