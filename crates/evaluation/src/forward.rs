//! Forward returns and the cleaned factor/return join every statistic is computed from.

use std::sync::Arc;

use chrono::DateTime;
use chrono_tz::Tz;
use tracing::{debug, info};

use quant_core::error::Result;
use quant_factor::{BarMatrix, FactorSeries};

/// Forward returns per horizon, measured on next-bar opens.
///
/// Entry prices are the open of the bar after the factor date, so a factor
/// value at `t` is never evaluated against a price it could have seen.
#[derive(Debug, Clone)]
pub struct ForwardReturns {
    periods: Vec<usize>,
    prices: BarMatrix,
    returns: Vec<BarMatrix>,
}

impl ForwardReturns {
    /// `prices[t] = open[t + 1]` with the last row dropped; the return for
    /// horizon `p` at `t` is `prices[t + p] / prices[t] - 1`.
    pub fn from_open(open: &BarMatrix, periods: &[usize]) -> Result<Self> {
        let prices = open.lead(1).head(open.nrows().saturating_sub(1));
        let returns = periods
            .iter()
            .map(|&p| prices.lead(p).zip_with(&prices, |future, now| future / now - 1.0))
            .collect::<Result<Vec<_>>>()?;
        debug!(
            "Forward returns built for {} dates, periods {:?}",
            prices.nrows(),
            periods
        );
        Ok(Self {
            periods: periods.to_vec(),
            prices,
            returns,
        })
    }

    pub fn periods(&self) -> &[usize] {
        &self.periods
    }

    pub fn prices(&self) -> &BarMatrix {
        &self.prices
    }

    pub fn returns(&self, period_idx: usize) -> &BarMatrix {
        &self.returns[period_idx]
    }

    /// Column labels for each horizon, e.g. `1d`.
    pub fn horizon_labels(&self) -> Vec<String> {
        horizon_labels(&self.periods)
    }
}

pub fn horizon_labels(periods: &[usize]) -> Vec<String> {
    periods.iter().map(|p| format!("{}d", p)).collect()
}

/// One (date, symbol) row that survived cleaning.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorObservation {
    pub datetime: DateTime<Tz>,
    /// Position in [`CleanFactorData::columns`].
    pub col: usize,
    pub factor: f64,
    /// One forward return per horizon, in period order.
    pub forward: Vec<f64>,
    /// 1-based factor quantile within the date.
    pub quantile: usize,
}

/// Factor values joined with forward returns, with every row holding a
/// missing or infinite value removed.
#[derive(Debug, Clone)]
pub struct CleanFactorData {
    periods: Vec<usize>,
    quantiles: usize,
    columns: Arc<[String]>,
    rows: Vec<FactorObservation>,
    dropped: usize,
}

impl CleanFactorData {
    pub fn periods(&self) -> &[usize] {
        &self.periods
    }

    pub fn quantiles(&self) -> usize {
        self.quantiles
    }

    pub fn rows(&self) -> &[FactorObservation] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn symbol(&self, row: &FactorObservation) -> &str {
        &self.columns[row.col]
    }

    /// Rows removed by the join and the missing/infinite filter.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn dropped_fraction(&self) -> f64 {
        let total = self.rows.len() + self.dropped;
        if total == 0 {
            0.0
        } else {
            self.dropped as f64 / total as f64
        }
    }

    /// Rows grouped by date, in date order.
    pub fn by_date(&self) -> Vec<&[FactorObservation]> {
        group_by_date(&self.rows)
    }
}

fn group_by_date(rows: &[FactorObservation]) -> Vec<&[FactorObservation]> {
    let mut groups = Vec::new();
    let mut start = 0;
    for i in 1..=rows.len() {
        if i == rows.len() || rows[i].datetime != rows[start].datetime {
            if i > start {
                groups.push(&rows[start..i]);
            }
            start = i;
        }
    }
    groups
}

/// Join a factor series with forward returns and clean the result.
///
/// Factor rows whose date is not in the price index are dropped, as is any
/// row where the factor or a forward return is missing or infinite. Each
/// surviving row is assigned an equal-count factor quantile within its date.
pub fn clean_factor_and_forward_returns(
    factor: &FactorSeries,
    forward: &ForwardReturns,
    quantiles: usize,
) -> CleanFactorData {
    let prices = forward.prices();
    let col_map: Vec<Option<usize>> = factor
        .columns()
        .iter()
        .map(|s| prices.column_position(s))
        .collect();

    let mut rows = Vec::with_capacity(factor.len());
    let mut last_row: Option<(usize, Option<usize>)> = None;
    for entry in factor.entries() {
        let price_row = match last_row {
            Some((row, pos)) if row == entry.row => pos,
            _ => {
                let pos = prices.row_position(factor.datetime(entry));
                last_row = Some((entry.row, pos));
                pos
            }
        };
        let (Some(t), Some(col)) = (price_row, col_map[entry.col]) else {
            continue;
        };
        if !entry.value.is_finite() {
            continue;
        }
        let fwd: Vec<f64> = (0..forward.periods().len())
            .map(|k| forward.returns(k).get(t, col))
            .collect();
        if fwd.iter().any(|v| !v.is_finite()) {
            continue;
        }
        rows.push(FactorObservation {
            datetime: prices.index()[t],
            col,
            factor: entry.value,
            forward: fwd,
            quantile: 0,
        });
    }

    let dropped = factor.len() - rows.len();
    assign_quantiles(&mut rows, quantiles);

    let data = CleanFactorData {
        periods: forward.periods().to_vec(),
        quantiles,
        columns: Arc::clone(prices.columns()),
        rows,
        dropped,
    };
    info!(
        "Dropped {:.1}% of factor entries ({} of {}) while cleaning",
        data.dropped_fraction() * 100.0,
        data.dropped,
        factor.len()
    );
    data
}

/// Equal-count buckets by rank within each date; ties keep symbol order.
fn assign_quantiles(rows: &mut [FactorObservation], quantiles: usize) {
    let mut start = 0;
    while start < rows.len() {
        let dt = rows[start].datetime;
        let end = rows[start..]
            .iter()
            .position(|r| r.datetime != dt)
            .map_or(rows.len(), |n| start + n);
        let group = &mut rows[start..end];
        let n = group.len();
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| group[a].factor.total_cmp(&group[b].factor));
        for (rank, &i) in order.iter().enumerate() {
            group[i].quantile = rank * quantiles / n + 1;
        }
        start = end;
    }
}
