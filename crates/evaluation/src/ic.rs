use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use quant_core::error::QuantError;

use crate::forward::CleanFactorData;

/// Correlation used for the per-date information coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IcMethod {
    /// Spearman rank correlation.
    Rank,
    /// Pearson correlation on raw values.
    Pearson,
}

impl fmt::Display for IcMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IcMethod::Rank => write!(f, "rank"),
            IcMethod::Pearson => write!(f, "pearson"),
        }
    }
}

impl FromStr for IcMethod {
    type Err = QuantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rank" | "spearman" => Ok(IcMethod::Rank),
            "pearson" | "normal" => Ok(IcMethod::Pearson),
            other => Err(QuantError::ConfigError(format!("Unknown IC method: {}", other))),
        }
    }
}

/// Per-date IC, one column per forward-return horizon.
#[derive(Debug, Clone)]
pub struct IcTable {
    pub periods: Vec<usize>,
    pub dates: Vec<DateTime<Tz>>,
    /// `values[date][horizon]`; `NaN` when a date has too few observations.
    pub values: Vec<Vec<f64>>,
}

impl IcTable {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// IC series for one horizon, in date order.
    pub fn column(&self, period_idx: usize) -> Vec<f64> {
        self.values.iter().map(|row| row[period_idx]).collect()
    }
}

/// Computes the cross-sectional IC of each date.
pub trait IcEstimator: Send + Sync {
    fn name(&self) -> String;

    /// Correlation of two equally long samples; `NaN` if undefined.
    fn correlation(&self, factor: &[f64], returns: &[f64]) -> f64;

    fn information_coefficient(&self, data: &CleanFactorData) -> IcTable {
        let periods = data.periods().to_vec();
        let mut dates = Vec::new();
        let mut values = Vec::new();
        for group in data.by_date() {
            let factor: Vec<f64> = group.iter().map(|r| r.factor).collect();
            let row = (0..periods.len())
                .map(|k| {
                    let returns: Vec<f64> = group.iter().map(|r| r.forward[k]).collect();
                    self.correlation(&factor, &returns)
                })
                .collect();
            dates.push(group[0].datetime);
            values.push(row);
        }
        IcTable { periods, dates, values }
    }
}

/// The default estimator: one correlation per date across all symbols.
#[derive(Debug, Clone, Copy)]
pub struct CrossSectionalIc {
    pub method: IcMethod,
}

impl CrossSectionalIc {
    pub fn new(method: IcMethod) -> Self {
        Self { method }
    }
}

impl Default for CrossSectionalIc {
    fn default() -> Self {
        Self::new(IcMethod::Rank)
    }
}

impl IcEstimator for CrossSectionalIc {
    fn name(&self) -> String {
        format!("{} IC", self.method)
    }

    fn correlation(&self, factor: &[f64], returns: &[f64]) -> f64 {
        match self.method {
            IcMethod::Rank => spearman(factor, returns),
            IcMethod::Pearson => pearson(factor, returns),
        }
    }
}

/// Pearson correlation. Needs at least two points and variance on both sides.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len();
    if n < 2 || n != y.len() {
        return f64::NAN;
    }
    let mx = x.iter().sum::<f64>() / n as f64;
    let my = y.iter().sum::<f64>() / n as f64;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let (dx, dy) = (a - mx, b - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    sxy / (sxx * syy).sqrt()
}

pub fn spearman(x: &[f64], y: &[f64]) -> f64 {
    pearson(&average_ranks(x), &average_ranks(y))
}

/// 1-based ranks; ties share the average of the ranks they span.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &k in &order[i..=j] {
            ranks[k] = avg;
        }
        i = j + 1;
    }
    ranks
}
