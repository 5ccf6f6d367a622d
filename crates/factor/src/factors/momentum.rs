// Price-trend factors

use quant_core::error::Result;
use quant_core::types::{BarField, Interval};

use crate::cache::MatrixProvider;
use crate::matrix::BarMatrix;
use crate::template::Factor;

/// Trailing sum of log returns, sign flipped (A-shares revert more than they trend).
#[derive(Debug, Clone)]
pub struct MomentumFactor {
    window: usize,
    frequency: Interval,
}

impl MomentumFactor {
    pub fn new(frequency: Interval, window: usize) -> Self {
        Self { window, frequency }
    }
}

impl Factor for MomentumFactor {
    fn name(&self) -> String {
        format!("momentum_{}{}", self.window, self.frequency)
    }

    fn description(&self) -> &str {
        "Reversed cumulative log return over the lookback window"
    }

    fn factor_matrix(&self, data: &dyn MatrixProvider) -> Result<BarMatrix> {
        let log_return = data.matrix(BarField::LogReturn)?;
        Ok(log_return.rolling_sum(self.window).scale(-1.0))
    }
}

/// Rate-of-change spread: ROC over `lookback` rows minus its `ma_window` moving average.
#[derive(Debug, Clone)]
pub struct ROCSpread {
    lookback: usize,
    ma_window: usize,
    frequency: Interval,
}

impl ROCSpread {
    pub const DEFAULT_LOOKBACK: usize = 12;
    pub const DEFAULT_MA_WINDOW: usize = 6;

    pub fn new(frequency: Interval, lookback: usize, ma_window: usize) -> Self {
        Self {
            lookback,
            ma_window,
            frequency,
        }
    }

    pub fn with_defaults(frequency: Interval) -> Self {
        Self::new(frequency, Self::DEFAULT_LOOKBACK, Self::DEFAULT_MA_WINDOW)
    }

    pub fn frequency(&self) -> Interval {
        self.frequency
    }
}

impl Factor for ROCSpread {
    fn name(&self) -> String {
        format!("ROC_{}n_{}m", self.lookback, self.ma_window)
    }

    fn description(&self) -> &str {
        "Reversed spread between rate of change and its moving average"
    }

    fn factor_matrix(&self, data: &dyn MatrixProvider) -> Result<BarMatrix> {
        let close = data.matrix(BarField::Close)?;
        let base = close.shift(self.lookback);
        let roc = close.zip_with(&base, |c, b| (c - b) / b * 100.0)?;
        let roc_ma = roc.rolling_mean(self.ma_window);
        roc.zip_with(&roc_ma, |r, m| -(r - m))
    }
}
