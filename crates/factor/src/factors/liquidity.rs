// Volume-based factors

use quant_core::error::Result;
use quant_core::types::{BarField, Interval};

use crate::cache::MatrixProvider;
use crate::matrix::BarMatrix;
use crate::template::Factor;

/// Coefficient of variation of Amihud illiquidity (|log return| / volume).
#[derive(Debug, Clone)]
pub struct CVILLIQ {
    window: usize,
    frequency: Interval,
}

impl CVILLIQ {
    pub const DEFAULT_WINDOW: usize = 20;

    pub fn new(frequency: Interval, window: usize) -> Self {
        Self { window, frequency }
    }

    pub fn with_defaults(frequency: Interval) -> Self {
        Self::new(frequency, Self::DEFAULT_WINDOW)
    }
}

impl Factor for CVILLIQ {
    fn name(&self) -> String {
        format!("CVILLIQ_{}{}", self.window, self.frequency)
    }

    fn description(&self) -> &str {
        "Reversed coefficient of variation of illiquidity"
    }

    fn factor_matrix(&self, data: &dyn MatrixProvider) -> Result<BarMatrix> {
        let log_return = data.matrix(BarField::LogReturn)?;
        let volume = data.matrix(BarField::Volume)?;
        let illiq = log_return.zip_with(&volume, |r, v| r.abs() / v)?;
        let std = illiq.rolling_std(self.window);
        let mean = illiq.rolling_mean(self.window);
        std.zip_with(&mean, |s, m| -(s / m))
    }
}

/// Volume-price trend: running sum of close pct change times volume.
#[derive(Debug, Clone, Default)]
pub struct VPT;

impl VPT {
    pub fn new() -> Self {
        Self
    }
}

impl Factor for VPT {
    fn name(&self) -> String {
        "VPT".into()
    }

    fn description(&self) -> &str {
        "Reversed volume-price trend"
    }

    fn factor_matrix(&self, data: &dyn MatrixProvider) -> Result<BarMatrix> {
        let close = data.matrix(BarField::Close)?;
        let volume = data.matrix(BarField::Volume)?;
        let mut increment = close.pct_change().zip_with(&volume, |r, v| r * v)?;
        increment.set_row(0, 0.0);
        Ok(increment.fill_missing(0.0).cumsum().scale(-1.0))
    }
}
