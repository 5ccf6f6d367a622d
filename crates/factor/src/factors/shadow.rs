//! Williams shadow factors: the candle shadow normalized by its own trailing mean.

use quant_core::error::Result;
use quant_core::types::{BarField, Interval};

use crate::cache::MatrixProvider;
use crate::matrix::BarMatrix;
use crate::template::Factor;

fn normalized_shadow(shadow: &BarMatrix, window: usize) -> Result<BarMatrix> {
    let trailing = shadow.rolling_mean(window);
    shadow.zip_with(&trailing, |s, m| s / m)
}

/// `(high - close) / rolling_mean(high - close)`, sign kept.
#[derive(Debug, Clone)]
pub struct WilliamsUpperShadow {
    window: usize,
    frequency: Interval,
}

impl WilliamsUpperShadow {
    pub fn new(frequency: Interval, window: usize) -> Self {
        Self { window, frequency }
    }
}

impl Factor for WilliamsUpperShadow {
    fn name(&self) -> String {
        format!("william_upper_shadow_{}{}", self.window, self.frequency)
    }

    fn description(&self) -> &str {
        "Normalized Williams upper shadow"
    }

    fn factor_matrix(&self, data: &dyn MatrixProvider) -> Result<BarMatrix> {
        let high = data.matrix(BarField::High)?;
        let close = data.matrix(BarField::Close)?;
        let shadow = high.zip_with(&close, |h, c| h - c)?;
        normalized_shadow(&shadow, self.window)
    }
}

/// `(close - low) / rolling_mean(close - low)`, sign flipped.
#[derive(Debug, Clone)]
pub struct WilliamsLowerShadow {
    window: usize,
    frequency: Interval,
}

impl WilliamsLowerShadow {
    pub fn new(frequency: Interval, window: usize) -> Self {
        Self { window, frequency }
    }
}

impl Factor for WilliamsLowerShadow {
    fn name(&self) -> String {
        format!("william_lower_shadow_{}{}", self.window, self.frequency)
    }

    fn description(&self) -> &str {
        "Reversed normalized Williams lower shadow"
    }

    fn factor_matrix(&self, data: &dyn MatrixProvider) -> Result<BarMatrix> {
        let low = data.matrix(BarField::Low)?;
        let close = data.matrix(BarField::Close)?;
        let shadow = close.zip_with(&low, |c, l| c - l)?;
        Ok(normalized_shadow(&shadow, self.window)?.scale(-1.0))
    }
}
