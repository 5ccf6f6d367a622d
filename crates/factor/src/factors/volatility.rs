use quant_core::error::Result;
use quant_core::types::{BarField, Interval};

use crate::cache::MatrixProvider;
use crate::matrix::BarMatrix;
use crate::template::Factor;

/// Trailing sample standard deviation of log returns, sign flipped.
#[derive(Debug, Clone)]
pub struct Volatility {
    window: usize,
    frequency: Interval,
}

impl Volatility {
    pub fn new(frequency: Interval, window: usize) -> Self {
        Self { window, frequency }
    }
}

impl Factor for Volatility {
    fn name(&self) -> String {
        format!("volatility_{}{}", self.window, self.frequency)
    }

    fn description(&self) -> &str {
        "Reversed realized volatility of log returns"
    }

    fn factor_matrix(&self, data: &dyn MatrixProvider) -> Result<BarMatrix> {
        let log_return = data.matrix(BarField::LogReturn)?;
        Ok(log_return.rolling_std(self.window).scale(-1.0))
    }
}

/// Cumulative absolute overnight gap: sum of |ln(open_t / close_{t-1})| over the window.
///
/// Larger accumulated gaps tend to precede weaker returns, hence the flipped sign.
#[derive(Debug, Clone)]
pub struct AbsRetNight {
    window: usize,
    frequency: Interval,
}

impl AbsRetNight {
    pub fn new(frequency: Interval, window: usize) -> Self {
        Self { window, frequency }
    }
}

impl Factor for AbsRetNight {
    fn name(&self) -> String {
        format!("abs_ret_overnight_{}{}", self.window, self.frequency)
    }

    fn description(&self) -> &str {
        "Reversed cumulative absolute overnight return"
    }

    fn factor_matrix(&self, data: &dyn MatrixProvider) -> Result<BarMatrix> {
        let open = data.matrix(BarField::Open)?;
        let prev_close = data.matrix(BarField::Close)?.shift(1);
        let gap = open.zip_with(&prev_close, |o, c| (o / c).ln().abs())?;
        Ok(gap.rolling_sum(self.window).scale(-1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factors::test_support::FixedProvider;
    use crate::matrix::test_util::matrix;

    #[test]
    fn test_volatility_window_and_sign() {
        let closes = vec![vec![10.0], vec![11.0], vec![10.0], vec![11.0], vec![12.0]];
        let data = FixedProvider::from_close(&closes);
        let m = Volatility::new(Interval::Daily, 3).factor_matrix(&data).unwrap();
        // log_return row 0 is missing, so the first full window ends at row 3.
        for i in 0..3 {
            assert!(m.get(i, 0).is_nan());
        }
        assert!(m.get(3, 0) < 0.0);
        assert!(m.get(4, 0) < 0.0);
    }

    #[test]
    fn test_abs_ret_night() {
        let close = matrix(&[vec![10.0], vec![10.0], vec![10.0]]);
        let open = matrix(&[vec![9.0], vec![11.0], vec![9.0]]);
        let data = FixedProvider::new()
            .with(BarField::Close, close)
            .with(BarField::Open, open);
        let m = AbsRetNight::new(Interval::Daily, 2).factor_matrix(&data).unwrap();
        assert!(m.get(0, 0).is_nan());
        assert!(m.get(1, 0).is_nan());
        let expected = -((1.1f64).ln().abs() + (0.9f64).ln().abs());
        assert!((m.get(2, 0) - expected).abs() < 1e-12);
        assert_eq!(AbsRetNight::new(Interval::Daily, 20).name(), "abs_ret_overnight_20d");
    }
}
