use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::ic::IcTable;

/// Summary statistics of one horizon's IC series.
#[derive(Debug, Clone, Serialize)]
pub struct IcSummary {
    #[serde(rename = "period")]
    pub horizon: String,
    #[serde(rename = "IC Mean")]
    pub ic_mean: f64,
    #[serde(rename = "IC Std.")]
    pub ic_std: f64,
    #[serde(rename = "Risk-Adjusted IC")]
    pub risk_adjusted_ic: f64,
    #[serde(rename = "t-stat(IC)")]
    pub t_stat: f64,
    #[serde(rename = "p-value(IC)")]
    pub p_value: f64,
    #[serde(rename = "IC Skew")]
    pub ic_skew: f64,
    #[serde(rename = "IC Kurtosis")]
    pub ic_kurtosis: f64,
    #[serde(rename = "dates")]
    pub n: usize,
}

impl IcSummary {
    /// Summarize an IC series. Missing dates are ignored.
    pub fn calculate(horizon: impl Into<String>, ics: &[f64]) -> Self {
        let values: Vec<f64> = ics.iter().copied().filter(|v| v.is_finite()).collect();
        let n = values.len();
        let nf = n as f64;

        let ic_mean = if n > 0 {
            values.iter().sum::<f64>() / nf
        } else {
            f64::NAN
        };

        let ic_std = if n > 1 {
            let var = values.iter().map(|v| (v - ic_mean).powi(2)).sum::<f64>() / (nf - 1.0);
            var.sqrt()
        } else {
            f64::NAN
        };

        let risk_adjusted_ic = ic_mean / ic_std;

        // One-sample t-test against zero
        let t_stat = ic_mean / (ic_std / nf.sqrt());
        let p_value = if n > 1 && t_stat.is_finite() {
            StudentsT::new(0.0, 1.0, nf - 1.0)
                .map(|dist| 2.0 * (1.0 - dist.cdf(t_stat.abs())))
                .unwrap_or(f64::NAN)
        } else {
            f64::NAN
        };

        // Population (biased) moments
        let (ic_skew, ic_kurtosis) = if n > 0 {
            let m2 = values.iter().map(|v| (v - ic_mean).powi(2)).sum::<f64>() / nf;
            let m3 = values.iter().map(|v| (v - ic_mean).powi(3)).sum::<f64>() / nf;
            let m4 = values.iter().map(|v| (v - ic_mean).powi(4)).sum::<f64>() / nf;
            if m2 > 0.0 {
                (m3 / m2.powf(1.5), m4 / (m2 * m2) - 3.0)
            } else {
                (f64::NAN, f64::NAN)
            }
        } else {
            (f64::NAN, f64::NAN)
        };

        Self {
            horizon: horizon.into(),
            ic_mean,
            ic_std,
            risk_adjusted_ic,
            t_stat,
            p_value,
            ic_skew,
            ic_kurtosis,
            n,
        }
    }

    /// One summary per horizon of an IC table, labelled `1d`, `5d`, ...
    pub fn from_table(table: &IcTable) -> Vec<IcSummary> {
        crate::forward::horizon_labels(&table.periods)
            .into_iter()
            .enumerate()
            .map(|(k, label)| IcSummary::calculate(label, &table.column(k)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_basic_moments() {
        let s = IcSummary::calculate("1d", &[0.1, 0.2, 0.3, f64::NAN]);
        assert_eq!(s.n, 3);
        assert!((s.ic_mean - 0.2).abs() < 1e-12);
        assert!((s.ic_std - 0.1).abs() < 1e-12);
        assert!((s.risk_adjusted_ic - 2.0).abs() < 1e-9);
        assert!((s.t_stat - 2.0 * 3f64.sqrt()).abs() < 1e-9);
        assert!(s.ic_skew.abs() < 1e-9);
        assert!((s.ic_kurtosis + 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_p_value_two_sided() {
        // t = 2 * sqrt(3) with 2 degrees of freedom
        let s = IcSummary::calculate("5d", &[0.1, 0.2, 0.3]);
        assert!(s.p_value > 0.05 && s.p_value < 0.1, "p = {}", s.p_value);
        let flipped = IcSummary::calculate("5d", &[-0.1, -0.2, -0.3]);
        assert!((s.p_value - flipped.p_value).abs() < 1e-12);
    }

    #[test]
    fn test_too_few_dates() {
        let s = IcSummary::calculate("10d", &[0.4]);
        assert_eq!(s.n, 1);
        assert!((s.ic_mean - 0.4).abs() < 1e-12);
        assert!(s.ic_std.is_nan());
        assert!(s.p_value.is_nan());

        let empty = IcSummary::calculate("10d", &[]);
        assert_eq!(empty.n, 0);
        assert!(empty.ic_mean.is_nan());
    }
}
