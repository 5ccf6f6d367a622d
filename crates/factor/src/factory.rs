//! Single place that turns a compact factor expression into factor instances.
//!
//! Grammar: `kind[:param[:param]]`, where each param may be a
//! comma-separated list to sweep over (`momentum:10,30,60`,
//! `roc:6,12:6,12`). Omitted params take the kind's default window.

use quant_core::types::Interval;

use crate::factors::{
    AbsRetNight, MomentumFactor, ROCSpread, Volatility, WilliamsLowerShadow, WilliamsUpperShadow,
    CVILLIQ, VPT,
};
use crate::template::FactorTemplate;

/// Known factor kinds for listing/validation.
pub const FACTOR_NAMES: &[&str] = &[
    "momentum",
    "volatility",
    "roc",
    "cvilliq",
    "vpt",
    "abs_ret_overnight",
    "william_upper_shadow",
    "william_lower_shadow",
];

const DEFAULT_WINDOW: usize = 20;

/// Create exactly one factor. A sweeping expression is rejected here; use [`create_factors`].
pub fn create_factor(expr: &str, frequency: Interval) -> Result<FactorTemplate, String> {
    let mut factors = create_factors(expr, frequency)?;
    if factors.len() != 1 {
        return Err(format!(
            "Factor expression '{}' expands to {} factors, expected one",
            expr,
            factors.len()
        ));
    }
    factors.pop().ok_or_else(|| format!("Factor expression '{}' is empty", expr))
}

/// Create every factor a (possibly sweeping) expression describes, in sweep order.
pub fn create_factors(expr: &str, frequency: Interval) -> Result<Vec<FactorTemplate>, String> {
    let mut parts = expr.trim().split(':');
    let kind = parts.next().unwrap_or_default().trim();
    let params = parts.map(parse_param_list).collect::<Result<Vec<_>, _>>()?;

    let windows = |idx: usize, default: usize| -> Vec<usize> {
        params.get(idx).cloned().unwrap_or_else(|| vec![default])
    };
    let expect_params = |max: usize| -> Result<(), String> {
        if params.len() > max {
            Err(format!("Factor '{}' takes at most {} parameter(s)", kind, max))
        } else {
            Ok(())
        }
    };

    let factors: Vec<FactorTemplate> = match kind {
        "momentum" | "MomentumFactor" => {
            expect_params(1)?;
            windows(0, DEFAULT_WINDOW)
                .into_iter()
                .map(|w| FactorTemplate::new(MomentumFactor::new(frequency, w)))
                .collect()
        }
        "volatility" | "Volatility" => {
            expect_params(1)?;
            windows(0, DEFAULT_WINDOW)
                .into_iter()
                .map(|w| FactorTemplate::new(Volatility::new(frequency, w)))
                .collect()
        }
        "roc" | "ROCSpread" => {
            expect_params(2)?;
            let lookbacks = windows(0, ROCSpread::DEFAULT_LOOKBACK);
            let ma_windows = windows(1, ROCSpread::DEFAULT_MA_WINDOW);
            lookbacks
                .iter()
                .flat_map(|&n| {
                    ma_windows
                        .iter()
                        .map(move |&m| FactorTemplate::new(ROCSpread::new(frequency, n, m)))
                })
                .collect()
        }
        "cvilliq" | "CVILLIQ" => {
            expect_params(1)?;
            windows(0, CVILLIQ::DEFAULT_WINDOW)
                .into_iter()
                .map(|w| FactorTemplate::new(CVILLIQ::new(frequency, w)))
                .collect()
        }
        "vpt" | "VPT" => {
            expect_params(0)?;
            vec![FactorTemplate::new(VPT::new())]
        }
        "abs_ret_overnight" | "AbsRetNight" => {
            expect_params(1)?;
            windows(0, DEFAULT_WINDOW)
                .into_iter()
                .map(|w| FactorTemplate::new(AbsRetNight::new(frequency, w)))
                .collect()
        }
        "william_upper_shadow" | "WilliamsUpperShadow" => {
            expect_params(1)?;
            windows(0, DEFAULT_WINDOW)
                .into_iter()
                .map(|w| FactorTemplate::new(WilliamsUpperShadow::new(frequency, w)))
                .collect()
        }
        "william_lower_shadow" | "WilliamsLowerShadow" => {
            expect_params(1)?;
            windows(0, DEFAULT_WINDOW)
                .into_iter()
                .map(|w| FactorTemplate::new(WilliamsLowerShadow::new(frequency, w)))
                .collect()
        }
        _ => {
            return Err(format!(
                "Unknown factor: '{}'. Available: {}",
                kind,
                FACTOR_NAMES.join(", ")
            ))
        }
    };
    Ok(factors)
}

fn parse_param_list(raw: &str) -> Result<Vec<usize>, String> {
    raw.split(',')
        .map(|p| {
            let p = p.trim();
            match p.parse::<usize>() {
                Ok(0) | Err(_) => Err(format!("Invalid window '{}': expected a positive integer", p)),
                Ok(n) => Ok(n),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_all_factors() {
        for name in FACTOR_NAMES {
            let result = create_factor(name, Interval::Daily);
            assert!(result.is_ok(), "Failed to create factor: {}", name);
        }
    }

    #[test]
    fn create_with_alias_and_params() {
        assert_eq!(create_factor("MomentumFactor:10", Interval::Daily).unwrap().name(), "momentum_10d");
        assert_eq!(create_factor("roc", Interval::Daily).unwrap().name(), "ROC_12n_6m");
        assert_eq!(create_factor("cvilliq", Interval::Daily).unwrap().name(), "CVILLIQ_20d");
        assert_eq!(create_factor("VPT", Interval::Daily).unwrap().name(), "VPT");
    }

    #[test]
    fn sweep_expands_in_order() {
        let names: Vec<String> = create_factors("roc:6,12:6,12", Interval::Daily)
            .unwrap()
            .iter()
            .map(|f| f.name().to_string())
            .collect();
        assert_eq!(names, vec!["ROC_6n_6m", "ROC_6n_12m", "ROC_12n_6m", "ROC_12n_12m"]);
        assert!(create_factor("momentum:10,30", Interval::Daily).is_err());
    }

    #[test]
    fn invalid_expressions_error() {
        let result = create_factor("nonexistent", Interval::Daily);
        assert!(result.unwrap_err().contains("Unknown factor"));
        assert!(create_factor("momentum:0", Interval::Daily).is_err());
        assert!(create_factor("momentum:ten", Interval::Daily).is_err());
        assert!(create_factor("vpt:5", Interval::Daily).is_err());
    }
}
