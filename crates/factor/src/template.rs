use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::{debug, info};

use quant_core::error::Result;

use crate::cache::MatrixProvider;
use crate::matrix::BarMatrix;
use crate::series::FactorSeries;

/// A cross-sectional factor formula over bar matrices.
///
/// Implementations read inputs only through the provider and only look
/// backwards in time.
pub trait Factor: Send + Sync + fmt::Debug {
    /// Parameterized name, e.g. `momentum_10d`.
    fn name(&self) -> String;

    fn description(&self) -> &str;

    /// Raw factor values in matrix form, before stacking.
    fn factor_matrix(&self, data: &dyn MatrixProvider) -> Result<BarMatrix>;

    /// Raw long-form factor values (not standardized).
    fn calculate_factor(&self, data: &dyn MatrixProvider) -> Result<FactorSeries> {
        Ok(self.factor_matrix(data)?.stack())
    }
}

/// Wraps a factor formula with a write-once slot for its standardized series.
pub struct FactorTemplate {
    factor: Box<dyn Factor>,
    name: String,
    series: OnceLock<Arc<FactorSeries>>,
}

impl FactorTemplate {
    pub fn new(factor: impl Factor + 'static) -> Self {
        Self::from_boxed(Box::new(factor))
    }

    pub fn from_boxed(factor: Box<dyn Factor>) -> Self {
        let name = factor.name();
        Self {
            factor,
            name,
            series: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        self.factor.description()
    }

    pub fn factor(&self) -> &dyn Factor {
        self.factor.as_ref()
    }

    pub fn is_computed(&self) -> bool {
        self.series.get().is_some()
    }

    /// Standardized factor series, computed on the first call and returned
    /// unchanged afterwards. A failed computation leaves the slot empty.
    pub fn get_factor_series(&self, data: &dyn MatrixProvider) -> Result<Arc<FactorSeries>> {
        if let Some(series) = self.series.get() {
            debug!("Factor {} served from cache", self.name);
            return Ok(Arc::clone(series));
        }

        let raw = self.factor.calculate_factor(data)?;
        let standardized = Arc::new(raw.standardize());
        info!(
            "Factor {} computed: {} entries, {} with values",
            self.name,
            standardized.len(),
            standardized.count_finite()
        );
        // A concurrent caller may have won; keep whichever landed first.
        Ok(Arc::clone(self.series.get_or_init(|| standardized)))
    }
}

impl fmt::Debug for FactorTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactorTemplate")
            .field("name", &self.name)
            .field("computed", &self.is_computed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::test_util::matrix;
    use quant_core::error::QuantError;
    use quant_core::types::BarField;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves a close matrix whose values grow on every request.
    struct DriftingProvider {
        calls: AtomicUsize,
    }

    impl MatrixProvider for DriftingProvider {
        fn matrix(&self, _field: BarField) -> Result<Arc<BarMatrix>> {
            let k = self.calls.fetch_add(1, Ordering::SeqCst) as f64;
            Ok(Arc::new(matrix(&[
                vec![1.0 + k, 2.0],
                vec![3.0, 5.0 * (k + 1.0)],
                vec![4.0, 8.0],
            ])))
        }
    }

    struct FailingProvider;

    impl MatrixProvider for FailingProvider {
        fn matrix(&self, _field: BarField) -> Result<Arc<BarMatrix>> {
            Err(QuantError::NotLoaded)
        }
    }

    #[derive(Debug)]
    struct RawClose;

    impl Factor for RawClose {
        fn name(&self) -> String {
            "raw_close".into()
        }

        fn description(&self) -> &str {
            "close as is"
        }

        fn factor_matrix(&self, data: &dyn MatrixProvider) -> Result<BarMatrix> {
            Ok(data.matrix(BarField::Close)?.as_ref().clone())
        }
    }

    #[test]
    fn test_series_is_memoized() {
        let provider = DriftingProvider { calls: AtomicUsize::new(0) };
        let template = FactorTemplate::new(RawClose);
        let first = template.get_factor_series(&provider).unwrap();
        let second = template.get_factor_series(&provider).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_series_is_standardized_once() {
        let provider = DriftingProvider { calls: AtomicUsize::new(0) };
        let template = FactorTemplate::new(RawClose);
        let series = template.get_factor_series(&provider).unwrap();
        let (mean, std) = series.moments();
        assert!(mean.abs() < 1e-12);
        assert!((std - 1.0).abs() < 1e-12);

        let raw = RawClose.calculate_factor(&provider).unwrap();
        assert!((raw.moments().0 - mean).abs() > 1.0);
    }

    #[test]
    fn test_failure_is_not_cached() {
        let template = FactorTemplate::new(RawClose);
        assert!(template.get_factor_series(&FailingProvider).is_err());
        assert!(!template.is_computed());

        let provider = DriftingProvider { calls: AtomicUsize::new(0) };
        assert!(template.get_factor_series(&provider).is_ok());
        assert!(template.is_computed());
        assert_eq!(template.name(), "raw_close");
    }
}
