use std::path::Path;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use chrono_tz::Tz;
use tracing::{info, warn};

use quant_config::ResearchConfig;
use quant_core::error::{QuantError, Result};
use quant_core::models::BarTable;
use quant_core::types::{BarField, Interval, Market};
use quant_data::{load_bar_table_from_csv, ColumnMapping, DataHandler};
use quant_factor::{BarMatrix, FactorTemplate, MatrixCache, MatrixProvider};

use crate::forward::{clean_factor_and_forward_returns, ForwardReturns};
use crate::ic::{CrossSectionalIc, IcEstimator, IcMethod};
use crate::metrics::IcSummary;
use crate::report::{FactorReport, ReportSink};
use crate::returns::QuantileReturns;

/// Result of analysing one registered factor.
#[derive(Debug, Clone)]
pub enum FactorOutcome {
    Completed(FactorReport),
    Failed { name: String, reason: String },
}

impl FactorOutcome {
    pub fn name(&self) -> &str {
        match self {
            FactorOutcome::Completed(report) => &report.name,
            FactorOutcome::Failed { name, .. } => name,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, FactorOutcome::Completed(_))
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisSummary {
    pub report_name: String,
    pub outcomes: Vec<FactorOutcome>,
}

impl AnalysisSummary {
    pub fn completed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_completed()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.completed()
    }

    pub fn reports(&self) -> impl Iterator<Item = &FactorReport> {
        self.outcomes.iter().filter_map(|o| match o {
            FactorOutcome::Completed(report) => Some(report),
            FactorOutcome::Failed { .. } => None,
        })
    }
}

/// Research session: one loaded bar table, its matrix cache, and the
/// factors queued for analysis.
pub struct Environment {
    config: ResearchConfig,
    market: Market,
    tz: Tz,
    ic_estimator: Box<dyn IcEstimator>,
    cache: Option<MatrixCache>,
    factors: Vec<FactorTemplate>,
}

impl Environment {
    pub fn new(config: ResearchConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| QuantError::ConfigError(e.to_string()))?;
        let market: Market = config.market.parse()?;
        let tz: Tz = config
            .timezone
            .parse()
            .map_err(|e| QuantError::ConfigError(format!("Invalid timezone '{}': {}", config.timezone, e)))?;
        let method: IcMethod = config.ic_method.parse()?;
        Ok(Self {
            config,
            market,
            tz,
            ic_estimator: Box::new(CrossSectionalIc::new(method)),
            cache: None,
            factors: Vec::new(),
        })
    }

    /// Replace the IC estimator chosen from the config.
    pub fn with_ic_estimator(mut self, estimator: Box<dyn IcEstimator>) -> Self {
        self.ic_estimator = estimator;
        self
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    pub fn market(&self) -> Market {
        self.market
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    // ── Loading ─────────────────────────────────────────────────────

    /// Load a bar table, replacing any previously loaded one.
    pub fn load_bar_table(&mut self, table: BarTable) -> Result<()> {
        if table.market != self.market {
            return Err(QuantError::DataError(format!(
                "Bar table market {} does not match environment market {}",
                table.market, self.market
            )));
        }
        let summary = table.summary();
        self.cache = Some(MatrixCache::new(table, self.tz)?);
        info!("Bar data loaded: {}", summary);
        Ok(())
    }

    pub fn load_bar_data_from_csv(&mut self, path: impl AsRef<Path>, mapping: &ColumnMapping) -> Result<()> {
        let table = load_bar_table_from_csv(path, mapping, self.market)?;
        self.load_bar_table(table)
    }

    pub fn load_bar_data_from_store(
        &mut self,
        handler: &DataHandler,
        symbols: &[String],
        interval: Interval,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<()> {
        let table = handler.get_bar_table(symbols, interval, start, end)?;
        self.load_bar_table(table)
    }

    pub fn is_loaded(&self) -> bool {
        self.cache.is_some()
    }

    fn cache(&self) -> Result<&MatrixCache> {
        self.cache.as_ref().ok_or(QuantError::NotLoaded)
    }

    pub fn bar_table(&self) -> Result<&BarTable> {
        Ok(self.cache()?.table())
    }

    // ── Matrices ────────────────────────────────────────────────────

    pub fn close(&self) -> Result<Arc<BarMatrix>> {
        self.matrix(BarField::Close)
    }

    pub fn open(&self) -> Result<Arc<BarMatrix>> {
        self.matrix(BarField::Open)
    }

    pub fn high(&self) -> Result<Arc<BarMatrix>> {
        self.matrix(BarField::High)
    }

    pub fn low(&self) -> Result<Arc<BarMatrix>> {
        self.matrix(BarField::Low)
    }

    pub fn volume(&self) -> Result<Arc<BarMatrix>> {
        self.matrix(BarField::Volume)
    }

    pub fn log_return(&self) -> Result<Arc<BarMatrix>> {
        self.matrix(BarField::LogReturn)
    }

    // ── Factors ─────────────────────────────────────────────────────

    /// Queue a factor. Order of registration is the order of analysis.
    pub fn load_factor(&mut self, factor: FactorTemplate) {
        info!("Factor registered: {}", factor.name());
        self.factors.push(factor);
    }

    pub fn factors(&self) -> &[FactorTemplate] {
        &self.factors
    }

    /// Evaluate every registered factor and hand the results to `sink`.
    ///
    /// A factor that fails is recorded in the summary and the run moves on.
    /// The run itself fails only when no bar table is loaded, no factor is
    /// registered, or the sink cannot be prepared.
    pub fn factor_analysis(&self, report_name: Option<&str>, sink: &dyn ReportSink) -> Result<AnalysisSummary> {
        let cache = self.cache()?;
        if self.factors.is_empty() {
            return Err(QuantError::NoFactors);
        }

        let report_name = match report_name {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => Local::now().format("analysis_at_%Y%m%d_%H%M_%S").to_string(),
        };
        sink.begin(&report_name)?;

        let forward = ForwardReturns::from_open(&cache.matrix_for(BarField::Open), &self.config.periods)?;

        let total = self.factors.len();
        let mut outcomes = Vec::with_capacity(total);
        for (i, factor) in self.factors.iter().enumerate() {
            info!("Analysing {} ({}/{})", factor.name(), i + 1, total);
            let outcome = match self.analyse_factor(factor, &forward) {
                Ok(report) => match sink.write_factor(&report_name, &report) {
                    Ok(()) => FactorOutcome::Completed(report),
                    Err(e) => FactorOutcome::Failed {
                        name: factor.name().to_string(),
                        reason: e.to_string(),
                    },
                },
                Err(e) => FactorOutcome::Failed {
                    name: factor.name().to_string(),
                    reason: e.to_string(),
                },
            };
            if let FactorOutcome::Failed { name, reason } = &outcome {
                warn!("Factor {} failed: {}", name, reason);
            }
            outcomes.push(outcome);
        }

        let summary = AnalysisSummary { report_name, outcomes };
        info!(
            "Analysis {} finished: {} completed, {} failed",
            summary.report_name,
            summary.completed(),
            summary.failed()
        );
        Ok(summary)
    }

    fn analyse_factor(&self, factor: &FactorTemplate, forward: &ForwardReturns) -> Result<FactorReport> {
        let series = factor.get_factor_series(self)?;
        let clean = clean_factor_and_forward_returns(&series, forward, self.config.quantiles);
        if clean.is_empty() {
            return Err(QuantError::evaluation(
                factor.name(),
                "no observations left after joining with forward returns",
            ));
        }

        let ic_table = self.ic_estimator.information_coefficient(&clean);
        Ok(FactorReport {
            name: factor.name().to_string(),
            observations: clean.len(),
            dropped_fraction: clean.dropped_fraction(),
            ic_summary: IcSummary::from_table(&ic_table),
            returns: QuantileReturns::calculate(&clean),
        })
    }
}

impl MatrixProvider for Environment {
    fn matrix(&self, field: BarField) -> Result<Arc<BarMatrix>> {
        Ok(self.cache()?.matrix_for(field))
    }
}
