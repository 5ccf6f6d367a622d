use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use quant_core::error::Result;

use crate::metrics::IcSummary;
use crate::returns::QuantileReturns;

/// Everything the analysis produced for one factor.
#[derive(Debug, Clone, Serialize)]
pub struct FactorReport {
    pub name: String,
    pub observations: usize,
    pub dropped_fraction: f64,
    pub ic_summary: Vec<IcSummary>,
    pub returns: QuantileReturns,
}

/// Destination for analysis output.
pub trait ReportSink: Send + Sync {
    /// Called once per analysis run before any factor is written.
    fn begin(&self, report_name: &str) -> Result<()>;

    fn write_factor(&self, report_name: &str, report: &FactorReport) -> Result<()>;
}

/// Writes `ic_{factor}.csv` and `return_{factor}.csv` under `<root>/<report_name>/`.
#[derive(Debug, Clone)]
pub struct CsvReportSink {
    root: PathBuf,
}

impl CsvReportSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn report_dir(&self, report_name: &str) -> PathBuf {
        self.root.join(report_name)
    }

    fn write_ic(path: &Path, summary: &[IcSummary]) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for row in summary {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn write_returns(path: &Path, returns: &QuantileReturns) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        let rows = returns.rows();
        let mut header = vec!["quantile".to_string(), "count".to_string()];
        if let Some(first) = rows.first() {
            header.extend(first.returns.iter().map(|(label, _)| label.clone()));
        }
        writer.write_record(&header)?;
        for row in rows {
            let mut record = vec![row.quantile, row.count.to_string()];
            record.extend(row.returns.iter().map(|(_, v)| v.to_string()));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl ReportSink for CsvReportSink {
    fn begin(&self, report_name: &str) -> Result<()> {
        let dir = self.report_dir(report_name);
        fs::create_dir_all(&dir)?;
        info!("Writing reports to {}", dir.display());
        Ok(())
    }

    fn write_factor(&self, report_name: &str, report: &FactorReport) -> Result<()> {
        let dir = self.report_dir(report_name);
        Self::write_ic(&dir.join(format!("ic_{}.csv", report.name)), &report.ic_summary)?;
        Self::write_returns(&dir.join(format!("return_{}.csv", report.name)), &report.returns)?;
        Ok(())
    }
}

/// Plain-text rendering of one factor's results for the terminal.
pub fn format_report(report: &FactorReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "╔══════════════════════════════════════════════════════════════════╗");
    let _ = writeln!(out, "║  Factor: {:<56}║", report.name);
    let _ = writeln!(
        out,
        "║  Observations: {:<10} Dropped: {:>6.2}%                       ║",
        report.observations,
        report.dropped_fraction * 100.0
    );
    let _ = writeln!(out, "╠══════════════════════════════════════════════════════════════════╣");
    let _ = writeln!(
        out,
        "║  {:<6}{:>9}{:>9}{:>9}{:>9}{:>9}{:>8}     ║",
        "period", "IC Mean", "IC Std", "IR", "t-stat", "p-value", "dates"
    );
    for s in &report.ic_summary {
        let _ = writeln!(
            out,
            "║  {:<6}{:>9.4}{:>9.4}{:>9.4}{:>9.3}{:>9.4}{:>8}     ║",
            s.horizon, s.ic_mean, s.ic_std, s.risk_adjusted_ic, s.t_stat, s.p_value, s.n
        );
    }
    let _ = writeln!(out, "╠══════════════════════════════════════════════════════════════════╣");
    for row in report.returns.rows() {
        let cells: Vec<String> = row
            .returns
            .iter()
            .map(|(label, v)| format!("{}={:>7.3}%", label, v * 100.0))
            .collect();
        let _ = writeln!(out, "║  Q {:<17}{:<46}║", row.quantile, cells.join("  "));
    }
    out.push_str("╚══════════════════════════════════════════════════════════════════╝");
    out
}
