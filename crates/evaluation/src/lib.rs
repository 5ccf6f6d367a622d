pub mod environment;
pub mod forward;
pub mod ic;
pub mod metrics;
pub mod report;
pub mod returns;

pub use environment::{AnalysisSummary, Environment, FactorOutcome};
pub use forward::{clean_factor_and_forward_returns, CleanFactorData, ForwardReturns};
pub use ic::{CrossSectionalIc, IcEstimator, IcMethod, IcTable};
pub use metrics::IcSummary;
pub use report::{format_report, CsvReportSink, FactorReport, ReportSink};
pub use returns::QuantileReturns;
