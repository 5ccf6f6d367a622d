use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use quant_config::AppConfig;
use quant_core::types::{Interval, Market};
use quant_core::utils::parse_date_any;
use quant_data::{load_bar_table_from_csv, AkshareClient, BarStore, ColumnMapping, DataHandler, QueryStatus};
use quant_evaluation::{format_report, CsvReportSink, Environment, FactorOutcome};
use quant_factor::{create_factor, create_factors, FACTOR_NAMES};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quant", about = "Factor research for Chinese A-shares")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Market data operations
    Data {
        #[command(subcommand)]
        action: DataAction,
    },
    /// Factor research
    Factor {
        #[command(subcommand)]
        action: FactorAction,
    },
}

#[derive(Subcommand)]
enum DataAction {
    /// Download daily bars from the akshare service into the local store
    Sync {
        /// Comma-separated codes, or "all" for every listed A-share
        #[arg(short, long, default_value = "all")]
        symbols: String,
        /// Start date (YYYY-MM-DD or YYYYMMDD)
        #[arg(long)]
        start: String,
        /// End date, defaults to today
        #[arg(long)]
        end: Option<String>,
    },
    /// Import a bar CSV file into the local store
    Import {
        /// CSV file with one bar per row
        #[arg(short, long)]
        file: PathBuf,
        /// TOML file mapping canonical fields to the file's headers
        #[arg(long)]
        mapping: Option<PathBuf>,
    },
    /// Show what the local store holds
    List,
}

#[derive(Subcommand)]
enum FactorAction {
    /// List available factors
    List,
    /// Compute factors and write IC / return reports
    Analyze {
        /// Factor expression, repeatable (e.g. momentum:10,30 or roc:12:6)
        #[arg(short, long = "factor", required = true)]
        factors: Vec<String>,
        /// Load bars from this CSV instead of the store
        #[arg(long)]
        csv: Option<PathBuf>,
        /// TOML column mapping for --csv
        #[arg(long)]
        mapping: Option<PathBuf>,
        /// Store symbols (comma-separated or "all")
        #[arg(long, default_value = "all")]
        symbols: String,
        /// Store query start date
        #[arg(long)]
        start: Option<String>,
        /// Store query end date
        #[arg(long)]
        end: Option<String>,
        /// Report folder name under the report directory
        #[arg(long)]
        report_name: Option<String>,
        /// Forward-return horizons, comma-separated (overrides config)
        #[arg(long)]
        periods: Option<String>,
        /// IC method: rank or pearson (overrides config)
        #[arg(long)]
        ic_method: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Data { action } => match action {
            DataAction::Sync { symbols, start, end } => {
                cmd_data_sync(&config, &symbols, &start, end.as_deref()).await?;
            }
            DataAction::Import { file, mapping } => {
                cmd_data_import(&config, &file, mapping.as_deref())?;
            }
            DataAction::List => {
                cmd_data_list(&config)?;
            }
        },
        Commands::Factor { action } => match action {
            FactorAction::List => cmd_factor_list(&config)?,
            FactorAction::Analyze {
                factors,
                csv,
                mapping,
                symbols,
                start,
                end,
                report_name,
                periods,
                ic_method,
            } => {
                let mut config = config;
                if let Some(periods) = periods {
                    config.research.periods = parse_periods(&periods)?;
                }
                if let Some(method) = ic_method {
                    config.research.ic_method = method;
                }
                let source = match csv {
                    Some(path) => BarInput::Csv { path, mapping },
                    None => BarInput::Store {
                        symbols: split_symbols(&symbols),
                        start: start.as_deref().map(parse_cli_date).transpose()?,
                        end: end.as_deref().map(parse_cli_date).transpose()?,
                    },
                };
                cmd_factor_analyze(config, &factors, source, report_name.as_deref())?;
            }
        },
    }

    Ok(())
}

/// Try CWD first, then relative to the executable, then the project root.
/// A missing file falls back to built-in defaults.
fn load_config(path: &str) -> anyhow::Result<AppConfig> {
    let mut candidates = vec![PathBuf::from(path)];
    if let Ok(exe) = std::env::current_exe() {
        if let Some(exe_dir) = exe.parent() {
            candidates.push(exe_dir.join(path));
            // target/release/ -> project root
            if let Some(root) = exe_dir.parent().and_then(|p| p.parent()) {
                candidates.push(root.join(path));
            }
        }
    }
    match candidates.into_iter().find(|p| p.exists()) {
        Some(found) => {
            info!("Using config {}", found.display());
            Ok(AppConfig::from_file(&found)?)
        }
        None => {
            info!("Config {} not found, using defaults", path);
            Ok(AppConfig::default())
        }
    }
}

fn parse_cli_date(s: &str) -> anyhow::Result<NaiveDate> {
    parse_date_any(s).ok_or_else(|| anyhow!("Invalid date '{}': expected YYYY-MM-DD or YYYYMMDD", s))
}

fn parse_periods(s: &str) -> anyhow::Result<Vec<usize>> {
    s.split(',')
        .map(|p| {
            p.trim()
                .parse::<usize>()
                .with_context(|| format!("Invalid period '{}'", p))
        })
        .collect()
}

fn split_symbols(s: &str) -> Vec<String> {
    s.split(',')
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

fn load_mapping(path: Option<&Path>) -> anyhow::Result<ColumnMapping> {
    match path {
        Some(p) => {
            let content = std::fs::read_to_string(p)
                .with_context(|| format!("Failed to read mapping {}", p.display()))?;
            Ok(toml::from_str(&content).with_context(|| format!("Invalid mapping {}", p.display()))?)
        }
        None => Ok(ColumnMapping::default()),
    }
}

fn open_handler(config: &AppConfig) -> anyhow::Result<DataHandler> {
    let market: Market = config.research.market.parse()?;
    let store = BarStore::open(&config.storage.path)?;
    Ok(DataHandler::new(market, store))
}

// ── Data Commands ───────────────────────────────────────────────────

async fn cmd_data_sync(config: &AppConfig, symbols: &str, start: &str, end: Option<&str>) -> anyhow::Result<()> {
    let start = parse_cli_date(start)?;
    let end = match end {
        Some(e) => parse_cli_date(e)?,
        None => Local::now().date_naive(),
    };
    let handler = open_handler(config)?;
    let client = AkshareClient::new(&config.akshare.base_url, &config.akshare.adjust);

    println!("📦 Syncing daily bars {} → {}", start, end);
    let symbols = handler.resolve_symbols(&client, &split_symbols(symbols)).await?;
    println!("  {} symbols queued", symbols.len());

    let pause = Duration::from_millis(config.akshare.request_interval_ms);
    let report = handler
        .download_bars_to_store(&client, &symbols, start, end, pause)
        .await;

    println!();
    println!("✅ Sync complete: {} bars stored", report.bars_saved);
    println!("  Succeeded: {}", report.count(QueryStatus::Succeeded));
    println!("  Empty:     {}", report.count(QueryStatus::Empty));
    println!("  Failed:    {}", report.count(QueryStatus::Failed));
    for (symbol, status) in &report.tasks {
        if *status == Some(QueryStatus::Failed) {
            println!("    ❌ {}", symbol);
        }
    }
    Ok(())
}

fn cmd_data_import(config: &AppConfig, file: &Path, mapping: Option<&Path>) -> anyhow::Result<()> {
    let mapping = load_mapping(mapping)?;
    let handler = open_handler(config)?;
    let table = load_bar_table_from_csv(file, &mapping, config.research.market.parse()?)?;
    let saved = handler.store().save_bars(&table.bars)?;
    println!("✅ Imported {} of {} bars from {}", saved, table.len(), file.display());
    println!("  {}", table.summary());
    Ok(())
}

fn cmd_data_list(config: &AppConfig) -> anyhow::Result<()> {
    let handler = open_handler(config)?;
    let symbols = handler.store().symbols()?;
    println!("📋 Store {}", config.storage.path.display());
    println!("  Bars:    {}", handler.store().count()?);
    println!("  Symbols: {}", symbols.len());
    for chunk in symbols.chunks(10) {
        println!("    {}", chunk.join(" "));
    }
    Ok(())
}

// ── Factor Commands ─────────────────────────────────────────────────

fn cmd_factor_list(config: &AppConfig) -> anyhow::Result<()> {
    let frequency: Interval = config.research.frequency.parse()?;
    println!("📊 Available Factors:");
    println!();
    println!("  {:<22} {:<26} {}", "Kind", "Default instance", "Description");
    println!("  {}", "-".repeat(90));
    for kind in FACTOR_NAMES {
        let factor = create_factor(kind, frequency).map_err(|e| anyhow!(e))?;
        println!("  {:<22} {:<26} {}", kind, factor.name(), factor.description());
    }
    Ok(())
}

enum BarInput {
    Csv {
        path: PathBuf,
        mapping: Option<PathBuf>,
    },
    Store {
        symbols: Vec<String>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
}

fn cmd_factor_analyze(
    config: AppConfig,
    exprs: &[String],
    input: BarInput,
    report_name: Option<&str>,
) -> anyhow::Result<()> {
    let frequency: Interval = config.research.frequency.parse()?;
    let sink = CsvReportSink::new(config.research.report_dir.clone());
    let mut env = Environment::new(config.research.clone())?;

    match input {
        BarInput::Csv { path, mapping } => {
            let mapping = load_mapping(mapping.as_deref())?;
            env.load_bar_data_from_csv(&path, &mapping)?;
        }
        BarInput::Store { symbols, start, end } => {
            let handler = open_handler(&config)?;
            let start = start
                .or_else(|| NaiveDate::from_ymd_opt(1990, 1, 1))
                .unwrap_or(NaiveDate::MIN);
            let end = end.unwrap_or_else(|| Local::now().date_naive());
            env.load_bar_data_from_store(&handler, &symbols, frequency, start, end)?;
        }
    }

    for expr in exprs {
        for factor in create_factors(expr, frequency).map_err(|e| anyhow!(e))? {
            env.load_factor(factor);
        }
    }

    let summary = env.factor_analysis(report_name, &sink)?;
    for report in summary.reports() {
        println!("{}", format_report(report));
        println!();
    }
    for outcome in &summary.outcomes {
        if let FactorOutcome::Failed { name, reason } = outcome {
            println!("❌ {}: {}", name, reason);
        }
    }
    println!(
        "✅ {} of {} factors analysed, reports in {}",
        summary.completed(),
        summary.outcomes.len(),
        sink.report_dir(&summary.report_name).display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_analyze() {
        let cli = Cli::try_parse_from([
            "quant",
            "factor",
            "analyze",
            "-f",
            "momentum:10,30",
            "-f",
            "vpt",
            "--csv",
            "bars.csv",
            "--periods",
            "1,5",
        ])
        .unwrap();
        match cli.command {
            Commands::Factor {
                action: FactorAction::Analyze { factors, csv, periods, .. },
            } => {
                assert_eq!(factors, vec!["momentum:10,30", "vpt"]);
                assert_eq!(csv, Some(PathBuf::from("bars.csv")));
                assert_eq!(parse_periods(&periods.unwrap()).unwrap(), vec![1, 5]);
            }
            _ => panic!("expected factor analyze"),
        }
    }

    #[test]
    fn test_helpers() {
        assert_eq!(split_symbols("600000, 000001,,"), vec!["600000", "000001"]);
        assert!(parse_periods("1,x").is_err());
        assert_eq!(parse_cli_date("20240105").unwrap(), NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
    }
}
