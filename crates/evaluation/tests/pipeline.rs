use std::io::Write;

use chrono::NaiveDate;

use quant_config::ResearchConfig;
use quant_core::types::{Interval, Market};
use quant_core::models::{Bar, BarTable};
use quant_data::{BarStore, ColumnMapping, DataHandler};
use quant_evaluation::{CsvReportSink, Environment, FactorOutcome};
use quant_factor::{create_factor, create_factors, FACTOR_NAMES};

const SYMBOLS: [&str; 6] = ["000001", "000002", "300750", "600000", "600519", "688981"];
const DAYS: usize = 60;

fn price(j: usize, d: usize) -> (f64, f64, f64, f64, f64) {
    let (jf, df) = (j as f64, d as f64);
    let open = 10.0 + jf + 2.0 * (0.3 * df * (jf + 1.0) + jf).sin();
    let close = open * (1.0 + 0.01 * (0.7 * df + jf).sin());
    let high = open.max(close) + 0.1 + 0.05 * (0.5 * df + jf).sin().abs();
    let low = open.min(close) - 0.1 - 0.05 * (0.9 * df + jf).cos().abs();
    let volume = 10_000.0 + 500.0 * (1.3 * df + jf).sin() + 100.0 * jf;
    (open, high, low, close, volume)
}

fn date(d: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 3, 1).unwrap() + chrono::Duration::days(d as i64)
}

fn write_csv(path: &std::path::Path) {
    let mut file = std::fs::File::create(path).unwrap();
    // Vendor-style headers; no exchange or interval column.
    writeln!(file, "code,trade_date,open,high,low,close,vol").unwrap();
    for (j, symbol) in SYMBOLS.iter().enumerate() {
        for d in 0..DAYS {
            let (o, h, l, c, v) = price(j, d);
            writeln!(
                file,
                "{},{},{},{},{},{},{}",
                symbol,
                date(d).format("%Y-%m-%d"),
                o,
                h,
                l,
                c,
                v
            )
            .unwrap();
        }
    }
}

fn mapping() -> ColumnMapping {
    ColumnMapping {
        symbol: "code".into(),
        datetime: "trade_date".into(),
        open_price: "open".into(),
        high_price: "high".into(),
        low_price: "low".into(),
        close_price: "close".into(),
        volume: "vol".into(),
        ..Default::default()
    }
}

#[test]
fn csv_to_reports_for_every_factor() {
    let tmp = tempfile::tempdir().unwrap();
    let csv_path = tmp.path().join("ashare_bar_data.csv");
    write_csv(&csv_path);

    let config = ResearchConfig {
        report_dir: tmp.path().join("reports"),
        ..Default::default()
    };
    let mut env = Environment::new(config).unwrap();
    env.load_bar_data_from_csv(&csv_path, &mapping()).unwrap();

    let table = env.bar_table().unwrap();
    assert_eq!(table.len(), SYMBOLS.len() * DAYS);
    assert_eq!(table.symbols(), SYMBOLS.iter().map(|s| s.to_string()).collect::<Vec<_>>());

    for name in FACTOR_NAMES {
        env.load_factor(create_factor(name, Interval::Daily).unwrap());
    }

    let sink = CsvReportSink::new(env.config().report_dir.clone());
    let summary = env.factor_analysis(Some("nightly"), &sink).unwrap();
    assert_eq!(summary.outcomes.len(), FACTOR_NAMES.len());
    for outcome in &summary.outcomes {
        if let FactorOutcome::Failed { name, reason } = outcome {
            panic!("factor {} failed: {}", name, reason);
        }
    }

    let dir = tmp.path().join("reports").join("nightly");
    for report in summary.reports() {
        assert!(dir.join(format!("ic_{}.csv", report.name)).exists());
        assert!(dir.join(format!("return_{}.csv", report.name)).exists());
        let labels: Vec<&str> = report.ic_summary.iter().map(|s| s.horizon.as_str()).collect();
        assert_eq!(labels, vec!["1d", "5d", "10d"]);
        assert!(report.ic_summary.iter().all(|s| s.n > 0));
    }
    assert!(dir.join("ic_VPT.csv").exists());
    assert!(dir.join("ic_ROC_12n_6m.csv").exists());
}

#[test]
fn store_to_analysis_with_sweep() {
    let handler = DataHandler::new(Market::Ashare, BarStore::in_memory().unwrap());
    let bars: Vec<Bar> = SYMBOLS
        .iter()
        .enumerate()
        .flat_map(|(j, symbol)| {
            (0..DAYS).map(move |d| {
                let (o, h, l, c, v) = price(j, d);
                Bar {
                    symbol: symbol.to_string(),
                    exchange: quant_core::types::Exchange::from_symbol(symbol).prefix().to_string(),
                    interval: Interval::Daily,
                    datetime: date(d).and_hms_opt(0, 0, 0).unwrap(),
                    open_price: o,
                    high_price: h,
                    low_price: l,
                    close_price: c,
                    volume: v,
                    turnover: c * v,
                }
            })
        })
        .collect();
    handler.store().save_bars(&bars).unwrap();

    let tmp = tempfile::tempdir().unwrap();
    let mut env = Environment::new(ResearchConfig::default()).unwrap();
    env.load_bar_data_from_store(&handler, &["all".to_string()], Interval::Daily, date(0), date(DAYS))
        .unwrap();
    assert_eq!(env.close().unwrap().ncols(), SYMBOLS.len());

    for factor in create_factors("momentum:5,10,20", Interval::Daily).unwrap() {
        env.load_factor(factor);
    }
    let names: Vec<&str> = env.factors().iter().map(|f| f.name()).collect();
    assert_eq!(names, vec!["momentum_5d", "momentum_10d", "momentum_20d"]);

    let sink = CsvReportSink::new(tmp.path());
    let summary = env.factor_analysis(None, &sink).unwrap();
    assert_eq!(summary.completed(), 3);
    assert!(tmp.path().join(&summary.report_name).is_dir());

    // The series are memoized: a second run serves the same values.
    let first = env.factors()[0].get_factor_series(&env).unwrap();
    let second = env.factors()[0].get_factor_series(&env).unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
}

#[test]
fn duplicate_rows_fail_the_load() {
    let bar = Bar {
        symbol: "600000".into(),
        exchange: "sh".into(),
        interval: Interval::Daily,
        datetime: date(0).and_hms_opt(0, 0, 0).unwrap(),
        open_price: 1.0,
        high_price: 1.0,
        low_price: 1.0,
        close_price: 1.0,
        volume: 1.0,
        turnover: 1.0,
    };
    let mut env = Environment::new(ResearchConfig::default()).unwrap();
    let err = env
        .load_bar_table(BarTable::new(Market::Ashare, vec![bar.clone(), bar]))
        .unwrap_err();
    assert!(matches!(err, quant_core::QuantError::DuplicateBarKey { .. }));
    assert!(!env.is_loaded());
}
