use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use quant_core::error::{QuantError, Result};
use quant_core::models::Bar;
use quant_core::traits::BarSource;
use quant_core::types::{Exchange, Interval};
use quant_core::utils::parse_datetime;

/// HTTP client for an AKTools server exposing akshare endpoints.
pub struct AkshareClient {
    client: Client,
    base_url: String,
    adjust: String,
}

#[derive(Debug, Deserialize)]
struct AkDailyRecord {
    #[serde(alias = "日期", alias = "date")]
    pub date: String,
    #[serde(alias = "开盘", alias = "open")]
    pub open: f64,
    #[serde(alias = "最高", alias = "high")]
    pub high: f64,
    #[serde(alias = "最低", alias = "low")]
    pub low: f64,
    #[serde(alias = "收盘", alias = "close")]
    pub close: f64,
    #[serde(alias = "成交量", alias = "volume")]
    pub volume: f64,
    /// Traded value. The endpoint's own `turnover` column is the turnover rate and is ignored.
    #[serde(alias = "成交额", alias = "amount", default)]
    pub amount: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct AkCodeRecord {
    #[serde(alias = "代码", alias = "code")]
    pub code: String,
}

impl AkshareClient {
    pub fn new(base_url: &str, adjust: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            adjust: adjust.to_string(),
        }
    }

    pub async fn fetch_daily(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Bar>> {
        let code = Exchange::strip_prefix(symbol);
        let exchange = Exchange::from_symbol(symbol);
        let url = format!(
            "{}/api/public/stock_zh_a_daily?symbol={}{}&start_date={}&end_date={}&adjust={}",
            self.base_url,
            exchange.prefix(),
            code,
            start.format("%Y%m%d"),
            end.format("%Y%m%d"),
            self.adjust
        );

        debug!("AKShare daily request: {}", url);

        let resp = self.client.get(&url).send().await?.error_for_status()?;
        let records: Vec<AkDailyRecord> = resp.json().await?;
        daily_records_to_bars(symbol, records)
    }

    pub async fn fetch_stock_codes(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/public/stock_info_a_code_name", self.base_url);

        debug!("AKShare stock list request: {}", url);

        let resp = self.client.get(&url).send().await?.error_for_status()?;
        let records: Vec<AkCodeRecord> = resp.json().await?;
        Ok(records.into_iter().map(|r| r.code).collect())
    }
}

fn daily_records_to_bars(symbol: &str, records: Vec<AkDailyRecord>) -> Result<Vec<Bar>> {
    let code = Exchange::strip_prefix(symbol);
    let exchange = Exchange::from_symbol(symbol);
    records
        .into_iter()
        .map(|r| {
            let datetime = parse_datetime(&r.date).ok_or_else(|| {
                QuantError::DataError(format!("Failed to parse AKShare date '{}'", r.date))
            })?;
            Ok(Bar {
                symbol: code.to_string(),
                exchange: exchange.prefix().to_string(),
                interval: Interval::Daily,
                datetime,
                open_price: r.open,
                high_price: r.high,
                low_price: r.low,
                close_price: r.close,
                volume: r.volume,
                turnover: r.amount.unwrap_or(f64::NAN),
            })
        })
        .collect()
}

#[async_trait]
impl BarSource for AkshareClient {
    async fn fetch_bars(
        &self,
        symbol: &str,
        interval: Interval,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>> {
        // The daily endpoint is the only one that serves adjusted history.
        // An empty history is returned as-is; callers decide whether that is a failure.
        if interval != Interval::Daily {
            return Err(QuantError::ExternalSourceFailure(format!(
                "AKShare source only serves daily bars, got interval '{}'",
                interval
            )));
        }
        self.fetch_daily(symbol, start, end)
            .await
            .map_err(|e| QuantError::ExternalSourceFailure(format!("{}: {}", symbol, e)))
    }

    async fn fetch_symbols(&self) -> Result<Vec<String>> {
        let codes = self
            .fetch_stock_codes()
            .await
            .map_err(|e| QuantError::ExternalSourceFailure(e.to_string()))?;
        if codes.is_empty() {
            return Err(QuantError::ExternalSourceFailure("Empty A-share symbol list".into()));
        }
        Ok(codes)
    }
}
