use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub research: ResearchConfig,
    #[serde(default)]
    pub akshare: AkshareConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Settings for matrix construction and factor evaluation.
#[derive(Debug, Clone, Deserialize)]
pub struct ResearchConfig {
    #[serde(default = "default_market")]
    pub market: String,
    /// IANA timezone applied to every matrix row index.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Parent directory for per-run report folders.
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,
    /// Forward-return horizons, in bars.
    #[serde(default = "default_periods")]
    pub periods: Vec<usize>,
    /// "rank" (Spearman) or "pearson".
    #[serde(default = "default_ic_method")]
    pub ic_method: String,
    /// Number of per-date factor quantiles used by the return analysis.
    #[serde(default = "default_quantiles")]
    pub quantiles: usize,
    /// Frequency suffix used in factor names, e.g. "d" in `momentum_10d`.
    #[serde(default = "default_frequency")]
    pub frequency: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AkshareConfig {
    #[serde(default = "default_akshare_url")]
    pub base_url: String,
    /// Price adjustment: "hfq", "qfq" or "" for raw prices.
    #[serde(default = "default_adjust")]
    pub adjust: String,
    /// Pause between per-symbol requests to stay under the provider's rate limit.
    #[serde(default = "default_request_interval_ms")]
    pub request_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

fn default_market() -> String { "ashare".into() }
fn default_timezone() -> String { "Asia/Shanghai".into() }
fn default_report_dir() -> PathBuf { PathBuf::from("reports") }
fn default_periods() -> Vec<usize> { vec![1, 5, 10] }
fn default_ic_method() -> String { "rank".into() }
fn default_quantiles() -> usize { 5 }
fn default_frequency() -> String { "d".into() }
fn default_akshare_url() -> String { "http://127.0.0.1:8080".into() }
fn default_adjust() -> String { "hfq".into() }
fn default_request_interval_ms() -> u64 { 5_000 }
fn default_storage_path() -> PathBuf { PathBuf::from("data/ashare_bars.sqlite") }

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            market: default_market(),
            timezone: default_timezone(),
            report_dir: default_report_dir(),
            periods: default_periods(),
            ic_method: default_ic_method(),
            quantiles: default_quantiles(),
            frequency: default_frequency(),
        }
    }
}

impl Default for AkshareConfig {
    fn default() -> Self {
        Self {
            base_url: default_akshare_url(),
            adjust: default_adjust(),
            request_interval_ms: default_request_interval_ms(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { path: default_storage_path() }
    }
}

impl ResearchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.periods.is_empty() || self.periods.contains(&0) {
            return Err(ConfigError::Invalid(
                "research.periods must be non-empty and positive".into(),
            ));
        }
        if self.quantiles < 2 {
            return Err(ConfigError::Invalid("research.quantiles must be at least 2".into()));
        }
        Ok(())
    }
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.research.validate()?;
        Ok(config)
    }

    pub fn from_default() -> Result<Self, ConfigError> {
        Self::from_file("config/default.toml")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Invalid config: {0}")]
    Invalid(String),
}
