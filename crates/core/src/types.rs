use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::QuantError;

/// Market a research environment is bound to. Only the A-share market is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    Ashare,
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Market::Ashare => write!(f, "ashare"),
        }
    }
}

impl FromStr for Market {
    type Err = QuantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ashare" => Ok(Market::Ashare),
            other => Err(QuantError::ConfigError(format!("Unsupported market: {}", other))),
        }
    }
}

/// A-share exchange, identified by the short prefix used in symbols (`sh600000`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exchange {
    /// Shanghai Stock Exchange
    Sse,
    /// Shenzhen Stock Exchange
    Szse,
    /// Beijing Stock Exchange
    Bse,
}

impl Exchange {
    /// Detect exchange from a symbol.
    /// - `sh`/`sz`/`bj` prefix (any case) wins
    /// - Otherwise the leading digit of the code: 6/9 → SH, 4/8 → BJ, everything else → SZ
    pub fn from_symbol(symbol: &str) -> Self {
        let lower = symbol.trim().to_ascii_lowercase();
        if lower.starts_with("sh") {
            return Exchange::Sse;
        }
        if lower.starts_with("sz") {
            return Exchange::Szse;
        }
        if lower.starts_with("bj") {
            return Exchange::Bse;
        }
        if lower.starts_with(['6', '9']) {
            Exchange::Sse
        } else if lower.starts_with(['4', '8']) {
            Exchange::Bse
        } else {
            Exchange::Szse
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            Exchange::Sse => "sh",
            Exchange::Szse => "sz",
            Exchange::Bse => "bj",
        }
    }

    /// Strip an exchange prefix, returning the bare numeric code.
    pub fn strip_prefix(symbol: &str) -> &str {
        let trimmed = symbol.trim();
        match trimmed.get(..2).map(|p| p.to_ascii_lowercase()) {
            Some(p) if p == "sh" || p == "sz" || p == "bj" => &trimmed[2..],
            _ => trimmed,
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

/// Bar interval, serialized with the short codes stored alongside each bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    Minute,
    #[serde(rename = "1h")]
    Hour,
    #[serde(rename = "d")]
    Daily,
    #[serde(rename = "w")]
    Weekly,
    #[serde(rename = "mon")]
    Monthly,
}

impl Interval {
    pub fn code(&self) -> &'static str {
        match self {
            Interval::Minute => "1m",
            Interval::Hour => "1h",
            Interval::Daily => "d",
            Interval::Weekly => "w",
            Interval::Monthly => "mon",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Interval {
    type Err = QuantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1m" => Ok(Interval::Minute),
            "1h" => Ok(Interval::Hour),
            "d" => Ok(Interval::Daily),
            "w" => Ok(Interval::Weekly),
            "mon" => Ok(Interval::Monthly),
            other => Err(QuantError::DataError(format!("Unknown interval: '{}'", other))),
        }
    }
}

/// Matrix field served by the matrix cache. `LogReturn` is derived from `Close`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarField {
    Open,
    High,
    Low,
    Close,
    Volume,
    Turnover,
    LogReturn,
}

impl BarField {
    pub const ALL: [BarField; 7] = [
        BarField::Open,
        BarField::High,
        BarField::Low,
        BarField::Close,
        BarField::Volume,
        BarField::Turnover,
        BarField::LogReturn,
    ];

    /// Canonical bar-table column name.
    pub fn column_name(&self) -> &'static str {
        match self {
            BarField::Open => "open_price",
            BarField::High => "high_price",
            BarField::Low => "low_price",
            BarField::Close => "close_price",
            BarField::Volume => "volume",
            BarField::Turnover => "turnover",
            BarField::LogReturn => "log_return",
        }
    }

    pub fn is_derived(&self) -> bool {
        matches!(self, BarField::LogReturn)
    }

    /// Position in `ALL`, used as a slot index by caches.
    pub fn ordinal(&self) -> usize {
        match self {
            BarField::Open => 0,
            BarField::High => 1,
            BarField::Low => 2,
            BarField::Close => 3,
            BarField::Volume => 4,
            BarField::Turnover => 5,
            BarField::LogReturn => 6,
        }
    }
}

impl fmt::Display for BarField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.column_name())
    }
}
