use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuantError {
    /// Matrices or factor values were requested before any bar table was loaded.
    #[error("Bar data not loaded: load a bar table before requesting matrices")]
    NotLoaded,
    #[error("Duplicate bar for symbol {symbol} at {datetime}")]
    DuplicateBarKey {
        symbol: String,
        datetime: NaiveDateTime,
    },
    #[error("External source failure: {0}")]
    ExternalSourceFailure(String),
    #[error("Evaluation of factor {factor} failed: {reason}")]
    EvaluationFailure { factor: String, reason: String },
    #[error("No factors registered for analysis")]
    NoFactors,
    #[error("Data error: {0}")]
    DataError(String),
    #[error("Config error: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Network error: {0}")]
    NetworkError(String),
}

pub type Result<T> = std::result::Result<T, QuantError>;

impl QuantError {
    pub fn evaluation(factor: impl Into<String>, reason: impl Into<String>) -> Self {
        QuantError::EvaluationFailure {
            factor: factor.into(),
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for QuantError {
    fn from(err: std::io::Error) -> Self {
        QuantError::IoError(err.to_string())
    }
}

impl From<csv::Error> for QuantError {
    fn from(err: csv::Error) -> Self {
        QuantError::IoError(err.to_string())
    }
}

impl From<rusqlite::Error> for QuantError {
    fn from(err: rusqlite::Error) -> Self {
        QuantError::DatabaseError(err.to_string())
    }
}

impl From<reqwest::Error> for QuantError {
    fn from(err: reqwest::Error) -> Self {
        QuantError::NetworkError(err.to_string())
    }
}

impl From<serde_json::Error> for QuantError {
    fn from(err: serde_json::Error) -> Self {
        QuantError::DataError(err.to_string())
    }
}
