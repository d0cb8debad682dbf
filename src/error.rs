use thiserror::Error;

/// Precondition violations on an input bar series.
#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    #[error("bar series is empty")]
    Empty,
    #[error("timestamp at index {index} is not after the previous bar")]
    NonIncreasingTimestamp { index: usize },
    #[error("non-positive or non-finite price at index {index}")]
    InvalidPrice { index: usize },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config path is not valid UTF-8")]
    FilePathIntoString,
    #[error("failed to initialise settings: {0}")]
    SettingsInit(String),
    #[error("failed to deserialize settings: {0}")]
    Deserialize(String),
    #[error("invalid setting: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("failed to log trade: {0}")]
    TradeLog(String),
}
