use std::path::PathBuf;
use thiserror::Error;

/// Failures that end a forecasting run. Nothing here is retried; every variant
/// surfaces at the CLI boundary.
#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("No market data available for {ticker}: {reason}")]
    DataUnavailable { ticker: String, reason: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Model not found at {}: {reason}", path.display())]
    ModelNotFound { path: PathBuf, reason: String },

    #[error("Usage error: {0}")]
    UsageError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl ForecastError {
    pub fn data_unavailable(ticker: &str, reason: impl Into<String>) -> Self {
        Self::DataUnavailable {
            ticker: ticker.to_string(),
            reason: reason.into(),
        }
    }

    pub fn model_not_found(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ModelNotFound {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Process exit code used by the binary.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::UsageError(_) | Self::InvalidArgument(_) => 2,
            _ => 1,
        }
    }
}
