use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One trading day of adjusted prices for a ticker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub ticker: String,
    pub date: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub unadjusted_close: Option<f64>,
    pub volume_shares: i64,
}

impl Candle {
    pub fn trading_day(&self) -> NaiveDate {
        self.date.date_naive()
    }
}

/// Lagged-close features for one day plus the close being predicted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FeatureRow {
    pub date: DateTime<Utc>,
    pub day_index: usize,
    pub lag_1: f64,
    pub lag_2: f64,
    pub lag_3: f64,
    pub target: f64,
}

impl FeatureRow {
    /// Inputs in the order the pipeline was fitted on: day index, lag 1, lag 2, lag 3.
    pub fn inputs(&self) -> [f64; crate::features::FEATURE_COUNT] {
        [self.day_index as f64, self.lag_1, self.lag_2, self.lag_3]
    }
}

/// Held-out accuracy of a fitted pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RegressionMetrics {
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
    pub n_samples: usize,
}
