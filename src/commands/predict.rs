use crate::candle_utils::normalize_ticker_symbol;
use crate::config::PREDICT_PERIOD;
use crate::error::ForecastError;
use crate::features::{build_feature_rows, MIN_HISTORY_ROWS};
use crate::market_data::{fetch_price_history, PriceSource};
use crate::models::FeatureRow;
use crate::persistence::load_pipeline;
use anyhow::Result;
use log::{info, warn};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct PredictRequest {
    pub ticker: String,
    pub model_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Forecast {
    pub ticker: String,
    pub feature_row: FeatureRow,
    pub value: f64,
}

/// Loads the pipeline first, then scores the most recent complete feature row
/// of a short trailing window.
pub fn run(source: &dyn PriceSource, request: &PredictRequest) -> Result<Forecast> {
    let ticker = normalize_ticker_symbol(&request.ticker).ok_or_else(|| {
        ForecastError::InvalidArgument("ticker symbol must not be empty".to_string())
    })?;

    let artifact = load_pipeline(&request.model_path)?;
    info!(
        "Loaded pipeline for {} trained at {} from {}",
        artifact.ticker,
        artifact.trained_at.to_rfc3339(),
        request.model_path.display()
    );
    if !artifact.ticker.eq_ignore_ascii_case(&ticker) {
        warn!(
            "Model {} was trained on {} but is scoring {}",
            request.model_path.display(),
            artifact.ticker,
            ticker
        );
    }

    let candles = fetch_price_history(source, &ticker, PREDICT_PERIOD)?;
    if candles.len() < MIN_HISTORY_ROWS {
        return Err(ForecastError::InsufficientData(format!(
            "{} returned {} row(s) over {}; at least {} are needed for one feature row",
            ticker,
            candles.len(),
            PREDICT_PERIOD,
            MIN_HISTORY_ROWS
        ))
        .into());
    }

    let rows = build_feature_rows(&candles);
    let Some(latest) = rows.last().copied() else {
        return Err(ForecastError::InsufficientData(format!(
            "no complete feature row for {}",
            ticker
        ))
        .into());
    };

    let value = artifact.pipeline.predict_one(&latest.inputs());
    info!(
        "Forecast for {} from row dated {}: {:.4}",
        ticker,
        latest.date.date_naive(),
        value
    );

    Ok(Forecast {
        ticker,
        feature_row: latest,
        value,
    })
}
