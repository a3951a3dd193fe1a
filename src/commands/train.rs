use crate::candle_utils::normalize_ticker_symbol;
use crate::config::ForecastSettings;
use crate::error::ForecastError;
use crate::features::build_feature_rows;
use crate::market_data::{fetch_price_history, PriceSource};
use crate::models::RegressionMetrics;
use crate::persistence::{save_pipeline, PipelineArtifact};
use crate::report::{render_forecast_plot, PlotSeries};
use crate::trainer::{self, validate_test_fraction};
use anyhow::{Context, Result};
use log::info;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct TrainRequest {
    pub ticker: String,
    pub period: String,
    pub test_size: f64,
}

#[derive(Debug, Clone)]
pub struct TrainReport {
    pub ticker: String,
    pub metrics: RegressionMetrics,
    pub train_rows: usize,
    pub test_rows: usize,
    pub model_path: PathBuf,
    pub plot_path: PathBuf,
}

pub fn run(
    settings: &ForecastSettings,
    source: &dyn PriceSource,
    request: &TrainRequest,
) -> Result<TrainReport> {
    validate_test_fraction(request.test_size)?;
    let ticker = normalize_ticker_symbol(&request.ticker).ok_or_else(|| {
        ForecastError::InvalidArgument("ticker symbol must not be empty".to_string())
    })?;
    info!(
        "Starting training for {} over {} (test size {})",
        ticker, request.period, request.test_size
    );

    let candles = fetch_price_history(source, &ticker, &request.period)?;
    let rows = build_feature_rows(&candles);
    let outcome = trainer::train(&ticker, &rows, request.test_size)?;
    info!(
        "Held-out MAE {:.4}, RMSE {:.4}, R² {:.4} over {} rows",
        outcome.metrics.mae, outcome.metrics.rmse, outcome.metrics.r2, outcome.metrics.n_samples
    );

    let series = PlotSeries::new(
        &outcome.train_rows,
        &outcome.test_rows,
        &outcome.test_predictions,
    );
    let plot_path = settings.plot_path(&ticker);
    render_forecast_plot(&ticker, &series, &plot_path)
        .with_context(|| format!("Failed to write plot for {}", ticker))?;

    let model_path = settings.model_path(&ticker);
    save_pipeline(
        &PipelineArtifact::new(&ticker, outcome.pipeline),
        &model_path,
    )?;
    info!("Pipeline saved to {}", model_path.display());

    Ok(TrainReport {
        ticker,
        metrics: outcome.metrics,
        train_rows: outcome.train_rows.len(),
        test_rows: outcome.test_rows.len(),
        model_path,
        plot_path,
    })
}
