use crate::error::ForecastError;
use crate::features::{to_matrix, FEATURE_COUNT};
use crate::models::{FeatureRow, RegressionMetrics};
use crate::pipeline::TrainedPipeline;
use log::{debug, info};
use ndarray::Array1;

/// Four features plus the intercept.
pub const MIN_TRAIN_ROWS: usize = FEATURE_COUNT + 1;
/// R² is undefined on a single held-out point.
pub const MIN_TEST_ROWS: usize = 2;

pub struct TrainingOutcome {
    pub pipeline: TrainedPipeline,
    pub train_rows: Vec<FeatureRow>,
    pub test_rows: Vec<FeatureRow>,
    pub test_predictions: Vec<f64>,
    pub metrics: RegressionMetrics,
}

pub fn validate_test_fraction(test_fraction: f64) -> Result<f64, ForecastError> {
    if !test_fraction.is_finite() || test_fraction <= 0.0 || test_fraction >= 1.0 {
        return Err(ForecastError::InvalidArgument(format!(
            "test fraction must be strictly between 0 and 1 (value: {})",
            test_fraction
        )));
    }
    Ok(test_fraction)
}

/// `floor(len * (1 - test_fraction))`
pub fn split_index(len: usize, test_fraction: f64) -> usize {
    ((len as f64) * (1.0 - test_fraction)).floor() as usize
}

/// Contiguous training prefix and test suffix, in time order.
pub fn chronological_split(
    rows: &[FeatureRow],
    test_fraction: f64,
) -> Result<(&[FeatureRow], &[FeatureRow]), ForecastError> {
    let test_fraction = validate_test_fraction(test_fraction)?;
    let split_at = split_index(rows.len(), test_fraction).min(rows.len());
    let (train, test) = rows.split_at(split_at);

    if train.len() < MIN_TRAIN_ROWS || test.len() < MIN_TEST_ROWS {
        return Err(ForecastError::InsufficientData(format!(
            "{} feature rows split into {} training / {} test rows at test fraction {}; \
             need at least {} training and {} test rows",
            rows.len(),
            train.len(),
            test.len(),
            test_fraction,
            MIN_TRAIN_ROWS,
            MIN_TEST_ROWS
        )));
    }

    Ok((train, test))
}

/// Fits the pipeline on the training prefix and scores it on the test suffix.
pub fn train(
    ticker: &str,
    rows: &[FeatureRow],
    test_fraction: f64,
) -> Result<TrainingOutcome, ForecastError> {
    if rows.is_empty() {
        return Err(ForecastError::data_unavailable(
            ticker,
            "no feature rows to train on",
        ));
    }

    let (train_rows, test_rows) = chronological_split(rows, test_fraction)?;
    info!(
        "Training {} on {} rows ({} .. {}), holding out {} rows ({} .. {})",
        ticker,
        train_rows.len(),
        train_rows[0].date.date_naive(),
        train_rows[train_rows.len() - 1].date.date_naive(),
        test_rows.len(),
        test_rows[0].date.date_naive(),
        test_rows[test_rows.len() - 1].date.date_naive()
    );

    let (x_train, y_train) = to_matrix(train_rows);
    let pipeline = TrainedPipeline::fit(&x_train, &y_train)?;
    debug!(
        "Fitted scaler mean={:?} scale={:?} coefficients={:?} intercept={}",
        pipeline.scaler.mean,
        pipeline.scaler.scale,
        pipeline.model.coefficients,
        pipeline.model.intercept
    );

    let (x_test, y_test) = to_matrix(test_rows);
    let test_predictions = pipeline.predict(&x_test);
    let metrics = evaluate(&y_test, &test_predictions);
    let test_predictions = test_predictions.to_vec();

    Ok(TrainingOutcome {
        pipeline,
        train_rows: train_rows.to_vec(),
        test_rows: test_rows.to_vec(),
        test_predictions,
        metrics,
    })
}

pub fn evaluate(actual: &Array1<f64>, predicted: &Array1<f64>) -> RegressionMetrics {
    RegressionMetrics {
        mae: mean_absolute_error(actual, predicted),
        rmse: mean_squared_error(actual, predicted).sqrt(),
        r2: r_squared(actual, predicted),
        n_samples: actual.len(),
    }
}

pub fn mean_absolute_error(actual: &Array1<f64>, predicted: &Array1<f64>) -> f64 {
    (actual - predicted).mapv(f64::abs).mean().unwrap_or(f64::NAN)
}

pub fn mean_squared_error(actual: &Array1<f64>, predicted: &Array1<f64>) -> f64 {
    (actual - predicted).mapv(|err| err * err).mean().unwrap_or(f64::NAN)
}

/// Coefficient of determination. A constant target scores 1.0 when predicted
/// exactly and 0.0 otherwise.
pub fn r_squared(actual: &Array1<f64>, predicted: &Array1<f64>) -> f64 {
    let Some(mean) = actual.mean() else {
        return f64::NAN;
    };
    let ss_tot = actual.mapv(|a| (a - mean).powi(2)).sum();
    let ss_res = (actual - predicted).mapv(|err| err * err).sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}
