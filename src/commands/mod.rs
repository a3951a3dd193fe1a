pub mod predict;
pub mod train;

use crate::config::ForecastSettings;
use crate::error::ForecastError;
use crate::market_data::PriceSource;
use anyhow::Result;
use std::path::PathBuf;

/// Flags as given on the command line, before the mode is resolved.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub ticker: String,
    pub period: String,
    pub test_size: f64,
    pub model_path: Option<PathBuf>,
    pub predict: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunMode {
    Train,
    Predict { model_path: PathBuf },
}

impl RunMode {
    pub fn from_flags(predict: bool, model_path: Option<PathBuf>) -> Result<Self, ForecastError> {
        match (predict, model_path) {
            (false, _) => Ok(Self::Train),
            (true, Some(model_path)) => Ok(Self::Predict { model_path }),
            (true, None) => Err(ForecastError::UsageError(
                "--predict requires --model_path".to_string(),
            )),
        }
    }
}

pub enum RunOutput {
    Trained(train::TrainReport),
    Forecast(predict::Forecast),
}

/// Resolves the mode, then runs it. Usage errors surface before `source` is touched.
pub fn execute(
    settings: &ForecastSettings,
    source: &dyn PriceSource,
    request: RunRequest,
) -> Result<RunOutput> {
    match RunMode::from_flags(request.predict, request.model_path)? {
        RunMode::Train => {
            let report = train::run(
                settings,
                source,
                &train::TrainRequest {
                    ticker: request.ticker,
                    period: request.period,
                    test_size: request.test_size,
                },
            )?;
            Ok(RunOutput::Trained(report))
        }
        RunMode::Predict { model_path } => {
            let forecast = predict::run(
                source,
                &predict::PredictRequest {
                    ticker: request.ticker,
                    model_path,
                },
            )?;
            Ok(RunOutput::Forecast(forecast))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predict_without_model_path_is_usage_error() {
        assert!(matches!(
            RunMode::from_flags(true, None),
            Err(ForecastError::UsageError(_))
        ));
        assert_eq!(RunMode::from_flags(false, None).unwrap(), RunMode::Train);
        assert_eq!(
            RunMode::from_flags(true, Some(PathBuf::from("models/x_lr.pkl"))).unwrap(),
            RunMode::Predict {
                model_path: PathBuf::from("models/x_lr.pkl")
            }
        );
    }
}
