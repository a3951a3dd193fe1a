use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

pub const MARKET_DATA_BASE_URL_SETTING: &str = "MARKET_DATA_BASE_URL";
pub const MODELS_DIR_SETTING: &str = "FORECAST_MODELS_DIR";
pub const REPORTS_DIR_SETTING: &str = "FORECAST_REPORTS_DIR";

const DEFAULT_MARKET_DATA_BASE_URL: &str = "https://query1.finance.yahoo.com";
const DEFAULT_MODELS_DIR: &str = "models";
const DEFAULT_REPORTS_DIR: &str = "reports";

pub const DEFAULT_PERIOD: &str = "5y";
pub const DEFAULT_TEST_SIZE: f64 = 0.2;
pub const PREDICT_PERIOD: &str = "10d";

const MODEL_FILE_SUFFIX: &str = "_lr.pkl";
const PLOT_FILE_SUFFIX: &str = "_lr_plot.png";

/// Where data comes from and where artifacts go.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSettings {
    pub market_data_base_url: String,
    pub models_dir: PathBuf,
    pub reports_dir: PathBuf,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            market_data_base_url: DEFAULT_MARKET_DATA_BASE_URL.to_string(),
            models_dir: PathBuf::from(DEFAULT_MODELS_DIR),
            reports_dir: PathBuf::from(DEFAULT_REPORTS_DIR),
        }
    }
}

impl ForecastSettings {
    pub fn from_env() -> Result<Self> {
        let keys = [
            MARKET_DATA_BASE_URL_SETTING,
            MODELS_DIR_SETTING,
            REPORTS_DIR_SETTING,
        ];
        let settings: HashMap<String, String> = keys
            .iter()
            .filter_map(|key| env::var(key).ok().map(|value| (key.to_string(), value)))
            .collect();
        Self::from_settings_map(&settings)
    }

    pub fn from_settings_map(settings: &HashMap<String, String>) -> Result<Self> {
        let defaults = Self::default();

        let market_data_base_url = optional_setting(settings, MARKET_DATA_BASE_URL_SETTING)
            .map(|value| value.trim_end_matches('/').to_string())
            .unwrap_or(defaults.market_data_base_url);
        if !market_data_base_url.starts_with("http://")
            && !market_data_base_url.starts_with("https://")
        {
            return Err(anyhow!(
                "Setting {} must be an http(s) URL (value: {})",
                MARKET_DATA_BASE_URL_SETTING,
                market_data_base_url
            ));
        }

        let models_dir = optional_setting(settings, MODELS_DIR_SETTING)
            .map(PathBuf::from)
            .unwrap_or(defaults.models_dir);
        let reports_dir = optional_setting(settings, REPORTS_DIR_SETTING)
            .map(PathBuf::from)
            .unwrap_or(defaults.reports_dir);

        Ok(Self {
            market_data_base_url,
            models_dir,
            reports_dir,
        })
    }

    /// `<models_dir>/<ticker-lowercase>_lr.pkl`
    pub fn model_path(&self, ticker: &str) -> PathBuf {
        artifact_path(&self.models_dir, ticker, MODEL_FILE_SUFFIX)
    }

    /// `<reports_dir>/<ticker-lowercase>_lr_plot.png`
    pub fn plot_path(&self, ticker: &str) -> PathBuf {
        artifact_path(&self.reports_dir, ticker, PLOT_FILE_SUFFIX)
    }
}

fn artifact_path(dir: &Path, ticker: &str, suffix: &str) -> PathBuf {
    dir.join(format!("{}{}", ticker.trim().to_lowercase(), suffix))
}

fn optional_setting<'a>(settings: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    settings
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}
