use anyhow::Result;
use clap::Parser;
use forecaster::{
    commands::{self, RunOutput, RunRequest},
    config::{ForecastSettings, DEFAULT_PERIOD, DEFAULT_TEST_SIZE},
    error::ForecastError,
    market_data::YahooChartClient,
};
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "forecaster")]
#[command(about = "Fit a lag-feature linear regression on daily closes, or score the latest day")]
struct Cli {
    /// Ticker symbol, e.g. AAPL
    #[arg(long)]
    ticker: String,
    /// Lookback period: <n>d, <n>wk, <n>mo, <n>y, ytd or max
    #[arg(long, default_value = DEFAULT_PERIOD)]
    period: String,
    /// Fraction of the most recent rows held out for evaluation (0..1)
    #[arg(long = "test_size", default_value_t = DEFAULT_TEST_SIZE)]
    test_size: f64,
    /// Saved pipeline to load (required with --predict)
    #[arg(long = "model_path", value_name = "PATH")]
    model_path: Option<PathBuf>,
    /// Predict the latest close with a saved pipeline instead of training
    #[arg(long)]
    predict: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            let code = err
                .downcast_ref::<ForecastError>()
                .map(ForecastError::exit_code)
                .unwrap_or(1);
            ExitCode::from(code as u8)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = ForecastSettings::from_env()?;
    info!("Starting forecaster. Not financial advice.");

    let source = YahooChartClient::new(&settings.market_data_base_url)?;
    let request = RunRequest {
        ticker: cli.ticker,
        period: cli.period,
        test_size: cli.test_size,
        model_path: cli.model_path,
        predict: cli.predict,
    };

    match commands::execute(&settings, &source, request)? {
        RunOutput::Trained(report) => {
            println!("Ticker: {}", report.ticker);
            println!(
                "Rows: {} train / {} test",
                report.train_rows, report.test_rows
            );
            println!("MAE: {:.4}", report.metrics.mae);
            println!("R2: {:.4}", report.metrics.r2);
            println!("Model saved to: {}", report.model_path.display());
            println!("Plot saved to: {}", report.plot_path.display());
        }
        RunOutput::Forecast(forecast) => {
            println!(
                "Predicted close for {} ({}): {:.4}",
                forecast.ticker,
                forecast.feature_row.date.date_naive(),
                forecast.value
            );
        }
    }

    Ok(())
}
