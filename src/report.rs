use crate::models::FeatureRow;
use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use log::info;
use plotters::prelude::*;
use std::fs;
use std::path::Path;

const PLOT_WIDTH: u32 = 1200;
const PLOT_HEIGHT: u32 = 600;
const Y_MARGIN_RATIO: f64 = 0.05;

/// Dated series ready to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotSeries {
    pub train_actual: Vec<(NaiveDate, f64)>,
    pub test_actual: Vec<(NaiveDate, f64)>,
    pub test_predicted: Vec<(NaiveDate, f64)>,
}

impl PlotSeries {
    pub fn new(train_rows: &[FeatureRow], test_rows: &[FeatureRow], predicted: &[f64]) -> Self {
        let dated = |row: &FeatureRow| (row.date.date_naive(), row.target);
        Self {
            train_actual: train_rows.iter().map(dated).collect(),
            test_actual: test_rows.iter().map(dated).collect(),
            test_predicted: test_rows
                .iter()
                .zip(predicted)
                .map(|(row, &value)| (row.date.date_naive(), value))
                .collect(),
        }
    }

    fn points(&self) -> impl Iterator<Item = &(NaiveDate, f64)> {
        self.train_actual
            .iter()
            .chain(self.test_actual.iter())
            .chain(self.test_predicted.iter())
    }

    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.points().map(|(date, _)| *date).min()?;
        let last = self.points().map(|(date, _)| *date).max()?;
        Some((first, last))
    }

    /// Value bounds padded by a small margin so lines do not touch the frame.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        let (min, max) = self
            .points()
            .map(|(_, value)| *value)
            .filter(|value| value.is_finite())
            .fold(None, |acc: Option<(f64, f64)>, value| match acc {
                Some((lo, hi)) => Some((lo.min(value), hi.max(value))),
                None => Some((value, value)),
            })?;
        let margin = ((max - min) * Y_MARGIN_RATIO).max(1e-6);
        Some((min - margin, max + margin))
    }
}

/// Renders training actuals, test actuals and dashed test predictions to
/// `path`, creating its directory and replacing any previous plot.
pub fn render_forecast_plot(ticker: &str, series: &PlotSeries, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let (first_date, last_date) = series
        .date_range()
        .ok_or_else(|| anyhow!("No points to plot for {}", ticker))?;
    let (y_min, y_max) = series
        .value_range()
        .ok_or_else(|| anyhow!("No finite values to plot for {}", ticker))?;
    let last_date = if last_date > first_date {
        last_date
    } else {
        last_date.succ_opt().unwrap_or(last_date)
    };

    draw_chart(path, ticker, series, (first_date, last_date), (y_min, y_max))?;
    info!("Plot written to {}", path.display());
    Ok(())
}

fn draw_chart(
    path: &Path,
    ticker: &str,
    series: &PlotSeries,
    (first_date, last_date): (NaiveDate, NaiveDate),
    (y_min, y_max): (f64, f64),
) -> Result<()> {
    let root = BitMapBackend::new(path, (PLOT_WIDTH, PLOT_HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("{} Close Price: Actual vs Predicted (Linear Regression)", ticker),
            ("sans-serif", 24),
        )
        .margin(12)
        .x_label_area_size(48)
        .y_label_area_size(72)
        .build_cartesian_2d(first_date..last_date, y_min..y_max)
        .map_err(plot_error)?;

    chart
        .configure_mesh()
        .x_desc("Date")
        .y_desc("Close Price")
        .x_labels(10)
        .x_label_formatter(&|date| date.format("%Y-%m-%d").to_string())
        .draw()
        .map_err(plot_error)?;

    chart
        .draw_series(LineSeries::new(series.train_actual.iter().copied(), &BLUE))
        .map_err(plot_error)?
        .label("Train (actual)")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));

    chart
        .draw_series(LineSeries::new(series.test_actual.iter().copied(), &GREEN))
        .map_err(plot_error)?
        .label("Test (actual)")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], GREEN));

    chart
        .draw_series(DashedLineSeries::new(
            series.test_predicted.iter().copied(),
            6,
            4,
            RED.stroke_width(2),
        ))
        .map_err(plot_error)?
        .label("Test (predicted)")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_error)?;

    root.present().map_err(plot_error)?;
    Ok(())
}

fn plot_error<E: std::fmt::Display>(err: E) -> anyhow::Error {
    anyhow!("Plot rendering failed: {}", err)
}
