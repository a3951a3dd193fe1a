//! Daily OHLCV history from the Yahoo Finance chart endpoint.

use crate::candle_utils::{clean_daily_candles, normalize_ticker_symbol};
use crate::error::ForecastError;
use crate::http_client::build_blocking_client;
use crate::models::Candle;
use anyhow::Result;
use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, Utc};
use log::{debug, info, warn};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

const CHART_PATH: &str = "/v8/finance/chart";
const DAILY_INTERVAL: &str = "1d";

/// Anything that can produce daily candles for one ticker.
pub trait PriceSource {
    fn fetch_daily(
        &self,
        ticker: &str,
        period: &HistoryPeriod,
    ) -> Result<Vec<Candle>, ForecastError>;
}

/// Lookback window such as `5y`, `6mo`, `10d`, `ytd` or `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryPeriod {
    Days(u32),
    Weeks(u32),
    Months(u32),
    Years(u32),
    YearToDate,
    Max,
}

impl HistoryPeriod {
    /// First calendar day covered by the window, or `None` for `max`.
    pub fn start_date(&self, today: NaiveDate) -> Option<NaiveDate> {
        match *self {
            Self::Days(n) => today.checked_sub_signed(Duration::days(i64::from(n))),
            Self::Weeks(n) => today.checked_sub_signed(Duration::weeks(i64::from(n))),
            Self::Months(n) => today.checked_sub_months(Months::new(n)),
            Self::Years(n) => n
                .checked_mul(12)
                .and_then(|months| today.checked_sub_months(Months::new(months))),
            Self::YearToDate => NaiveDate::from_ymd_opt(today.year(), 1, 1),
            Self::Max => None,
        }
    }
}

impl FromStr for HistoryPeriod {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "max" => return Ok(Self::Max),
            "ytd" => return Ok(Self::YearToDate),
            _ => {}
        }

        let unsupported = || format!("unsupported period '{}'", raw.trim());
        let unit_start = normalized
            .find(|c: char| !c.is_ascii_digit())
            .filter(|idx| *idx > 0)
            .ok_or_else(unsupported)?;
        let (count, unit) = normalized.split_at(unit_start);
        let count: u32 = count.parse().map_err(|_| unsupported())?;
        if count == 0 {
            return Err(unsupported());
        }

        match unit {
            "d" => Ok(Self::Days(count)),
            "wk" => Ok(Self::Weeks(count)),
            "mo" => Ok(Self::Months(count)),
            "y" => Ok(Self::Years(count)),
            _ => Err(unsupported()),
        }
    }
}

impl fmt::Display for HistoryPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Days(n) => write!(f, "{}d", n),
            Self::Weeks(n) => write!(f, "{}wk", n),
            Self::Months(n) => write!(f, "{}mo", n),
            Self::Years(n) => write!(f, "{}y", n),
            Self::YearToDate => f.write_str("ytd"),
            Self::Max => f.write_str("max"),
        }
    }
}

/// Validates the inputs, fetches from `source` and returns clean, sorted
/// candles. An empty result is `DataUnavailable`.
pub fn fetch_price_history(
    source: &dyn PriceSource,
    ticker: &str,
    period: &str,
) -> Result<Vec<Candle>, ForecastError> {
    let Some(ticker) = normalize_ticker_symbol(ticker) else {
        return Err(ForecastError::InvalidArgument(
            "ticker symbol must not be empty".to_string(),
        ));
    };
    let period = period
        .parse::<HistoryPeriod>()
        .map_err(|reason| ForecastError::data_unavailable(&ticker, reason))?;

    let candles = clean_daily_candles(source.fetch_daily(&ticker, &period)?);
    if candles.is_empty() {
        return Err(ForecastError::data_unavailable(
            &ticker,
            format!("provider returned no complete rows for period {}", period),
        ));
    }

    info!(
        "Fetched {} daily candles for {} ({} .. {})",
        candles.len(),
        ticker,
        candles[0].trading_day(),
        candles[candles.len() - 1].trading_day()
    );
    Ok(candles)
}

pub struct YahooChartClient {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl YahooChartClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            http: build_blocking_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl PriceSource for YahooChartClient {
    fn fetch_daily(
        &self,
        ticker: &str,
        period: &HistoryPeriod,
    ) -> Result<Vec<Candle>, ForecastError> {
        let url = format!("{}{}/{}", self.base_url, CHART_PATH, ticker);
        let query = chart_query(period, Utc::now());
        debug!("GET {} {:?}", url, query);

        let response = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .map_err(|err| {
                ForecastError::data_unavailable(ticker, format!("GET {} failed: {}", url, err))
            })?;
        let status = response.status();
        let body = response.text().map_err(|err| {
            ForecastError::data_unavailable(
                ticker,
                format!("failed to read response from {}: {}", url, err),
            )
        })?;

        match serde_json::from_str::<ChartEnvelope>(&body) {
            Ok(envelope) => candles_from_chart(ticker, envelope),
            Err(_) if !status.is_success() => Err(ForecastError::data_unavailable(
                ticker,
                format!("provider returned HTTP {}", status),
            )),
            Err(err) => Err(ForecastError::data_unavailable(
                ticker,
                format!("unreadable provider response: {}", err),
            )),
        }
    }
}

/// Query parameters for a daily, split/dividend-aware chart request.
pub fn chart_query(period: &HistoryPeriod, now: DateTime<Utc>) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("interval", DAILY_INTERVAL.to_string()),
        ("includeAdjustedClose", "true".to_string()),
        ("events", "div,split".to_string()),
    ];
    match period.start_date(now.date_naive()) {
        Some(start) => {
            query.push((
                "period1",
                start.and_time(NaiveTime::MIN).and_utc().timestamp().to_string(),
            ));
            query.push(("period2", now.timestamp().to_string()));
        }
        None => query.push(("range", "max".to_string())),
    }
    query
}

/// Decodes a chart payload into adjusted candles, in provider order.
pub fn parse_chart_response(ticker: &str, body: &str) -> Result<Vec<Candle>, ForecastError> {
    let envelope: ChartEnvelope = serde_json::from_str(body).map_err(|err| {
        ForecastError::data_unavailable(ticker, format!("unreadable provider response: {}", err))
    })?;
    candles_from_chart(ticker, envelope)
}

fn candles_from_chart(ticker: &str, envelope: ChartEnvelope) -> Result<Vec<Candle>, ForecastError> {
    if let Some(error) = envelope.chart.error {
        return Err(ForecastError::data_unavailable(
            ticker,
            format!(
                "{}: {}",
                error.code.unwrap_or_else(|| "error".to_string()),
                error.description.unwrap_or_default()
            ),
        ));
    }

    let Some(result) = envelope
        .chart
        .result
        .and_then(|results| results.into_iter().next())
    else {
        return Ok(Vec::new());
    };

    let timestamps = result.timestamp.unwrap_or_default();
    let Some(quote) = result.indicators.quote.into_iter().next() else {
        return Ok(Vec::new());
    };
    let adjclose = result
        .indicators
        .adjclose
        .and_then(|series| series.into_iter().next())
        .map(|series| series.adjclose);
    let gmt_offset = result.meta.and_then(|meta| meta.gmtoffset).unwrap_or(0);

    let mut candles = Vec::with_capacity(timestamps.len());
    let mut skipped = 0usize;
    for (idx, &timestamp) in timestamps.iter().enumerate() {
        let row = (
            value_at(&quote.open, idx),
            value_at(&quote.high, idx),
            value_at(&quote.low, idx),
            value_at(&quote.close, idx),
            value_at(&quote.volume, idx),
        );
        let (Some(open), Some(high), Some(low), Some(close), Some(volume)) = row else {
            skipped += 1;
            continue;
        };
        let ratio = match adjclose.as_deref() {
            Some(series) => match value_at(series, idx) {
                Some(adjusted) if close != 0.0 => adjusted / close,
                _ => {
                    skipped += 1;
                    continue;
                }
            },
            None => 1.0,
        };
        let Some(date) = trading_day_start(timestamp, gmt_offset) else {
            skipped += 1;
            continue;
        };

        candles.push(Candle {
            ticker: ticker.to_string(),
            date,
            open: open * ratio,
            high: high * ratio,
            low: low * ratio,
            close: close * ratio,
            unadjusted_close: Some(close),
            volume_shares: volume.round() as i64,
        });
    }

    if skipped > 0 {
        warn!("Skipped {} {} row(s) with missing fields", skipped, ticker);
    }
    Ok(candles)
}

fn value_at(series: &[Option<f64>], idx: usize) -> Option<f64> {
    series
        .get(idx)
        .copied()
        .flatten()
        .filter(|value| value.is_finite())
}

/// Exchange-local calendar day of a bar, as midnight UTC.
fn trading_day_start(timestamp: i64, gmt_offset: i64) -> Option<DateTime<Utc>> {
    let local = DateTime::<Utc>::from_timestamp(timestamp.checked_add(gmt_offset)?, 0)?;
    Some(local.date_naive().and_time(NaiveTime::MIN).and_utc())
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: Option<ChartMeta>,
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
    #[serde(default)]
    adjclose: Option<Vec<AdjClose>>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SAMPLE_CHART: &str = r#"{
        "chart": {
            "result": [{
                "meta": {"symbol": "AAA", "gmtoffset": -14400},
                "timestamp": [1704205800, 1704292200, 1704378600, 1704465000],
                "indicators": {
                    "quote": [{
                        "open":   [100.0, 102.0, null, 104.0],
                        "high":   [101.0, 103.0, 104.0, 106.0],
                        "low":    [99.0, 101.0, 102.0, 103.0],
                        "close":  [100.0, 102.0, 103.0, 105.0],
                        "volume": [1000, 1100, 1200, 1300]
                    }],
                    "adjclose": [{"adjclose": [50.0, 51.0, 51.5, 52.5]}]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn parses_and_adjusts_chart_rows() {
        let candles = parse_chart_response("AAA", SAMPLE_CHART).unwrap();
        assert_eq!(candles.len(), 3, "row with null open is dropped");

        let first = &candles[0];
        assert_eq!(first.date, Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
        assert!((first.close - 50.0).abs() < 1e-12);
        assert!((first.open - 50.0).abs() < 1e-12);
        assert!((first.high - 50.5).abs() < 1e-12);
        assert_eq!(first.unadjusted_close, Some(100.0));
        assert_eq!(first.volume_shares, 1000);

        assert_eq!(
            candles[2].date,
            Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn provider_error_is_data_unavailable() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        match parse_chart_response("ZZZZ", body) {
            Err(ForecastError::DataUnavailable { ticker, reason }) => {
                assert_eq!(ticker, "ZZZZ");
                assert!(reason.contains("delisted"));
            }
            other => panic!("unexpected result: {:?}", other.map(|c| c.len())),
        }
    }

    struct FixtureSource(&'static str);

    impl PriceSource for FixtureSource {
        fn fetch_daily(
            &self,
            ticker: &str,
            _period: &HistoryPeriod,
        ) -> Result<Vec<Candle>, ForecastError> {
            parse_chart_response(ticker, self.0)
        }
    }

    const EMPTY_CHART: &str =
        r#"{"chart":{"result":[{"meta":{},"indicators":{"quote":[{}]}}],"error":null}}"#;

    #[test]
    fn empty_result_yields_no_rows() {
        assert!(parse_chart_response("AAA", EMPTY_CHART).unwrap().is_empty());

        match fetch_price_history(&FixtureSource(EMPTY_CHART), "aaa", "1y") {
            Err(ForecastError::DataUnavailable { ticker, reason }) => {
                assert_eq!(ticker, "AAA");
                assert!(reason.contains("no complete rows"), "reason={reason}");
            }
            other => panic!("unexpected result: {:?}", other.map(|c| c.len())),
        }
    }

    #[test]
    fn unsupported_period_fails_before_fetch() {
        assert!(matches!(
            fetch_price_history(&FixtureSource(SAMPLE_CHART), "AAA", "3 fortnights"),
            Err(ForecastError::DataUnavailable { .. })
        ));
    }

    #[test]
    fn parses_period_descriptors() {
        assert_eq!("5y".parse::<HistoryPeriod>(), Ok(HistoryPeriod::Years(5)));
        assert_eq!(" 6MO ".parse::<HistoryPeriod>(), Ok(HistoryPeriod::Months(6)));
        assert_eq!("10d".parse::<HistoryPeriod>(), Ok(HistoryPeriod::Days(10)));
        assert_eq!("2wk".parse::<HistoryPeriod>(), Ok(HistoryPeriod::Weeks(2)));
        assert_eq!("ytd".parse::<HistoryPeriod>(), Ok(HistoryPeriod::YearToDate));
        assert_eq!("max".parse::<HistoryPeriod>(), Ok(HistoryPeriod::Max));

        for bad in ["", "y", "0d", "5x", "-3d", "five years"] {
            assert!(bad.parse::<HistoryPeriod>().is_err(), "{bad} should fail");
        }
        assert_eq!(HistoryPeriod::Months(3).to_string(), "3mo");
    }

    #[test]
    fn period_start_dates() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        assert_eq!(
            HistoryPeriod::Days(10).start_date(today),
            NaiveDate::from_ymd_opt(2024, 3, 21)
        );
        assert_eq!(
            HistoryPeriod::Months(1).start_date(today),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(
            HistoryPeriod::Years(5).start_date(today),
            NaiveDate::from_ymd_opt(2019, 3, 31)
        );
        assert_eq!(
            HistoryPeriod::YearToDate.start_date(today),
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );
        assert_eq!(HistoryPeriod::Max.start_date(today), None);
    }

    #[test]
    fn chart_query_uses_epoch_bounds_or_range() {
        let now = Utc.with_ymd_and_hms(2024, 1, 11, 15, 0, 0).unwrap();
        let query = chart_query(&HistoryPeriod::Days(10), now);
        let lookup = |key: &str| {
            query
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.clone())
        };
        assert_eq!(lookup("interval").as_deref(), Some("1d"));
        assert_eq!(
            lookup("period1"),
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap().timestamp().to_string())
        );
        assert_eq!(lookup("period2"), Some(now.timestamp().to_string()));

        let max_query = chart_query(&HistoryPeriod::Max, now);
        assert!(max_query.iter().any(|(k, v)| *k == "range" && v == "max"));
        assert!(!max_query.iter().any(|(k, _)| *k == "period1"));
    }
}
