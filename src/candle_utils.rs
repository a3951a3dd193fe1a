use crate::models::Candle;
use log::{debug, warn};

/// Normalizes a ticker string by trimming whitespace and uppercasing.
pub fn normalize_ticker_symbol(value: &str) -> Option<String> {
    let normalized = value.trim().to_uppercase();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

pub fn is_complete(candle: &Candle) -> bool {
    [candle.open, candle.high, candle.low, candle.close]
        .iter()
        .all(|value| value.is_finite())
        && candle.volume_shares >= 0
}

/// Drops incomplete candles, sorts by date and keeps the last candle seen for
/// any repeated trading day.
pub fn clean_daily_candles(candles: Vec<Candle>) -> Vec<Candle> {
    let total = candles.len();
    let mut complete: Vec<Candle> = candles.into_iter().filter(is_complete).collect();
    if complete.len() < total {
        warn!(
            "Dropped {} incomplete candle(s) out of {}",
            total - complete.len(),
            total
        );
    }

    // Stable sort keeps provider order within a day, so the later duplicate wins.
    complete.sort_by_key(|candle| candle.trading_day());
    let before_dedupe = complete.len();
    let mut deduped: Vec<Candle> = Vec::with_capacity(complete.len());
    for candle in complete {
        match deduped.last_mut() {
            Some(last) if last.trading_day() == candle.trading_day() => *last = candle,
            _ => deduped.push(candle),
        }
    }
    if deduped.len() < before_dedupe {
        debug!(
            "Collapsed {} duplicate trading day(s)",
            before_dedupe - deduped.len()
        );
    }

    deduped
}
