use crate::models::{Candle, FeatureRow};
use ndarray::{Array1, Array2};

pub const LAGS: [usize; 3] = [1, 2, 3];
pub const FEATURE_COUNT: usize = 4;
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = ["day_index", "lag_1", "lag_2", "lag_3"];

/// Rows needed before the first complete feature row exists.
pub const MIN_HISTORY_ROWS: usize = LAGS[LAGS.len() - 1] + 1;

/// Builds one feature row per candle that has three predecessors.
///
/// Candles must already be sorted by date. The day index is the candle's
/// position in `candles`, so the first emitted row has index 3.
pub fn build_feature_rows(candles: &[Candle]) -> Vec<FeatureRow> {
    let max_lag = LAGS[LAGS.len() - 1];
    if candles.len() <= max_lag {
        return Vec::new();
    }

    candles
        .iter()
        .enumerate()
        .skip(max_lag)
        .map(|(idx, candle)| FeatureRow {
            date: candle.date,
            day_index: idx,
            lag_1: candles[idx - LAGS[0]].close,
            lag_2: candles[idx - LAGS[1]].close,
            lag_3: candles[idx - LAGS[2]].close,
            target: candle.close,
        })
        .collect()
}

/// Splits rows into the feature matrix (one row per day, columns in
/// `FEATURE_NAMES` order) and the target vector.
pub fn to_matrix(rows: &[FeatureRow]) -> (Array2<f64>, Array1<f64>) {
    let x = Array2::from_shape_fn((rows.len(), FEATURE_COUNT), |(i, j)| rows[i].inputs()[j]);
    let y = rows.iter().map(|row| row.target).collect();
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn candles(closes: &[f64]) -> Vec<Candle> {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(idx, &close)| Candle {
                ticker: "AAA".to_string(),
                date: base + Duration::days(idx as i64),
                open: close,
                high: close,
                low: close,
                close,
                unadjusted_close: Some(close),
                volume_shares: 1_000,
            })
            .collect()
    }

    #[test]
    fn drops_first_three_rows_and_keeps_positions() {
        for n in 0..12usize {
            let closes: Vec<f64> = (0..n).map(|i| 100.0 + i as f64).collect();
            let rows = build_feature_rows(&candles(&closes));
            assert_eq!(rows.len(), n.saturating_sub(3), "n={n}");
            for (offset, row) in rows.iter().enumerate() {
                assert_eq!(row.day_index, offset + 3);
            }
        }
    }

    #[test]
    fn lags_point_at_previous_closes() {
        let rows = build_feature_rows(&candles(&[10.0, 11.0, 13.0, 16.0, 20.0]));
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].target, 16.0);
        assert_eq!(rows[0].lag_1, 13.0);
        assert_eq!(rows[0].lag_2, 11.0);
        assert_eq!(rows[0].lag_3, 10.0);

        assert_eq!(rows[1].target, 20.0);
        assert_eq!(rows[1].lag_1, 16.0);
        assert_eq!(rows[1].lag_3, 11.0);
        assert!(rows[0].date < rows[1].date);
    }

    #[test]
    fn matrix_follows_feature_name_order() {
        let rows = build_feature_rows(&candles(&[1.0, 2.0, 3.0, 4.0]));
        let (x, y) = to_matrix(&rows);
        assert_eq!(x, ndarray::array![[3.0, 3.0, 2.0, 1.0]]);
        assert_eq!(y, ndarray::array![4.0]);
        assert_eq!(MIN_HISTORY_ROWS, 4);
    }
}
