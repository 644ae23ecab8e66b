//! Rolling technical indicators over a price series.
//!
//! All windows are trailing (the N most recent samples ending at the current
//! position, inclusive) and use the unweighted arithmetic mean, not
//! exponential smoothing. A value stays `None` until its window has enough
//! preceding samples.
//!
//! RSI zero-division policy: when the loss average over the window is zero,
//! RSI is 100 if there was any gain, and `None` (no signal) when the window
//! was completely flat.

use crate::error::MarketError;
use crate::history::PricePoint;

pub const MA_SHORT_WINDOW: usize = 7;
pub const MA_LONG_WINDOW: usize = 30;
pub const RSI_PERIOD: usize = 14;

/// A [`PricePoint`] extended with indicator values. Fields are `None` while
/// their window is still filling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorPoint {
    pub timestamp_ms: i64,
    pub price: f64,
    pub volume: f64,
    pub ma_short: Option<f64>,
    pub ma_long: Option<f64>,
    pub rsi: Option<f64>,
}

/// Annotate `series` with moving averages and RSI.
///
/// Returns a new vector; the input is left untouched. Fails only on an empty
/// series; a short series is valid and simply yields mostly-`None` fields.
pub fn annotate(series: &[PricePoint]) -> Result<Vec<IndicatorPoint>, MarketError> {
    if series.is_empty() {
        return Err(MarketError::InsufficientData);
    }

    let closes: Vec<f64> = series.iter().map(|p| p.price).collect();
    let ma_short = trailing_mean(&closes, MA_SHORT_WINDOW);
    let ma_long = trailing_mean(&closes, MA_LONG_WINDOW);
    let rsi = relative_strength(&closes, RSI_PERIOD);

    Ok(series
        .iter()
        .enumerate()
        .map(|(i, point)| IndicatorPoint {
            timestamp_ms: point.timestamp_ms,
            price: point.price,
            volume: point.volume,
            ma_short: ma_short[i],
            ma_long: ma_long[i],
            rsi: rsi[i],
        })
        .collect())
}

/// Unweighted trailing mean over `window` samples; `None` until the window
/// is full.
fn trailing_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    values
        .iter()
        .enumerate()
        .map(|(i, _)| {
            if i + 1 < window {
                None
            } else {
                let sum: f64 = values[i + 1 - window..=i].iter().sum();
                Some(sum / window as f64)
            }
        })
        .collect()
}

/// SMA-based RSI over `period` deltas.
///
/// Position `i` looks at the `period` deltas ending at `i`, so the first
/// defined value sits at index `period` (one delta per sample after the
/// first).
fn relative_strength(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() < period + 1 {
        return out;
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    for i in period..closes.len() {
        let window = &deltas[i - period..i];
        let (sum_gain, sum_loss) = window.iter().fold((0.0_f64, 0.0_f64), |(g, l), &d| {
            if d > 0.0 { (g + d, l) } else { (g, l - d) }
        });

        let avg_gain = sum_gain / period as f64;
        let avg_loss = sum_loss / period as f64;

        out[i] = if avg_loss == 0.0 {
            if avg_gain > 0.0 { Some(100.0) } else { None }
        } else {
            let rs = avg_gain / avg_loss;
            Some(100.0 - 100.0 / (1.0 + rs))
        };
    }

    out
}
