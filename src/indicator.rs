pub mod bollinger;
pub mod chaikin;
pub mod ma;
pub mod macd;
pub mod pivot;
pub mod rsi;
pub mod unimplemented;
pub mod vwap;

use error_stack::Report;

use crate::error::IndicatorError;
use crate::model::{PriceBar, Reading};

/// A technical analysis indicator that operates on a slice of bars.
///
/// Bars must be in ascending chronological order (oldest first). Every
/// indicator returns exactly one output per input bar; leading bars inside
/// the warm-up window are reported as [`Reading::Pending`].
pub trait Indicator: Send + Sync {
    type Output;

    /// Unique name of this indicator (e.g., "rsi", "sma").
    fn name(&self) -> &'static str;

    /// Number of leading bars that cannot produce a value.
    fn warm_up(&self) -> usize;

    fn calculate(&self, bars: &[PriceBar]) -> Result<Vec<Self::Output>, Report<IndicatorError>>;
}

/// Extract close prices from a slice of bars.
pub fn close_prices(bars: &[PriceBar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// Extract typical prices `(high + low + close) / 3` from a slice of bars.
pub fn typical_prices(bars: &[PriceBar]) -> Vec<f64> {
    bars.iter().map(PriceBar::typical_price).collect()
}

/// Index-aligned difference of two columns.
///
/// A cell is a value only where both inputs are values and the difference
/// is finite; `Undefined` wins over `Pending`.
pub fn spread(minuend: &[Reading], subtrahend: &[Reading]) -> Vec<Reading> {
    minuend
        .iter()
        .zip(subtrahend)
        .map(|(a, b)| match (a.value(), b.value()) {
            (Some(a), Some(b)) => Reading::finite(a - b),
            _ if *a == Reading::Undefined || *b == Reading::Undefined => Reading::Undefined,
            _ => Reading::Pending,
        })
        .collect()
}

/// Synthetic bars for tests.
///
/// high = close + 1, low = close - 1, volume = 1000, one day apart.
#[cfg(test)]
pub fn bars_from_closes(closes: &[f64]) -> Vec<PriceBar> {
    use chrono::{TimeZone, Utc};

    let base = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| PriceBar {
            open_time: base + chrono::Duration::days(i as i64),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000.0,
        })
        .collect()
}

/// A deterministic zig-zag price path with drift, for property-style tests.
#[cfg(test)]
pub fn zigzag_closes(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| {
            let swing = ((i * 7919) % 13) as f64 - 6.0;
            100.0 + i as f64 * 0.5 + swing
        })
        .collect()
}
