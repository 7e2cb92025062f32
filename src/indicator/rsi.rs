use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::indicator::{Indicator, close_prices};
use crate::model::{PriceBar, Reading};

/// RSI (Relative Strength Index) with Wilder-style smoothing.
///
/// Up moves (including flat ones) accumulate into a gain sequence and the
/// magnitude of down moves into a loss sequence. Once enough deltas exist,
/// each average is the mean of the latest `period - 1` entries blended with
/// the current move; otherwise it falls back to the plain mean.
pub struct Rsi {
    period: usize,
}

impl Rsi {
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        if period == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "period must be > 0".into(),
            });
        }
        Ok(Self { period })
    }
}

impl Indicator for Rsi {
    type Output = Reading;

    fn name(&self) -> &'static str {
        "rsi"
    }

    fn warm_up(&self) -> usize {
        self.period + 1
    }

    fn calculate(&self, bars: &[PriceBar]) -> Result<Vec<Reading>, Report<IndicatorError>> {
        let prices = close_prices(bars);
        let smoothing = self.period - 1;

        let mut gains = Vec::new();
        let mut losses = Vec::new();
        let mut results = vec![Reading::Pending; prices.len()];

        for i in 1..prices.len() {
            let delta = prices[i] - prices[i - 1];
            if delta < 0.0 {
                losses.push(-delta);
            } else {
                gains.push(delta);
            }

            if i > self.period {
                let avg_gain = smoothed_average(&gains, i, smoothing, delta.max(0.0));
                let avg_loss = smoothed_average(&losses, i, smoothing, (-delta).max(0.0));
                results[i] = Reading::finite(rsi_value(avg_gain, avg_loss));
            }
        }

        Ok(results)
    }
}

fn smoothed_average(entries: &[f64], i: usize, smoothing: usize, latest: f64) -> f64 {
    if entries.len() >= i - smoothing {
        let recent = &entries[entries.len().saturating_sub(smoothing)..];
        (mean(recent) * smoothing as f64 + latest) / (smoothing + 1) as f64
    } else {
        mean(entries)
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Zero average loss clamps to 100 rather than dividing by zero.
fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}
