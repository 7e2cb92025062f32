use error_stack::{Report, bail};
use serde::Deserialize;

use crate::error::IndicatorError;
use crate::indicator::{Indicator, close_prices};
use crate::model::{PriceBar, Reading};

/// Which price a windowed mean averages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSource {
    /// `(high + low + close) / 3`
    Typical,
    Close,
}

impl PriceSource {
    pub fn extract(self, bar: &PriceBar) -> f64 {
        match self {
            Self::Typical => bar.typical_price(),
            Self::Close => bar.close,
        }
    }
}

/// Trailing mean over the `period` bars *before* each index, `[i - period, i)`.
///
/// The SMA variant averages typical price, the lookback ("RMA") variant
/// averages close.
pub struct WindowedMean {
    period: usize,
    source: PriceSource,
}

impl WindowedMean {
    pub fn new(period: usize, source: PriceSource) -> Result<Self, Report<IndicatorError>> {
        if period == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "period must be > 0".into(),
            });
        }
        Ok(Self { period, source })
    }

    pub fn sma(period: usize) -> Result<Self, Report<IndicatorError>> {
        Self::new(period, PriceSource::Typical)
    }

    pub fn lookback(period: usize) -> Result<Self, Report<IndicatorError>> {
        Self::new(period, PriceSource::Close)
    }

    /// Calculate the windowed mean from a price slice (internal helper).
    pub fn calculate_prices(&self, prices: &[f64]) -> Vec<Reading> {
        let warm_up = prices.len().min(self.period);
        let mut results = vec![Reading::Pending; warm_up];
        results.extend(
            prices
                .windows(self.period)
                .take(prices.len() - warm_up)
                .map(|w| Reading::finite(w.iter().sum::<f64>() / self.period as f64)),
        );
        results
    }
}

impl Indicator for WindowedMean {
    type Output = Reading;

    fn name(&self) -> &'static str {
        match self.source {
            PriceSource::Typical => "sma",
            PriceSource::Close => "rma",
        }
    }

    fn warm_up(&self) -> usize {
        self.period
    }

    fn calculate(&self, bars: &[PriceBar]) -> Result<Vec<Reading>, Report<IndicatorError>> {
        let prices: Vec<f64> = bars.iter().map(|b| self.source.extract(b)).collect();
        Ok(self.calculate_prices(&prices))
    }
}

/// EMA recurrence flavour.
///
/// `Legacy` reproduces an older pipeline: an odd seed and every step pulling
/// toward the *last* close of the whole series instead of the current one.
/// It reads future bars and is only kept for output compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmaMode {
    #[default]
    Conventional,
    Legacy,
}

/// Exponential Moving Average.
pub struct Ema {
    period: usize,
    mode: EmaMode,
}

impl Ema {
    #[cfg(test)]
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        Self::with_mode(period, EmaMode::Conventional)
    }

    pub fn with_mode(period: usize, mode: EmaMode) -> Result<Self, Report<IndicatorError>> {
        if period == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "period must be > 0".into(),
            });
        }
        Ok(Self { period, mode })
    }

    /// Calculate EMA values from a price slice (internal helper).
    ///
    /// Used directly by MACD and Chaikin, which feed derived series.
    pub fn calculate_prices(&self, prices: &[f64]) -> Vec<Reading> {
        let mut results = vec![Reading::Pending; prices.len()];
        if prices.len() <= self.period {
            return results;
        }

        let n = self.period as f64;
        let k = 2.0 / (n + 1.0);

        match self.mode {
            EmaMode::Conventional => {
                // Seed with SMA of the `period` values preceding the first output
                let mut ema = prices[..self.period].iter().sum::<f64>() / n;
                for (i, &price) in prices.iter().enumerate().skip(self.period) {
                    ema = (price - ema) * k + ema;
                    results[i] = Reading::finite(ema);
                }
            }
            EmaMode::Legacy => {
                let last = prices[prices.len() - 1];
                let mut raw = vec![0.0; prices.len()];
                for i in self.period..prices.len() {
                    raw[i] = if i == self.period {
                        // n - 1 closes summed, divided by n
                        let seed = prices[i - self.period..i - 1].iter().sum::<f64>() / n;
                        (prices[i - 1] - seed) * (k + seed)
                    } else {
                        (last - raw[i - 2]) * k + raw[i - 2]
                    };
                    results[i] = Reading::finite(raw[i]);
                }
            }
        }

        results
    }
}

impl Indicator for Ema {
    type Output = Reading;

    fn name(&self) -> &'static str {
        "ema"
    }

    fn warm_up(&self) -> usize {
        self.period
    }

    fn calculate(&self, bars: &[PriceBar]) -> Result<Vec<Reading>, Report<IndicatorError>> {
        Ok(self.calculate_prices(&close_prices(bars)))
    }
}
