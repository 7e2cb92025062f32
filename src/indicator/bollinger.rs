use std::collections::VecDeque;

use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::indicator::ma::WindowedMean;
use crate::indicator::{Indicator, typical_prices};
use crate::model::{Bands, PriceBar, Reading};

/// Bollinger Bands over typical price.
///
/// The middle band is the `period` SMA (window `[i - period, i)`); the
/// deviation is the sample standard deviation of the trailing `period + 1`
/// typical prices ending at `i`.
pub struct BollingerBands {
    period: usize,
    std_dev_multiplier: f64,
}

impl BollingerBands {
    pub fn new(period: usize, std_dev_multiplier: f64) -> Result<Self, Report<IndicatorError>> {
        if period < 2 {
            bail!(IndicatorError::InvalidParameter {
                name: "period must be >= 2".into(),
            });
        }
        if !(std_dev_multiplier.is_finite() && std_dev_multiplier > 0.0) {
            bail!(IndicatorError::InvalidParameter {
                name: "std_dev_multiplier must be finite and > 0".into(),
            });
        }
        Ok(Self {
            period,
            std_dev_multiplier,
        })
    }
}

impl Indicator for BollingerBands {
    type Output = Bands;

    fn name(&self) -> &'static str {
        "bollinger"
    }

    fn warm_up(&self) -> usize {
        self.period
    }

    fn calculate(&self, bars: &[PriceBar]) -> Result<Vec<Bands>, Report<IndicatorError>> {
        let prices = typical_prices(bars);
        let sma = WindowedMean::sma(self.period)?.calculate_prices(&prices);

        let mut window = VecDeque::with_capacity(self.period + 2);
        let mut bands = Vec::with_capacity(prices.len());

        for (&price, middle) in prices.iter().zip(&sma) {
            window.push_back(price);
            if window.len() > self.period + 1 {
                window.pop_front();
            }

            let Some(middle) = middle.value() else {
                bands.push(Bands::default());
                continue;
            };

            let offset = self.std_dev_multiplier * sample_std_dev(&window);
            bands.push(Bands {
                upper: Reading::finite(middle + offset),
                mid: Reading::Value(middle),
                lower: Reading::finite(middle - offset),
            });
        }

        Ok(bands)
    }
}

/// Requires at least two samples; guaranteed by `period >= 2`.
fn sample_std_dev(window: &VecDeque<f64>) -> f64 {
    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    let variance = window.iter().map(|&p| (p - mean).powi(2)).sum::<f64>() / (n - 1.0);
    variance.sqrt()
}
