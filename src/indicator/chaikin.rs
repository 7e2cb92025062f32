use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::indicator::ma::{Ema, EmaMode};
use crate::indicator::{Indicator, spread};
use crate::model::{PriceBar, Reading};

/// Chaikin oscillator: fast EMA minus slow EMA of a synthetic
/// accumulation/distribution series.
///
/// A bar with `high == low` has no money-flow multiplier. It contributes zero
/// flow to the EMAs and its own cell is reported as [`Reading::Undefined`].
pub struct Chaikin {
    period: usize,
    fast_period: usize,
    slow_period: usize,
    mode: EmaMode,
}

impl Chaikin {
    pub fn new(
        period: usize,
        fast_period: usize,
        slow_period: usize,
        mode: EmaMode,
    ) -> Result<Self, Report<IndicatorError>> {
        if period == 0 || fast_period == 0 || slow_period == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "all periods must be > 0".into(),
            });
        }
        if fast_period >= slow_period {
            bail!(IndicatorError::InvalidParameter {
                name: "fast_period must be < slow_period".into(),
            });
        }
        Ok(Self {
            period,
            fast_period,
            slow_period,
            mode,
        })
    }

    /// Per-bar synthetic flow value, `None` when the bar has zero range.
    fn flow(&self, bar: &PriceBar) -> Option<f64> {
        let range = bar.high - bar.low;
        if range == 0.0 {
            return None;
        }
        let p = self.period as f64;
        let multiplier = ((bar.close - bar.low) - (bar.high - bar.close)) / range;
        let flow_volume = multiplier * bar.volume * p;
        Some(flow_volume * (p - 1.0) + flow_volume * p)
    }
}

impl Indicator for Chaikin {
    type Output = Reading;

    fn name(&self) -> &'static str {
        "chaikin"
    }

    fn warm_up(&self) -> usize {
        self.slow_period
    }

    fn calculate(&self, bars: &[PriceBar]) -> Result<Vec<Reading>, Report<IndicatorError>> {
        let flows: Vec<Option<f64>> = bars.iter().map(|b| self.flow(b)).collect();
        let synthetic: Vec<f64> = flows.iter().map(|f| f.unwrap_or(0.0)).collect();

        let fast_ema = Ema::with_mode(self.fast_period, self.mode)?.calculate_prices(&synthetic);
        let slow_ema = Ema::with_mode(self.slow_period, self.mode)?.calculate_prices(&synthetic);

        Ok(spread(&fast_ema, &slow_ema)
            .into_iter()
            .zip(&flows)
            .map(|(reading, flow)| match (reading, flow) {
                (Reading::Value(_), None) => Reading::Undefined,
                _ => reading,
            })
            .collect())
    }
}
