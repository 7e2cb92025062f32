use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::indicator::ma::{Ema, EmaMode};
use crate::indicator::{Indicator, close_prices, spread};
use crate::model::{PriceBar, Reading};

/// MACD line: fast EMA minus slow EMA, index by index.
pub struct Macd {
    fast_period: usize,
    slow_period: usize,
    mode: EmaMode,
}

impl Macd {
    pub fn new(
        fast_period: usize,
        slow_period: usize,
        mode: EmaMode,
    ) -> Result<Self, Report<IndicatorError>> {
        if fast_period == 0 || slow_period == 0 {
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
            fast_period,
            slow_period,
            mode,
        })
    }
}

impl Indicator for Macd {
    type Output = Reading;

    fn name(&self) -> &'static str {
        "macd"
    }

    fn warm_up(&self) -> usize {
        self.slow_period
    }

    fn calculate(&self, bars: &[PriceBar]) -> Result<Vec<Reading>, Report<IndicatorError>> {
        let prices = close_prices(bars);

        let fast_ema = Ema::with_mode(self.fast_period, self.mode)?.calculate_prices(&prices);
        let slow_ema = Ema::with_mode(self.slow_period, self.mode)?.calculate_prices(&prices);

        Ok(spread(&fast_ema, &slow_ema))
    }
}
