use error_stack::Report;
use serde::Deserialize;

use crate::error::IndicatorError;
use crate::indicator::Indicator;
use crate::model::{PriceBar, Reading};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VwapMode {
    /// `Σ(tp · volume) / Σ volume` from the first bar up to the current one.
    #[default]
    Cumulative,
    /// `(tp · volume) / volume` of the current bar alone, which reduces to the
    /// typical price.
    PerBar,
}

/// Volume-weighted average price.
///
/// A zero denominator or an overflowing sum yields [`Reading::Undefined`].
pub struct Vwap {
    mode: VwapMode,
}

impl Vwap {
    pub fn new(mode: VwapMode) -> Self {
        Self { mode }
    }
}

impl Indicator for Vwap {
    type Output = Reading;

    fn name(&self) -> &'static str {
        "vwap"
    }

    fn warm_up(&self) -> usize {
        0
    }

    fn calculate(&self, bars: &[PriceBar]) -> Result<Vec<Reading>, Report<IndicatorError>> {
        let mut cumulative_pv = 0.0;
        let mut cumulative_volume = 0.0;

        Ok(bars
            .iter()
            .map(|bar| {
                let pv = bar.typical_price() * bar.volume;
                let (numerator, denominator) = match self.mode {
                    VwapMode::Cumulative => {
                        cumulative_pv += pv;
                        cumulative_volume += bar.volume;
                        (cumulative_pv, cumulative_volume)
                    }
                    VwapMode::PerBar => (pv, bar.volume),
                };
                if denominator == 0.0 {
                    Reading::Undefined
                } else {
                    Reading::finite(numerator / denominator)
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::bars_from_closes;

    #[test]
    fn cumulative_weights_by_volume() {
        let mut bars = bars_from_closes(&[10.0, 20.0]);
        bars[0].volume = 1.0;
        bars[1].volume = 3.0;
        let readings = Vwap::new(VwapMode::Cumulative).calculate(&bars).unwrap();
        assert_eq!(readings[0], Reading::Value(10.0));
        // (10 * 1 + 20 * 3) / 4
        assert!((readings[1].value().unwrap() - 17.5).abs() < 1e-9);
    }

    #[test]
    fn per_bar_is_typical_price() {
        let mut bars = bars_from_closes(&[10.0, 20.0]);
        bars[1].volume = 7.0;
        let readings = Vwap::new(VwapMode::PerBar).calculate(&bars).unwrap();
        assert!((readings[0].value().unwrap() - 10.0).abs() < 1e-9);
        assert!((readings[1].value().unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn zero_volume_is_undefined() {
        let mut bars = bars_from_closes(&[10.0, 20.0]);
        bars[0].volume = 0.0;
        let cumulative = Vwap::new(VwapMode::Cumulative).calculate(&bars).unwrap();
        assert_eq!(cumulative[0], Reading::Undefined);
        // volume arrives on the next bar, so the cumulative form recovers
        assert!((cumulative[1].value().unwrap() - 20.0).abs() < 1e-9);

        let per_bar = Vwap::new(VwapMode::PerBar).calculate(&bars).unwrap();
        assert_eq!(per_bar[0], Reading::Undefined);
    }

    #[test]
    fn overflowing_sum_is_undefined() {
        let mut bars = bars_from_closes(&[10.0, 20.0]);
        bars[0].volume = 1e307;
        bars[1].volume = 1e307;
        let readings = Vwap::new(VwapMode::Cumulative).calculate(&bars).unwrap();
        assert!((readings[0].value().unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(readings[1], Reading::Undefined);
    }

    #[test]
    fn vwap_mode_deserializes_snake_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            mode: VwapMode,
        }
        let w: Wrapper = toml::from_str(r#"mode = "per_bar""#).unwrap();
        assert_eq!(w.mode, VwapMode::PerBar);
    }
}
