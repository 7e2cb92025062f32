use error_stack::Report;
use serde::Serialize;

use crate::error::IndicatorError;
use crate::indicator::Indicator;
use crate::model::PriceBar;

/// Classic floor-trader levels for one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PivotLevels {
    pub pivot: f64,
    /// R1, R2, R3
    pub resistance: [f64; 3],
    /// S1, S2, S3
    pub support: [f64; 3],
}

impl PivotLevels {
    pub fn from_bar(bar: &PriceBar) -> Self {
        let (high, low) = (bar.high, bar.low);
        let pivot = bar.typical_price();
        let range = high - low;
        Self {
            pivot,
            resistance: [2.0 * pivot - low, pivot + range, high + 2.0 * (pivot - low)],
            support: [2.0 * pivot - high, pivot - range, low - 2.0 * (high - pivot)],
        }
    }
}

/// Pivot points need no history, so there is no warm-up.
pub struct PivotPoints;

impl Indicator for PivotPoints {
    type Output = PivotLevels;

    fn name(&self) -> &'static str {
        "pivot"
    }

    fn warm_up(&self) -> usize {
        0
    }

    fn calculate(&self, bars: &[PriceBar]) -> Result<Vec<PivotLevels>, Report<IndicatorError>> {
        Ok(bars.iter().map(PivotLevels::from_bar).collect())
    }
}
