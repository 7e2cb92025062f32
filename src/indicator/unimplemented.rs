use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::indicator::Indicator;
use crate::model::{PriceBar, Reading};

/// Indicators that have a record slot but no algorithm yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unimplemented {
    /// Intraday Momentum Index
    Imi,
    /// Money Flow Index
    Mfi,
    /// Put/Call Ratio
    Pcr,
    OpenInterest,
}

impl Unimplemented {
    pub const ALL: [Self; 4] = [Self::Imi, Self::Mfi, Self::Pcr, Self::OpenInterest];
}

impl Indicator for Unimplemented {
    type Output = Reading;

    fn name(&self) -> &'static str {
        match self {
            Self::Imi => "imi",
            Self::Mfi => "mfi",
            Self::Pcr => "pcr",
            Self::OpenInterest => "oi",
        }
    }

    fn warm_up(&self) -> usize {
        0
    }

    fn calculate(&self, _bars: &[PriceBar]) -> Result<Vec<Reading>, Report<IndicatorError>> {
        bail!(IndicatorError::NotImplemented {
            indicator: self.name().into(),
        })
    }
}
