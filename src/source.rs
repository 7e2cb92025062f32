pub mod file;
pub mod http;
mod payload;

use error_stack::{Report, bail};
use futures::future::BoxFuture;

use crate::error::SourceError;
use crate::model::{FrequencyType, PeriodType, PriceBar};

/// What to fetch: one ticker over a span of history at a bar frequency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarRequest {
    pub ticker: String,
    pub period_type: PeriodType,
    pub period: u32,
    pub frequency_type: FrequencyType,
    pub frequency: u32,
}

impl BarRequest {
    /// Build a request from command-line strings and validate it.
    pub fn parse(
        ticker: &str,
        period_type: &str,
        period: u32,
        frequency_type: &str,
        frequency: u32,
    ) -> Result<Self, Report<SourceError>> {
        let Some(period_type) = PeriodType::from_str(period_type) else {
            bail!(SourceError::InvalidRequest {
                reason: format!("unknown period type \"{period_type}\""),
            });
        };
        let Some(frequency_type) = FrequencyType::from_str(frequency_type) else {
            bail!(SourceError::InvalidRequest {
                reason: format!("unknown frequency type \"{frequency_type}\""),
            });
        };

        let request = Self {
            ticker: ticker.trim().to_uppercase(),
            period_type,
            period,
            frequency_type,
            frequency,
        };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), Report<SourceError>> {
        if self.ticker.is_empty() {
            bail!(SourceError::InvalidRequest {
                reason: "ticker must not be empty".into(),
            });
        }
        if self.period == 0 || self.frequency == 0 {
            bail!(SourceError::InvalidRequest {
                reason: "period and frequency must be > 0".into(),
            });
        }
        if !self
            .period_type
            .valid_frequencies()
            .contains(&self.frequency_type)
        {
            bail!(SourceError::InvalidRequest {
                reason: format!(
                    "frequency type {} is not valid for period type {}",
                    self.frequency_type, self.period_type
                ),
            });
        }
        Ok(())
    }
}

/// Abstraction over a provider of historical price bars.
///
/// Uses `BoxFuture` (from `futures` crate) instead of `async fn` in trait
/// to keep the trait object-safe (`dyn BarSource`).
pub trait BarSource: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch bars for `request`, oldest first.
    fn fetch_bars(
        &self,
        request: &BarRequest,
    ) -> BoxFuture<'_, Result<Vec<PriceBar>, Report<SourceError>>>;
}
