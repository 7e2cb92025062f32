use std::num::NonZeroU32;
use std::sync::Arc;

use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use tracing::info;

use crate::error::SourceError;
use crate::model::PriceBar;
use crate::source::payload::PriceHistory;
use crate::source::{BarRequest, BarSource};

pub const DEFAULT_BASE_URL: &str = "https://api.tdameritrade.com";

/// Price-history REST provider: `GET /v1/marketdata/{ticker}/pricehistory`.
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl HttpSource {
    pub fn new(base_url: &str, api_key: &str, requests_per_second: u32) -> Self {
        // The price-history endpoint allows roughly 120 calls per minute per key
        let per_second = NonZeroU32::new(requests_per_second).unwrap_or(nonzero!(2u32));
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: api_key.to_owned(),
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_second(per_second))),
        }
    }

    fn endpoint(&self, ticker: &str) -> String {
        format!("{}/v1/marketdata/{}/pricehistory", self.base_url, ticker)
    }
}

impl BarSource for HttpSource {
    fn name(&self) -> &str {
        "http"
    }

    fn fetch_bars(
        &self,
        request: &BarRequest,
    ) -> BoxFuture<'_, Result<Vec<PriceBar>, Report<SourceError>>> {
        let request = request.clone();
        Box::pin(async move {
            request.validate()?;

            // Wait for rate limiter before making the request
            self.rate_limiter.until_ready().await;

            let period = request.period.to_string();
            let frequency = request.frequency.to_string();
            let params = [
                ("apikey", self.api_key.as_str()),
                ("periodType", request.period_type.as_str()),
                ("period", period.as_str()),
                ("frequencyType", request.frequency_type.as_str()),
                ("frequency", frequency.as_str()),
            ];

            let response = self
                .client
                .get(self.endpoint(&request.ticker))
                .query(&params)
                .send()
                .await
                .change_context(SourceError::Request {
                    provider: self.name().into(),
                })?;

            if !response.status().is_success() {
                return Err(Report::new(SourceError::Request {
                    provider: self.name().into(),
                })
                .attach(format!("HTTP status: {}", response.status())));
            }

            let history: PriceHistory =
                response
                    .json()
                    .await
                    .change_context(SourceError::ResponseParse {
                        provider: self.name().into(),
                    })?;

            let bars = history.into_bars(&request.ticker)?;

            info!(
                ticker = %request.ticker,
                period_type = %request.period_type,
                frequency_type = %request.frequency_type,
                fetched = bars.len(),
                "price history fetch complete"
            );

            Ok(bars)
        })
    }
}
