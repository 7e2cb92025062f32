use std::path::PathBuf;

use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use tracing::info;

use crate::error::SourceError;
use crate::model::PriceBar;
use crate::source::payload::PriceHistory;
use crate::source::{BarRequest, BarSource};

/// Reads a saved price-history payload from disk.
///
/// The file uses the same JSON shape as the HTTP provider. Period and
/// frequency in the request are validated but not applied.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl BarSource for FileSource {
    fn name(&self) -> &str {
        "file"
    }

    fn fetch_bars(
        &self,
        request: &BarRequest,
    ) -> BoxFuture<'_, Result<Vec<PriceBar>, Report<SourceError>>> {
        let request = request.clone();
        Box::pin(async move {
            request.validate()?;

            let content = tokio::fs::read_to_string(&self.path)
                .await
                .change_context(SourceError::ReadFile)
                .attach_with(|| format!("path: {}", self.path.display()))?;

            let history: PriceHistory =
                serde_json::from_str(&content).change_context(SourceError::ResponseParse {
                    provider: self.name().into(),
                })?;

            let bars = history.into_bars(&request.ticker)?;

            info!(
                ticker = %request.ticker,
                path = %self.path.display(),
                loaded = bars.len(),
                "price history loaded from file"
            );

            Ok(bars)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "bar-indicators-{}-{name}.json",
            std::process::id()
        ));
        std::fs::write(&path, content).unwrap();
        path
    }

    fn request() -> BarRequest {
        BarRequest::parse("AAPL", "month", 3, "daily", 1).unwrap()
    }

    #[tokio::test]
    async fn loads_bars_from_file() {
        let path = temp_file(
            "ok",
            r#"{"symbol":"AAPL","candles":[
                {"open":1,"high":2,"low":0.5,"close":1.5,"volume":10,"datetime":1704067200000},
                {"open":1.5,"high":3,"low":1,"close":2.5,"volume":20,"datetime":1704153600000}
            ]}"#,
        );
        let bars = FileSource::new(&path).fetch_bars(&request()).await.unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].close, 2.5);
    }

    #[tokio::test]
    async fn missing_file_is_read_error() {
        let err = FileSource::new("/nonexistent/bars.json")
            .fetch_bars(&request())
            .await
            .unwrap_err();
        assert!(matches!(err.current_context(), SourceError::ReadFile));
    }

    #[tokio::test]
    async fn invalid_json_is_parse_error() {
        let path = temp_file("bad-json", "{ not json");
        let err = FileSource::new(&path)
            .fetch_bars(&request())
            .await
            .unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(
            err.current_context(),
            SourceError::ResponseParse { .. }
        ));
    }
}
