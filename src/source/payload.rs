use chrono::DateTime;
use error_stack::{Report, bail};
use serde::Deserialize;
use serde_json::Value;

use crate::error::SourceError;
use crate::model::PriceBar;

/// Largest accepted price or volume magnitude. Keeps the sums taken over a
/// series of bars finite.
const MAX_MAGNITUDE: f64 = 1e15;

/// Price-history response body: `{ "candles": [...], "symbol": "...", "empty": false }`
#[derive(Debug, Deserialize)]
pub(crate) struct PriceHistory {
    #[serde(default)]
    candles: Vec<RawCandle>,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    empty: bool,
}

/// Numeric fields are kept raw: providers send numbers, numeric strings, or
/// occasionally garbage, and garbage must be reported by bar and field.
#[derive(Debug, Deserialize)]
struct RawCandle {
    #[serde(default)]
    open: Value,
    #[serde(default)]
    high: Value,
    #[serde(default)]
    low: Value,
    #[serde(default)]
    close: Value,
    #[serde(default)]
    volume: Value,
    /// ms epoch
    #[serde(default)]
    datetime: Value,
}

impl PriceHistory {
    /// Convert into bars sorted oldest first.
    pub(crate) fn into_bars(self, ticker: &str) -> Result<Vec<PriceBar>, Report<SourceError>> {
        let other_symbol = self
            .symbol
            .as_deref()
            .filter(|symbol| !symbol.eq_ignore_ascii_case(ticker));
        if let Some(symbol) = other_symbol {
            return Err(Report::new(SourceError::DataUnavailable {
                ticker: ticker.to_owned(),
            })
            .attach(format!("payload is for {symbol}")));
        }
        if self.empty || self.candles.is_empty() {
            bail!(SourceError::DataUnavailable {
                ticker: ticker.to_owned(),
            });
        }

        let mut bars = self
            .candles
            .into_iter()
            .enumerate()
            .map(|(index, raw)| raw.into_bar(index))
            .collect::<Result<Vec<_>, _>>()?;
        bars.sort_by_key(|b| b.open_time);
        Ok(bars)
    }
}

impl RawCandle {
    fn into_bar(self, index: usize) -> Result<PriceBar, Report<SourceError>> {
        let number = |value: &Value, field: &str| -> Result<f64, Report<SourceError>> {
            let parsed = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            match parsed {
                Some(v) if v.is_finite() && v.abs() <= MAX_MAGNITUDE => Ok(v),
                _ => Err(Report::new(SourceError::MalformedField {
                    index,
                    field: field.to_owned(),
                })
                .attach(format!("raw value: {value}"))),
            }
        };

        let volume = number(&self.volume, "volume")?;
        if volume < 0.0 {
            bail!(SourceError::MalformedField {
                index,
                field: "volume".into(),
            });
        }

        let millis = number(&self.datetime, "datetime")? as i64;
        let Some(open_time) = DateTime::from_timestamp_millis(millis) else {
            bail!(SourceError::MalformedField {
                index,
                field: "datetime".into(),
            });
        };

        Ok(PriceBar {
            open_time,
            open: number(&self.open, "open")?,
            high: number(&self.high, "high")?,
            low: number(&self.low, "low")?,
            close: number(&self.close, "close")?,
            volume,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> PriceHistory {
        serde_json::from_str(json).expect("parse failed")
    }

    #[test]
    fn numbers_and_numeric_strings_parse() {
        let history = parse(
            r#"{"symbol":"AAPL","empty":false,"candles":[
                {"open":1.0,"high":2.0,"low":0.5,"close":1.5,"volume":100,"datetime":1704067200000},
                {"open":"1.5","high":"2.5","low":"1.0","close":"2.0","volume":"250","datetime":1704153600000}
            ]}"#,
        );
        let bars = history.into_bars("AAPL").unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 1.5);
        assert_eq!(bars[1].volume, 250.0);
    }

    #[test]
    fn bars_sorted_oldest_first() {
        let history = parse(
            r#"{"candles":[
                {"open":2,"high":2,"low":2,"close":2,"volume":1,"datetime":1704153600000},
                {"open":1,"high":1,"low":1,"close":1,"volume":1,"datetime":1704067200000}
            ]}"#,
        );
        let bars = history.into_bars("AAPL").unwrap();
        assert_eq!(bars[0].close, 1.0);
        assert_eq!(bars[1].close, 2.0);
    }

    #[test]
    fn malformed_field_names_index_and_field() {
        let history = parse(
            r#"{"candles":[
                {"open":1,"high":1,"low":1,"close":1,"volume":1,"datetime":1704067200000},
                {"open":1,"high":"n/a","low":1,"close":1,"volume":1,"datetime":1704153600000}
            ]}"#,
        );
        let err = history.into_bars("AAPL").unwrap_err();
        assert!(matches!(
            err.current_context(),
            SourceError::MalformedField { index: 1, field } if field == "high"
        ));
        assert_eq!(
            err.current_context().to_string(),
            "bar 1: field `high` is not a number"
        );
    }

    #[test]
    fn missing_and_non_finite_fields_are_malformed() {
        let history = parse(r#"{"candles":[{"open":1,"high":1,"low":1,"close":"NaN","volume":1,"datetime":0}]}"#);
        assert!(matches!(
            history.into_bars("AAPL").unwrap_err().current_context(),
            SourceError::MalformedField { field, .. } if field == "close"
        ));

        let history = parse(r#"{"candles":[{"open":1,"high":1,"low":1,"close":1,"datetime":0}]}"#);
        assert!(matches!(
            history.into_bars("AAPL").unwrap_err().current_context(),
            SourceError::MalformedField { field, .. } if field == "volume"
        ));
    }

    #[test]
    fn negative_or_huge_volume_is_malformed() {
        for volume in ["-5", "1e307"] {
            let history = parse(&format!(
                r#"{{"candles":[{{"open":1,"high":1,"low":1,"close":1,"volume":{volume},"datetime":0}}]}}"#
            ));
            assert!(matches!(
                history.into_bars("AAPL").unwrap_err().current_context(),
                SourceError::MalformedField { index: 0, field } if field == "volume"
            ));
        }
    }

    #[test]
    fn empty_payload_is_data_unavailable() {
        let err = parse(r#"{"candles":[],"symbol":"AAPL","empty":true}"#)
            .into_bars("AAPL")
            .unwrap_err();
        assert!(matches!(
            err.current_context(),
            SourceError::DataUnavailable { ticker } if ticker == "AAPL"
        ));
    }

    #[test]
    fn symbol_mismatch_is_data_unavailable() {
        let history = parse(
            r#"{"symbol":"MSFT","candles":[{"open":1,"high":1,"low":1,"close":1,"volume":1,"datetime":0}]}"#,
        );
        assert!(history.into_bars("AAPL").is_err());
    }
}
