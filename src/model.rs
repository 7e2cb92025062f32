use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Span of history requested from a bar source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeriodType {
    Day,
    Month,
    Year,
    Ytd,
}

impl PeriodType {
    /// Parse a command-line string into a `PeriodType`.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "day" => Some(Self::Day),
            "month" => Some(Self::Month),
            "year" => Some(Self::Year),
            "ytd" => Some(Self::Ytd),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Month => "month",
            Self::Year => "year",
            Self::Ytd => "ytd",
        }
    }

    /// Frequency types a provider accepts for this period type.
    pub fn valid_frequencies(self) -> &'static [FrequencyType] {
        match self {
            Self::Day => &[FrequencyType::Minute],
            Self::Month => &[FrequencyType::Daily, FrequencyType::Weekly],
            Self::Year => &[
                FrequencyType::Daily,
                FrequencyType::Weekly,
                FrequencyType::Monthly,
            ],
            Self::Ytd => &[FrequencyType::Daily, FrequencyType::Weekly],
        }
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Width of a single bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrequencyType {
    Minute,
    Daily,
    Weekly,
    Monthly,
}

impl FrequencyType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "minute" => Some(Self::Minute),
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

impl fmt::Display for FrequencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One OHLCV bar as delivered by a bar source.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// `(high + low + close) / 3`
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// A single indicator cell.
///
/// `Pending` is the warm-up sentinel and reports as zero. `Undefined` marks
/// a numerically degenerate input (zero range, zero volume) and
/// `Unsupported` an indicator that has no algorithm yet; neither is ever
/// rendered as a number.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Reading {
    #[default]
    Pending,
    Value(f64),
    Undefined,
    Unsupported,
}

impl Reading {
    /// `Value(v)` when `v` is finite, `Undefined` otherwise.
    pub fn finite(v: f64) -> Self {
        if v.is_finite() {
            Self::Value(v)
        } else {
            Self::Undefined
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Numeric view with the warm-up sentinel as `0.0`.
    pub fn or_zero(self) -> Option<f64> {
        match self {
            Self::Pending => Some(0.0),
            Self::Value(v) => Some(v),
            Self::Undefined | Self::Unsupported => None,
        }
    }

    pub fn is_pending(self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "0"),
            Self::Value(v) => write!(f, "{v:.4}"),
            Self::Undefined => write!(f, "undefined"),
            Self::Unsupported => write!(f, "unsupported"),
        }
    }
}

impl Serialize for Reading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.or_zero() {
            Some(v) => serializer.serialize_f64(v),
            None if *self == Self::Undefined => serializer.serialize_str("undefined"),
            None => serializer.serialize_str("unsupported"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Bands {
    pub upper: Reading,
    pub mid: Reading,
    pub lower: Reading,
}

/// Per-bar output row, index-aligned with the input bars.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorRecord {
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: f64,
    pub pivot_point: f64,
    pub resistance: [f64; 3],
    pub support: [f64; 3],
    pub sma: Reading,
    pub rma: Reading,
    pub ema: Reading,
    pub rsi: Reading,
    pub vwap: Reading,
    pub macd: Reading,
    pub chaikin: Reading,
    pub bollinger: Bands,
    pub imi: Reading,
    pub mfi: Reading,
    pub pcr: Reading,
    pub oi: Reading,
}

impl IndicatorRecord {
    pub fn from_bar(bar: &PriceBar) -> Self {
        Self {
            close: bar.close,
            high: bar.high,
            low: bar.low,
            volume: bar.volume,
            pivot_point: 0.0,
            resistance: [0.0; 3],
            support: [0.0; 3],
            sma: Reading::Pending,
            rma: Reading::Pending,
            ema: Reading::Pending,
            rsi: Reading::Pending,
            vwap: Reading::Pending,
            macd: Reading::Pending,
            chaikin: Reading::Pending,
            bollinger: Bands::default(),
            imi: Reading::Unsupported,
            mfi: Reading::Unsupported,
            pcr: Reading::Unsupported,
            oi: Reading::Unsupported,
        }
    }
}

pub fn init_records(bars: &[PriceBar]) -> Vec<IndicatorRecord> {
    bars.iter().map(IndicatorRecord::from_bar).collect()
}
