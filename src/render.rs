use std::io::Write;

use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::error::RenderError;
use crate::model::IndicatorRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// One line per record.
    #[default]
    Text,
    /// A pretty-printed JSON array.
    Json,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

pub fn render(
    records: &[IndicatorRecord],
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<(), Report<RenderError>> {
    match format {
        OutputFormat::Text => {
            for (i, record) in records.iter().enumerate() {
                writeln!(out, "{}", text_line(i, record)).change_context(RenderError::Write)?;
            }
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, records).change_context(RenderError::Write)?;
            writeln!(out).change_context(RenderError::Write)?;
        }
    }
    Ok(())
}

fn text_line(index: usize, r: &IndicatorRecord) -> String {
    format!(
        "#{index:<4} close={:.4} high={:.4} low={:.4} volume={} \
         pivot={:.4} R=[{:.4} {:.4} {:.4}] S=[{:.4} {:.4} {:.4}] \
         sma={} rma={} ema={} rsi={} vwap={} macd={} chaikin={} \
         bb=[{} {} {}] imi={} mfi={} pcr={} oi={}",
        r.close,
        r.high,
        r.low,
        r.volume,
        r.pivot_point,
        r.resistance[0],
        r.resistance[1],
        r.resistance[2],
        r.support[0],
        r.support[1],
        r.support[2],
        r.sma,
        r.rma,
        r.ema,
        r.rsi,
        r.vwap,
        r.macd,
        r.chaikin,
        r.bollinger.upper,
        r.bollinger.mid,
        r.bollinger.lower,
        r.imi,
        r.mfi,
        r.pcr,
        r.oi,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::bars_from_closes;
    use crate::model::{Reading, init_records};

    fn records() -> Vec<IndicatorRecord> {
        let mut records = init_records(&bars_from_closes(&[10.0, 11.0, 12.0]));
        records[1].vwap = Reading::Undefined;
        records[2].rsi = Reading::Value(55.5);
        records
    }

    #[test]
    fn text_has_one_line_per_record() {
        let mut out = Vec::new();
        render(&records(), OutputFormat::Text, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("#0"));
        assert!(lines[0].contains("rsi=0 "));
        assert!(lines[1].contains("vwap=undefined"));
        assert!(lines[2].contains("rsi=55.5000"));
        assert!(lines[2].contains("imi=unsupported"));
    }

    #[test]
    fn json_is_an_array_of_records() {
        let mut out = Vec::new();
        render(&records(), OutputFormat::Json, &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        let array = value.as_array().unwrap();
        assert_eq!(array.len(), 3);
        assert_eq!(array[1]["vwap"], "undefined");
        assert_eq!(array[2]["rsi"], 55.5);
        assert_eq!(array[0]["bollinger"]["upper"], 0.0);
    }

    #[test]
    fn output_format_parses() {
        assert_eq!(OutputFormat::from_str("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str("yaml"), None);
    }
}
