use std::collections::HashSet;
use std::sync::Arc;

use derive_more::Display;
use error_stack::{Report, ResultExt, bail};
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{EngineError, IndicatorError};
use crate::indicator::Indicator;
use crate::indicator::bollinger::BollingerBands;
use crate::indicator::chaikin::Chaikin;
use crate::indicator::ma::{Ema, EmaMode, WindowedMean};
use crate::indicator::macd::Macd;
use crate::indicator::pivot::{PivotLevels, PivotPoints};
use crate::indicator::rsi::Rsi;
use crate::indicator::unimplemented::Unimplemented;
use crate::indicator::vwap::{Vwap, VwapMode};
use crate::model::{Bands, IndicatorRecord, PriceBar, Reading, init_records};

/// Indicator parameters for one engine. Deserialized from the
/// `[indicators]` config table; every key is optional.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub lookback_period: usize,
    pub ema_period: usize,
    pub ema_mode: EmaMode,
    pub rsi_period: usize,
    pub vwap_mode: VwapMode,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub bollinger_period: usize,
    pub bollinger_multiplier: f64,
    pub chaikin_period: usize,
    pub chaikin_fast: usize,
    pub chaikin_slow: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            lookback_period: 3,
            ema_period: 10,
            ema_mode: EmaMode::Conventional,
            rsi_period: 14,
            vwap_mode: VwapMode::Cumulative,
            macd_fast: 12,
            macd_slow: 26,
            bollinger_period: 20,
            bollinger_multiplier: 2.0,
            chaikin_period: 21,
            chaikin_fast: 3,
            chaikin_slow: 10,
        }
    }
}

/// A record field group. Each group has exactly one writer per run.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    PivotPoint,
    Resistance,
    Support,
    Sma,
    Rma,
    Ema,
    Rsi,
    Vwap,
    Macd,
    Chaikin,
    Bollinger,
    Imi,
    Mfi,
    Pcr,
    Oi,
}

/// The output of one indicator task, index-aligned with the input bars.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Pivot(Vec<PivotLevels>),
    Lookback(Vec<Reading>),
    Ema(Vec<Reading>),
    Rsi(Vec<Reading>),
    Vwap(Vec<Reading>),
    Macd(Vec<Reading>),
    /// Bands plus the SMA they are centred on.
    Bollinger(Vec<Bands>),
    Chaikin(Vec<Reading>),
    Unsupported(Unimplemented, Vec<Reading>),
}

impl Column {
    /// Record fields this column writes.
    pub fn fields(&self) -> &'static [Field] {
        match self {
            Self::Pivot(_) => &[Field::PivotPoint, Field::Resistance, Field::Support],
            Self::Lookback(_) => &[Field::Rma],
            Self::Ema(_) => &[Field::Ema],
            Self::Rsi(_) => &[Field::Rsi],
            Self::Vwap(_) => &[Field::Vwap],
            Self::Macd(_) => &[Field::Macd],
            Self::Bollinger(_) => &[Field::Sma, Field::Bollinger],
            Self::Chaikin(_) => &[Field::Chaikin],
            Self::Unsupported(kind, _) => match kind {
                Unimplemented::Imi => &[Field::Imi],
                Unimplemented::Mfi => &[Field::Mfi],
                Unimplemented::Pcr => &[Field::Pcr],
                Unimplemented::OpenInterest => &[Field::Oi],
            },
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Pivot(v) => v.len(),
            Self::Bollinger(v) => v.len(),
            Self::Lookback(v)
            | Self::Ema(v)
            | Self::Rsi(v)
            | Self::Vwap(v)
            | Self::Macd(v)
            | Self::Chaikin(v)
            | Self::Unsupported(_, v) => v.len(),
        }
    }

    /// Reading cells, one per bar. Bollinger is represented by its upper band.
    fn cells(&self) -> Box<dyn Iterator<Item = Reading> + '_> {
        match self {
            Self::Pivot(_) => Box::new(std::iter::empty()),
            Self::Bollinger(v) => Box::new(v.iter().map(|b| b.upper)),
            Self::Lookback(v)
            | Self::Ema(v)
            | Self::Rsi(v)
            | Self::Vwap(v)
            | Self::Macd(v)
            | Self::Chaikin(v)
            | Self::Unsupported(_, v) => Box::new(v.iter().copied()),
        }
    }

    fn write_into(self, records: &mut [IndicatorRecord]) {
        match self {
            Self::Pivot(levels) => {
                for (record, l) in records.iter_mut().zip(levels) {
                    record.pivot_point = l.pivot;
                    record.resistance = l.resistance;
                    record.support = l.support;
                }
            }
            Self::Bollinger(bands) => {
                for (record, b) in records.iter_mut().zip(bands) {
                    record.sma = b.mid;
                    record.bollinger = b;
                }
            }
            Self::Lookback(v) => write_readings(records, v, |r| &mut r.rma),
            Self::Ema(v) => write_readings(records, v, |r| &mut r.ema),
            Self::Rsi(v) => write_readings(records, v, |r| &mut r.rsi),
            Self::Vwap(v) => write_readings(records, v, |r| &mut r.vwap),
            Self::Macd(v) => write_readings(records, v, |r| &mut r.macd),
            Self::Chaikin(v) => write_readings(records, v, |r| &mut r.chaikin),
            Self::Unsupported(kind, v) => match kind {
                Unimplemented::Imi => write_readings(records, v, |r| &mut r.imi),
                Unimplemented::Mfi => write_readings(records, v, |r| &mut r.mfi),
                Unimplemented::Pcr => write_readings(records, v, |r| &mut r.pcr),
                Unimplemented::OpenInterest => write_readings(records, v, |r| &mut r.oi),
            },
        }
    }
}

fn write_readings(
    records: &mut [IndicatorRecord],
    readings: Vec<Reading>,
    field: impl Fn(&mut IndicatorRecord) -> &mut Reading,
) {
    for (record, reading) in records.iter_mut().zip(readings) {
        *field(record) = reading;
    }
}

type Job = Box<dyn FnOnce(&[PriceBar]) -> Result<Column, Report<IndicatorError>> + Send>;

struct Task {
    name: &'static str,
    warm_up: usize,
    job: Job,
}

impl Task {
    fn new<I>(indicator: I, column: fn(Vec<I::Output>) -> Column) -> Self
    where
        I: Indicator + 'static,
    {
        Self {
            name: indicator.name(),
            warm_up: indicator.warm_up(),
            job: Box::new(move |bars: &[PriceBar]| indicator.calculate(bars).map(column)),
        }
    }

    fn unsupported(stub: Unimplemented) -> Self {
        Self {
            name: stub.name(),
            warm_up: stub.warm_up(),
            job: Box::new(move |bars: &[PriceBar]| unsupported_column(stub, bars)),
        }
    }
}

/// Computes every indicator family over one bar sequence.
///
/// Each family runs as its own blocking task and returns a [`Column`]; the
/// columns are merged into the records only after all tasks have joined.
/// Tasks share nothing but the immutable bars.
pub struct Engine {
    settings: EngineSettings,
}

impl Engine {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    pub async fn compute(
        &self,
        bars: Vec<PriceBar>,
    ) -> Result<Vec<IndicatorRecord>, Report<EngineError>> {
        let tasks = self.tasks()?;
        let bars: Arc<[PriceBar]> = bars.into();

        let handles: Vec<(&'static str, JoinHandle<_>)> = tasks
            .into_iter()
            .map(|Task { name, warm_up, job }| {
                let bars = Arc::clone(&bars);
                let handle = tokio::task::spawn_blocking(move || {
                    debug!(indicator = name, warm_up, "indicator task started");
                    job(&*bars)
                });
                (name, handle)
            })
            .collect();

        // Join barrier: every task finishes before any record is written.
        let mut columns = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            let column = handle
                .await
                .change_context(EngineError::TaskFailed { name: name.into() })?
                .change_context(EngineError::Indicator { name: name.into() })?;
            debug!(indicator = name, "indicator task finished");
            columns.push(column);
        }

        let mut records = init_records(&bars);
        merge(&mut records, columns)?;
        Ok(records)
    }

    fn tasks(&self) -> Result<Vec<Task>, Report<EngineError>> {
        let s = &self.settings;

        let lookback = WindowedMean::lookback(s.lookback_period)
            .change_context(EngineError::Indicator { name: "rma".into() })?;
        let ema = Ema::with_mode(s.ema_period, s.ema_mode)
            .change_context(EngineError::Indicator { name: "ema".into() })?;
        let rsi = Rsi::new(s.rsi_period)
            .change_context(EngineError::Indicator { name: "rsi".into() })?;
        let macd = Macd::new(s.macd_fast, s.macd_slow, s.ema_mode)
            .change_context(EngineError::Indicator { name: "macd".into() })?;
        let bollinger = BollingerBands::new(s.bollinger_period, s.bollinger_multiplier)
            .change_context(EngineError::Indicator {
                name: "bollinger".into(),
            })?;
        let chaikin = Chaikin::new(s.chaikin_period, s.chaikin_fast, s.chaikin_slow, s.ema_mode)
            .change_context(EngineError::Indicator {
                name: "chaikin".into(),
            })?;

        let mut tasks = vec![
            Task::new(PivotPoints, Column::Pivot),
            Task::new(lookback, Column::Lookback),
            Task::new(ema, Column::Ema),
            Task::new(rsi, Column::Rsi),
            Task::new(Vwap::new(s.vwap_mode), Column::Vwap),
            Task::new(macd, Column::Macd),
            Task::new(bollinger, Column::Bollinger),
            Task::new(chaikin, Column::Chaikin),
        ];
        tasks.extend(Unimplemented::ALL.into_iter().map(Task::unsupported));

        Ok(tasks)
    }
}

/// Turns a stub's `NotImplemented` into an explicit `Unsupported` column.
fn unsupported_column(
    stub: Unimplemented,
    bars: &[PriceBar],
) -> Result<Column, Report<IndicatorError>> {
    match stub.calculate(bars) {
        Ok(readings) => Ok(Column::Unsupported(stub, readings)),
        Err(report) if matches!(report.current_context(), IndicatorError::NotImplemented { .. }) => {
            Ok(Column::Unsupported(stub, vec![Reading::Unsupported; bars.len()]))
        }
        Err(report) => Err(report),
    }
}

/// Writes columns into records, rejecting any field claimed twice.
pub fn merge(
    records: &mut [IndicatorRecord],
    columns: Vec<Column>,
) -> Result<(), Report<EngineError>> {
    let mut written = HashSet::new();
    for column in columns {
        for field in column.fields() {
            if !written.insert(*field) {
                bail!(EngineError::FieldConflict {
                    field: field.to_string(),
                });
            }
        }
        debug_assert_eq!(column.len(), records.len());
        let pending = column.cells().filter(|r| r.is_pending()).count();
        let undefined = column.cells().filter(|r| *r == Reading::Undefined).count();
        debug!(fields = ?column.fields(), pending, undefined, "column merged");
        column.write_into(records);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::{bars_from_closes, zigzag_closes};

    fn all_columns(len: usize) -> Vec<Column> {
        let readings = vec![Reading::Pending; len];
        let mut columns = vec![
            Column::Pivot(vec![]),
            Column::Lookback(readings.clone()),
            Column::Ema(readings.clone()),
            Column::Rsi(readings.clone()),
            Column::Vwap(readings.clone()),
            Column::Macd(readings.clone()),
            Column::Bollinger(vec![]),
            Column::Chaikin(readings.clone()),
        ];
        for stub in Unimplemented::ALL {
            columns.push(Column::Unsupported(stub, readings.clone()));
        }
        columns
    }

    fn varied_bars(len: usize) -> Vec<PriceBar> {
        let mut bars = bars_from_closes(&zigzag_closes(len));
        for (i, bar) in bars.iter_mut().enumerate() {
            bar.close = bar.low + 2.0 * ((i % 5) as f64 / 4.0);
            bar.volume = 1000.0 + (i * 37 % 11) as f64 * 100.0;
        }
        bars
    }

    #[test]
    fn field_ownership_is_a_partition() {
        let columns = all_columns(0);
        for (i, a) in columns.iter().enumerate() {
            for b in &columns[i + 1..] {
                for field in a.fields() {
                    assert!(
                        !b.fields().contains(field),
                        "{field} owned by {a:?} and {b:?}"
                    );
                }
            }
        }
        let owned: HashSet<Field> = columns.iter().flat_map(|c| c.fields()).copied().collect();
        assert_eq!(owned.len(), 15);
    }

    #[test]
    fn merge_rejects_second_writer() {
        let mut records = init_records(&bars_from_closes(&[1.0, 2.0]));
        let columns = vec![
            Column::Rsi(vec![Reading::Value(1.0); 2]),
            Column::Rsi(vec![Reading::Value(2.0); 2]),
        ];
        let err = merge(&mut records, columns).unwrap_err();
        assert!(matches!(
            err.current_context(),
            EngineError::FieldConflict { field } if field == "Rsi"
        ));
    }

    #[tokio::test]
    async fn records_match_bar_count() {
        let engine = Engine::new(EngineSettings::default());
        for len in [0, 1, 5, 30, 60] {
            let records = engine.compute(varied_bars(len)).await.unwrap();
            assert_eq!(records.len(), len);
        }
    }

    #[tokio::test]
    async fn warm_up_windows_hold_sentinels() {
        let records = Engine::new(EngineSettings::default())
            .compute(varied_bars(60))
            .await
            .unwrap();
        for (i, r) in records.iter().enumerate() {
            assert_eq!(r.rma.is_pending(), i < 3, "rma at {i}");
            assert_eq!(r.ema.is_pending(), i < 10, "ema at {i}");
            assert_eq!(r.rsi.is_pending(), i < 15, "rsi at {i}");
            assert_eq!(r.macd.is_pending(), i < 26, "macd at {i}");
            assert_eq!(r.sma.is_pending(), i < 20, "sma at {i}");
            assert_eq!(r.bollinger.upper.is_pending(), i < 20, "bollinger at {i}");
            assert_eq!(r.chaikin.is_pending(), i < 10, "chaikin at {i}");
            assert!(r.vwap.value().is_some());
        }
    }

    #[tokio::test]
    async fn stubs_are_unsupported_not_zero() {
        let records = Engine::new(EngineSettings::default())
            .compute(varied_bars(5))
            .await
            .unwrap();
        for r in &records {
            for reading in [r.imi, r.mfi, r.pcr, r.oi] {
                assert_eq!(reading, Reading::Unsupported);
                assert_eq!(reading.or_zero(), None);
            }
        }
    }

    #[tokio::test]
    async fn engine_writes_each_family() {
        let bars = varied_bars(40);
        let records = Engine::new(EngineSettings::default())
            .compute(bars.clone())
            .await
            .unwrap();
        let expected_rsi = Rsi::new(14).unwrap().calculate(&bars).unwrap();
        let expected_bands = BollingerBands::new(20, 2.0).unwrap().calculate(&bars).unwrap();
        for (i, r) in records.iter().enumerate() {
            assert_eq!(r.close, bars[i].close);
            assert_eq!(r.pivot_point, bars[i].typical_price());
            assert_eq!(r.rsi, expected_rsi[i]);
            assert_eq!(r.bollinger, expected_bands[i]);
            assert_eq!(r.sma, expected_bands[i].mid);
        }
    }

    #[tokio::test]
    async fn engine_macd_varies_across_records() {
        let records = Engine::new(EngineSettings::default())
            .compute(varied_bars(60))
            .await
            .unwrap();
        let macd: Vec<f64> = records.iter().filter_map(|r| r.macd.value()).collect();
        assert!(macd.windows(2).any(|w| (w[0] - w[1]).abs() > 1e-9));
        let chaikin: Vec<f64> = records.iter().filter_map(|r| r.chaikin.value()).collect();
        assert!(chaikin.windows(2).any(|w| (w[0] - w[1]).abs() > 1e-9));
    }

    #[tokio::test]
    async fn engine_is_deterministic() {
        let engine = Engine::new(EngineSettings {
            ema_mode: EmaMode::Legacy,
            ..EngineSettings::default()
        });
        let first = engine.compute(varied_bars(80)).await.unwrap();
        let second = engine.compute(varied_bars(80)).await.unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn invalid_settings_fail_before_spawning() {
        let engine = Engine::new(EngineSettings {
            macd_fast: 30,
            ..EngineSettings::default()
        });
        let err = engine.compute(varied_bars(10)).await.unwrap_err();
        assert!(matches!(
            err.current_context(),
            EngineError::Indicator { name } if name == "macd"
        ));
    }

    #[tokio::test]
    async fn zero_range_bar_tagged_undefined_in_chaikin() {
        let mut bars = varied_bars(30);
        bars[20].high = bars[20].close;
        bars[20].low = bars[20].close;
        let records = Engine::new(EngineSettings::default())
            .compute(bars)
            .await
            .unwrap();
        assert_eq!(records[20].chaikin, Reading::Undefined);
    }
}
