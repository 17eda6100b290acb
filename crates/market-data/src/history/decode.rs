use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::errors::LookupError;
use crate::models::Candle;

/// Unit of the timestamp column in a candle row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Millis,
}

/// Column positions of an array-shaped candle row.
///
/// Most vendors return candles as JSON arrays such as
/// `[time, open, close, high, low, volume]`; the layout says where the
/// timestamp and the open price live, and optionally the other columns.
#[derive(Clone, Copy, Debug)]
pub struct CandleLayout {
    pub time: usize,
    pub open: usize,
    pub unit: TimeUnit,
    pub high: Option<usize>,
    pub low: Option<usize>,
    pub close: Option<usize>,
    pub volume: Option<usize>,
}

impl CandleLayout {
    pub const fn new(time: usize, open: usize, unit: TimeUnit) -> Self {
        Self {
            time,
            open,
            unit,
            high: None,
            low: None,
            close: None,
            volume: None,
        }
    }

    /// Also read high, low, close and volume from these columns.
    pub const fn with_hlcv(self, high: usize, low: usize, close: usize, volume: usize) -> Self {
        Self {
            high: Some(high),
            low: Some(low),
            close: Some(close),
            volume: Some(volume),
            ..self
        }
    }
}

/// Decode array rows into candles.
///
/// Cells may be JSON numbers or numeric strings. Page order is preserved;
/// sorting is left to the lookup.
pub fn decode_rows(rows: &[Vec<Value>], layout: CandleLayout) -> Result<Vec<Candle>, LookupError> {
    if rows.is_empty() {
        return Err(LookupError::NoCandles);
    }

    rows.iter()
        .enumerate()
        .map(|(index, row)| decode_row(index, row, layout))
        .collect()
}

fn decode_row(index: usize, row: &[Value], layout: CandleLayout) -> Result<Candle, LookupError> {
    let raw_time = cell(index, row, layout.time, "timestamp")?;
    let timestamp = to_timestamp(raw_time as i64, layout.unit).ok_or_else(|| {
        LookupError::MalformedCandle {
            index,
            reason: format!("timestamp {} out of range", raw_time),
        }
    })?;

    let open = cell(index, row, layout.open, "open price")?;

    Ok(Candle {
        high: optional_cell(row, layout.high),
        low: optional_cell(row, layout.low),
        close: optional_cell(row, layout.close),
        volume: optional_cell(row, layout.volume),
        ..Candle::new(timestamp, open)
    })
}

/// Columns the lookup does not need are kept only when they parse.
fn optional_cell(row: &[Value], position: Option<usize>) -> Option<f64> {
    position
        .and_then(|p| row.get(p))
        .and_then(number)
        .filter(|n| n.is_finite())
}

fn cell(index: usize, row: &[Value], position: usize, what: &str) -> Result<f64, LookupError> {
    let value = row.get(position).ok_or_else(|| LookupError::MalformedCandle {
        index,
        reason: format!("missing {} at position {}", what, position),
    })?;

    number(value)
        .filter(|n| n.is_finite())
        .ok_or_else(|| LookupError::MalformedCandle {
            index,
            reason: format!("{} is not a number: {}", what, value),
        })
}

/// A JSON number or a string holding one.
pub(crate) fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn to_timestamp(raw: i64, unit: TimeUnit) -> Option<DateTime<Utc>> {
    match unit {
        TimeUnit::Seconds => Utc.timestamp_opt(raw, 0).single(),
        TimeUnit::Millis => Utc.timestamp_millis_opt(raw).single(),
    }
}
