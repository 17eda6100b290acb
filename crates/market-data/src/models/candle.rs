use chrono::{DateTime, Utc};

/// A time-bucketed OHLCV record from a source's history endpoint.
///
/// Only `timestamp` and `open` are used by the historical lookup.
#[derive(Clone, Debug, PartialEq)]
pub struct Candle {
    /// Start of the bucket
    pub timestamp: DateTime<Utc>,

    /// Opening price of the bucket
    pub open: f64,

    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,

    /// Traded base volume of the bucket
    pub volume: Option<f64>,
}

impl Candle {
    /// Create a candle carrying only the fields the lookup needs
    pub fn new(timestamp: DateTime<Utc>, open: f64) -> Self {
        Self {
            timestamp,
            open,
            high: None,
            low: None,
            close: None,
            volume: None,
        }
    }
}
