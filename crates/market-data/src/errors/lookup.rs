use chrono::{DateTime, Utc};
use thiserror::Error;

use super::MarketDataError;

/// Why a historical price could not be determined.
///
/// Adapters recover from all of these locally: the affected percentage
/// change becomes unknown while the rest of the price is still returned.
#[derive(Error, Debug)]
pub enum LookupError {
    /// The source returned an empty candle page.
    #[error("No candles returned")]
    NoCandles,

    /// A candle row did not have the expected shape.
    #[error("Malformed candle at index {index}: {reason}")]
    MalformedCandle {
        /// Position of the offending row in the page
        index: usize,
        /// What was wrong with it
        reason: String,
    },

    /// Every candle is newer than the requested instant.
    #[error("No candle at or before {target}")]
    NoCandleBefore {
        /// The instant that was asked for
        target: DateTime<Utc>,
    },

    /// The selected candle opened at exactly zero, which means the
    /// granularity is too fine for this market.
    #[error("Zero open price at {at}")]
    ZeroPrice {
        /// Timestamp of the selected candle
        at: DateTime<Utc>,
    },

    /// Fetching the candle page failed.
    #[error(transparent)]
    Fetch(#[from] MarketDataError),
}
