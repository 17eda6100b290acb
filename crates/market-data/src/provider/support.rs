//! Parsing helpers shared by the adapters.

use std::str::FromStr;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::errors::MarketDataError;

/// Candles requested on each side of a lookup target.
pub(crate) const WINDOW_CANDLES: i64 = 5;

/// Parse a vendor price string, accepting scientific notation.
pub(crate) fn decimal(provider: &str, raw: &str) -> Result<Decimal, MarketDataError> {
    let raw = raw.trim();
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map_err(|e| MarketDataError::decode(provider, format!("invalid price {:?}: {}", raw, e)))
}

/// Price from a JSON number, keeping its shortest textual form.
pub(crate) fn decimal_from_number(
    provider: &str,
    number: &serde_json::Number,
) -> Result<Decimal, MarketDataError> {
    decimal(provider, &number.to_string())
}

pub(crate) fn float(provider: &str, raw: &str) -> Result<f64, MarketDataError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| MarketDataError::decode(provider, format!("invalid number {:?}: {}", raw, e)))
}

/// Lossy conversion used for percentage maths; NaN when out of range.
pub(crate) fn as_f64(price: &Decimal) -> f64 {
    price.to_f64().unwrap_or(f64::NAN)
}

pub(crate) fn from_millis(provider: &str, millis: i64) -> Result<DateTime<Utc>, MarketDataError> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| MarketDataError::decode(provider, format!("invalid timestamp {}", millis)))
}

/// Start of a candle window that straddles `target`.
pub(crate) fn window_start(target: DateTime<Utc>, step: Duration) -> DateTime<Utc> {
    target - step * WINDOW_CANDLES as i32
}

/// End of a candle window that straddles `target`.
pub(crate) fn window_end(target: DateTime<Utc>, step: Duration) -> DateTime<Utc> {
    target + step * WINDOW_CANDLES as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_decimal_keeps_vendor_precision() {
        assert_eq!(decimal("Binance", "0.00001230").unwrap().to_string(), "0.00001230");
        assert_eq!(decimal("Binance", " 64250.1 ").unwrap(), dec!(64250.1));
    }

    #[test]
    fn test_decimal_scientific() {
        assert_eq!(decimal("Bitfinex", "1.5e-5").unwrap(), dec!(0.000015));
    }

    #[test]
    fn test_decimal_rejects_garbage() {
        let err = decimal("Gate", "n/a").unwrap_err();
        assert!(matches!(err, MarketDataError::Decode { .. }));
    }

    #[test]
    fn test_window_straddles_target() {
        let target = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let step = Duration::minutes(1);

        assert_eq!(window_start(target, step), target - Duration::minutes(5));
        assert_eq!(window_end(target, step), target + Duration::minutes(5));
    }
}
