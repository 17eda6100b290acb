//! Historical price lookup shared by all sources.
//!
//! Sources compute percentage changes by locating the price at an instant in
//! the past (one hour or one day ago) inside a page of candles fetched from
//! their history endpoint. Vendors disagree on ordering, so the lookup:
//!
//! 1. sorts the page ascending by timestamp when it is not already sorted
//! 2. selects the *last* candle whose timestamp is at or before the target
//! 3. rejects a zero open price as "resolution too fine" so the caller can
//!    retry with coarser candles (see [`open_price_with_fallback`])

mod decode;

pub use decode::{decode_rows, CandleLayout, TimeUnit};

use std::fmt::Debug;
use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::errors::LookupError;
use crate::models::Candle;

/// Look-back window of a percentage change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lookback {
    OneHour,
    OneDay,
}

impl Lookback {
    pub fn duration(self) -> Duration {
        match self {
            Self::OneHour => Duration::hours(1),
            Self::OneDay => Duration::hours(24),
        }
    }

    /// The instant whose price anchors the change.
    pub fn target(self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.duration()
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::OneHour => "1h",
            Self::OneDay => "24h",
        }
    }
}

/// The last candle at or before `target` in an ascending page.
pub fn nearest_at_or_before(candles: &[Candle], target: DateTime<Utc>) -> Option<&Candle> {
    let after_last_match = candles.partition_point(|c| c.timestamp <= target);
    after_last_match.checked_sub(1).map(|i| &candles[i])
}

/// Sort ascending by timestamp unless already sorted.
///
/// The sort is stable, so rows sharing a timestamp keep their page order.
pub fn sort_candles(candles: &mut [Candle]) {
    let sorted = candles
        .windows(2)
        .all(|pair| pair[0].timestamp <= pair[1].timestamp);
    if !sorted {
        candles.sort_by_key(|c| c.timestamp);
    }
}

/// Open price of the candle nearest to `target` from below.
///
/// # Errors
///
/// - [`LookupError::NoCandles`] for an empty page
/// - [`LookupError::NoCandleBefore`] when every candle is after `target`
/// - [`LookupError::ZeroPrice`] when the selected candle opened at zero
pub fn open_price_at(mut candles: Vec<Candle>, target: DateTime<Utc>) -> Result<f64, LookupError> {
    if candles.is_empty() {
        return Err(LookupError::NoCandles);
    }

    sort_candles(&mut candles);

    let candle = nearest_at_or_before(&candles, target)
        .ok_or(LookupError::NoCandleBefore { target })?;

    debug!(
        "Kline for {} uses open price at {}",
        target.to_rfc3339(),
        candle.timestamp.to_rfc3339()
    );

    if candle.open == 0.0 {
        return Err(LookupError::ZeroPrice {
            at: candle.timestamp,
        });
    }

    Ok(candle.open)
}

/// Look up the price at `target`, widening the granularity on zero prices.
///
/// `fetch` is asked for a candle page at each granularity in turn. Only a
/// [`LookupError::ZeroPrice`] moves on to the next (coarser) granularity;
/// any other outcome is returned as is.
pub async fn open_price_with_fallback<G, F, Fut>(
    granularities: &[G],
    target: DateTime<Utc>,
    mut fetch: F,
) -> Result<f64, LookupError>
where
    G: Copy + Debug,
    F: FnMut(G) -> Fut,
    Fut: Future<Output = Result<Vec<Candle>, LookupError>>,
{
    let mut last_error = LookupError::NoCandles;

    for &granularity in granularities {
        let candles = fetch(granularity).await?;
        match open_price_at(candles, target) {
            Err(e @ LookupError::ZeroPrice { .. }) => {
                debug!("Zero price with {:?} candles, widening", granularity);
                last_error = e;
            }
            other => return other,
        }
    }

    Err(last_error)
}

/// `(current - historical) / historical * 100`, or `None` when undefined.
///
/// # Examples
///
/// ```
/// use token_ticker_market_data::history::percent_change;
///
/// assert_eq!(percent_change(150.0, 100.0), Some(50.0));
/// assert_eq!(percent_change(100.0, 0.0), None);
/// ```
pub fn percent_change(current: f64, historical: f64) -> Option<f64> {
    if historical == 0.0 || !historical.is_finite() || !current.is_finite() {
        return None;
    }
    Some((current - historical) / historical * 100.0)
}

/// Turn a lookup result into a percentage change, logging failures.
pub fn change_or_warn(
    source: &str,
    symbol: &str,
    lookback: Lookback,
    current: f64,
    historical: Result<f64, LookupError>,
) -> Option<f64> {
    match historical {
        Ok(price) => percent_change(current, price),
        Err(e) => {
            warn!(
                source,
                symbol,
                window = lookback.label(),
                error = %e,
                "Failed to get historical price"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crate::errors::MarketDataError;

    fn at(offset_minutes: i64) -> DateTime<Utc> {
        base() + Duration::minutes(offset_minutes)
    }

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn candle(offset_minutes: i64, open: f64) -> Candle {
        Candle::new(at(offset_minutes), open)
    }

    #[test]
    fn test_unsorted_page_picks_nearest_from_below() {
        let candles = vec![candle(10, 3.0), candle(-5, 2.0), candle(-20, 1.0)];
        assert_eq!(open_price_at(candles, base()).unwrap(), 2.0);
    }

    #[test]
    fn test_descending_page_picks_nearest_from_below() {
        let candles = vec![
            candle(15, 5.0),
            candle(10, 4.0),
            candle(5, 3.0),
            candle(0, 2.0),
            candle(-5, 1.0),
        ];
        assert_eq!(open_price_at(candles, at(7)).unwrap(), 3.0);
    }

    #[test]
    fn test_exact_match_is_selected() {
        let candles = vec![candle(-10, 1.0), candle(0, 2.0), candle(10, 3.0)];
        assert_eq!(open_price_at(candles, base()).unwrap(), 2.0);
    }

    #[test]
    fn test_ties_pick_the_last_matching_candle() {
        let candles = vec![candle(-10, 1.0), candle(-10, 1.5), candle(10, 3.0)];
        assert_eq!(open_price_at(candles, base()).unwrap(), 1.5);
    }

    #[test]
    fn test_target_after_every_candle_uses_the_newest() {
        let candles = vec![candle(-30, 1.0), candle(-20, 2.0)];
        assert_eq!(open_price_at(candles, base()).unwrap(), 2.0);
    }

    #[test]
    fn test_empty_page() {
        let err = open_price_at(Vec::new(), base()).unwrap_err();
        assert!(matches!(err, LookupError::NoCandles));
    }

    #[test]
    fn test_no_candle_before_target() {
        let candles = vec![candle(1, 1.0), candle(2, 2.0)];
        let err = open_price_at(candles, base()).unwrap_err();
        assert!(matches!(err, LookupError::NoCandleBefore { target } if target == base()));
    }

    #[test]
    fn test_zero_prices_before_target_are_unusable() {
        let candles = vec![candle(-20, 0.0), candle(-10, 0.0), candle(5, 7.0)];
        let err = open_price_at(candles, base()).unwrap_err();
        assert!(matches!(err, LookupError::ZeroPrice { at: t } if t == at(-10)));
    }

    #[test]
    fn test_nearest_on_empty_slice() {
        assert!(nearest_at_or_before(&[], base()).is_none());
    }

    #[tokio::test]
    async fn test_fallback_widens_on_zero_price() {
        let mut asked = Vec::new();
        let price = open_price_with_fallback(&[1u32, 5], base(), |minutes| {
            asked.push(minutes);
            async move {
                if minutes == 1 {
                    Ok(vec![candle(-1, 0.0)])
                } else {
                    Ok(vec![candle(-5, 42.0)])
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(price, 42.0);
        assert_eq!(asked, vec![1, 5]);
    }

    #[tokio::test]
    async fn test_fallback_stops_at_first_usable_price() {
        let mut asked = Vec::new();
        let price = open_price_with_fallback(&[1u32, 5], base(), |minutes| {
            asked.push(minutes);
            async move { Ok(vec![candle(-1, 9.0)]) }
        })
        .await
        .unwrap();

        assert_eq!(price, 9.0);
        assert_eq!(asked, vec![1]);
    }

    #[tokio::test]
    async fn test_fallback_reports_zero_when_every_granularity_is_zero() {
        let result = open_price_with_fallback(&[1u32, 5], base(), |_| async {
            Ok(vec![candle(-1, 0.0)])
        })
        .await;

        assert!(matches!(result, Err(LookupError::ZeroPrice { .. })));
    }

    #[tokio::test]
    async fn test_fallback_does_not_widen_on_fetch_errors() {
        let mut calls = 0;
        let result = open_price_with_fallback(&[1u32, 5], base(), |_| {
            calls += 1;
            async {
                Err(LookupError::Fetch(MarketDataError::Timeout {
                    provider: "Kraken".to_string(),
                }))
            }
        })
        .await;

        assert!(matches!(result, Err(LookupError::Fetch(_))));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(150.0, 100.0), Some(50.0));
        assert_eq!(percent_change(50.0, 100.0), Some(-50.0));
        assert_eq!(percent_change(100.0, 100.0), Some(0.0));
        assert_eq!(percent_change(100.0, 0.0), None);
        assert_eq!(percent_change(f64::NAN, 100.0), None);
    }

    #[test]
    fn test_change_or_warn_maps_errors_to_unknown() {
        let change = change_or_warn(
            "Binance",
            "BTCUSDT",
            Lookback::OneHour,
            100.0,
            Err(LookupError::NoCandles),
        );
        assert_eq!(change, None);

        let change = change_or_warn("Binance", "BTCUSDT", Lookback::OneDay, 120.0, Ok(100.0));
        assert_eq!(change, Some(20.0));
    }

    #[test]
    fn test_lookback_targets() {
        assert_eq!(Lookback::OneHour.target(base()), at(-60));
        assert_eq!(Lookback::OneDay.target(base()), at(-24 * 60));
        assert_eq!(Lookback::OneDay.label(), "24h");
    }
}
