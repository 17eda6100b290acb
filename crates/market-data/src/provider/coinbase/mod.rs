//! Coinbase Exchange adapter.
//!
//! One page of 5 minute candles (300 buckets, about 25 hours) serves both
//! the 1h and the 24h lookups. A zero open price in either window retries
//! that window on a page of 15 minute candles. Coinbase returns candles
//! newest first.

use std::future::Future;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{LookupError, MarketDataError};
use crate::history::{change_or_warn, decode_rows, open_price_at, CandleLayout, Lookback, TimeUnit};
use crate::http::HttpClient;
use crate::models::{Candle, SymbolPrice};
use crate::provider::support;
use crate::provider::PriceSource;

const BASE_URL: &str = "https://api.exchange.coinbase.com";
const PROVIDER_NAME: &str = "Coinbase";

/// `[time, low, high, open, close, volume]`, time in seconds
const CANDLE_LAYOUT: CandleLayout = CandleLayout::new(0, 3, TimeUnit::Seconds).with_hlcv(2, 1, 4, 5);

/// Candle sizes in seconds, finest first
const GRANULARITIES: [u32; 2] = [300, 900];

const WINDOWS: [Lookback; 2] = [Lookback::OneHour, Lookback::OneDay];

/// Response from /products/{id}/ticker
#[derive(Debug, Deserialize)]
struct Ticker {
    price: String,
    time: DateTime<Utc>,
}

pub struct CoinbaseProvider {
    http: HttpClient,
}

impl CoinbaseProvider {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    async fn candles(&self, product: &str, granularity: u32) -> Result<Vec<Candle>, LookupError> {
        let url = format!("{}/products/{}/candles", BASE_URL, product);
        let body = self
            .http
            .get_text(PROVIDER_NAME, &url, &[("granularity", granularity.to_string())], &[])
            .await?;
        parse_candles(&body)
    }
}

#[async_trait]
impl PriceSource for CoinbaseProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn get_symbol_price(&self, symbol: &str) -> Result<SymbolPrice, MarketDataError> {
        let product = symbol.to_uppercase();
        let url = format!("{}/products/{}/ticker", BASE_URL, product);
        let ticker: Ticker = self
            .http
            .get_json(PROVIDER_NAME, &url, &[], &[])
            .await
            .map_err(|e| match e {
                MarketDataError::HttpStatus { status: 404, .. } => MarketDataError::SymbolNotFound {
                    provider: PROVIDER_NAME.to_string(),
                    symbol: product.clone(),
                },
                other => other,
            })?;

        let price = support::decimal(PROVIDER_NAME, &ticker.price)?;
        let current = support::as_f64(&price);

        let opens = window_opens(Utc::now(), |granularity| self.candles(&product, granularity)).await;
        let (change_1h, change_24h) = match opens {
            Ok([hour_ago, day_ago]) => (
                change_or_warn(PROVIDER_NAME, &product, Lookback::OneHour, current, hour_ago),
                change_or_warn(PROVIDER_NAME, &product, Lookback::OneDay, current, day_ago),
            ),
            Err(e) => {
                warn!(
                    source = PROVIDER_NAME,
                    symbol = %product,
                    error = %e,
                    "Failed to get kline ticks"
                );
                (None, None)
            }
        };

        Ok(SymbolPrice::new(product, price, PROVIDER_NAME, ticker.time)
            .with_change_1h(change_1h)
            .with_change_24h(change_24h))
    }
}

/// Open prices one hour and one day before `now`.
///
/// The finest page answers both windows; a window whose candle opened at
/// zero is looked up again on the next coarser page. The outer error is a
/// failure to fetch the first page.
async fn window_opens<F, Fut>(
    now: DateTime<Utc>,
    mut fetch: F,
) -> Result<[Result<f64, LookupError>; 2], LookupError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<Candle>, LookupError>>,
{
    let candles = fetch(GRANULARITIES[0]).await?;
    let mut opens = WINDOWS.map(|window| open_price_at(candles.clone(), window.target(now)));

    for &granularity in &GRANULARITIES[1..] {
        if !opens.iter().any(is_zero_price) {
            break;
        }
        debug!("Zero price in a {}s page, widening", granularity);

        let candles = match fetch(granularity).await {
            Ok(candles) => candles,
            Err(e) => {
                debug!("No {}s candles: {}", granularity, e);
                break;
            }
        };
        for (open, window) in opens.iter_mut().zip(WINDOWS) {
            if is_zero_price(open) {
                *open = open_price_at(candles.clone(), window.target(now));
            }
        }
    }

    Ok(opens)
}

fn is_zero_price(open: &Result<f64, LookupError>) -> bool {
    matches!(open, Err(LookupError::ZeroPrice { .. }))
}

fn parse_candles(body: &str) -> Result<Vec<Candle>, LookupError> {
    let rows: Vec<Vec<Value>> =
        serde_json::from_str(body).map_err(|e| MarketDataError::decode(PROVIDER_NAME, e))?;
    decode_rows(&rows, CANDLE_LAYOUT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    /// Newest first, `count` candles of `step` minutes ending at `now`.
    fn page(step: i64, count: i64, open: impl Fn(i64) -> f64) -> Vec<Candle> {
        let rows: Vec<String> = (0..count)
            .rev()
            .map(|i| {
                let ts = (now() - Duration::minutes(step * (count - i))).timestamp();
                format!("[{}, 1.0, 2.0, {}, 1.5, 10.0]", ts, open(i))
            })
            .collect();
        parse_candles(&format!("[{}]", rows.join(","))).unwrap()
    }

    #[test]
    fn test_parse_ticker() {
        let body = r#"{
            "ask": "64001.02",
            "bid": "64000.98",
            "volume": "11904.07",
            "trade_id": 611239482,
            "price": "64000.99",
            "size": "0.0012",
            "time": "2024-03-01T12:00:00.123456Z"
        }"#;

        let ticker: Ticker = serde_json::from_str(body).unwrap();
        assert_eq!(ticker.price, "64000.99");
        assert_eq!(ticker.time.timestamp(), 1_709_294_400);
    }

    #[test]
    fn test_descending_candles_resolve_both_windows() {
        let now = DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let start = now - Duration::hours(25);

        // newest first, one candle every 5 minutes, open = minutes since start
        let rows: Vec<String> = (0..300)
            .rev()
            .map(|i: i64| {
                let ts = (start + Duration::minutes(5 * i)).timestamp();
                format!("[{}, 1.0, 2.0, {}, 1.5, 10.0]", ts, 5 * i + 1)
            })
            .collect();
        let candles = parse_candles(&format!("[{}]", rows.join(","))).unwrap();
        assert!(candles[0].timestamp > candles[1].timestamp);

        let hour_ago = open_price_at(candles.clone(), Lookback::OneHour.target(now)).unwrap();
        let day_ago = open_price_at(candles, Lookback::OneDay.target(now)).unwrap();

        assert_eq!(hour_ago, (24 * 60 + 1) as f64);
        assert_eq!(day_ago, 61.0);
    }

    #[tokio::test]
    async fn test_zero_open_retries_on_coarser_page() {
        let mut requested = Vec::new();

        let opens = window_opens(now(), |granularity| {
            requested.push(granularity);
            let candles = match granularity {
                300 => page(5, 300, |_| 0.0),
                _ => page(15, 300, |i| i as f64 + 1.0),
            };
            async move { Ok(candles) }
        })
        .await
        .unwrap();

        assert_eq!(requested, [300, 900]);
        let [hour_ago, day_ago] = opens;
        // Coarse candle i starts (300 - i) * 15 minutes before now
        assert_eq!(hour_ago.unwrap(), 297.0);
        assert_eq!(day_ago.unwrap(), 205.0);
    }

    #[tokio::test]
    async fn test_only_the_zero_window_is_retried() {
        let opens = window_opens(now(), |granularity| {
            let candles = match granularity {
                // only the candle an hour ago opened at zero
                300 => page(5, 300, |i| if i == 288 { 0.0 } else { 100.0 }),
                _ => page(15, 300, |_| 7.0),
            };
            async move { Ok(candles) }
        })
        .await
        .unwrap();

        let [hour_ago, day_ago] = opens;
        assert_eq!(hour_ago.unwrap(), 7.0);
        assert_eq!(day_ago.unwrap(), 100.0);
    }

    #[tokio::test]
    async fn test_fine_page_is_enough() {
        let mut requested = Vec::new();

        let opens = window_opens(now(), |granularity| {
            requested.push(granularity);
            let candles = page(5, 300, |_| 50.0);
            async move { Ok(candles) }
        })
        .await
        .unwrap();

        assert_eq!(requested, [300]);
        assert!(opens.iter().all(|open| matches!(open, Ok(p) if *p == 50.0)));
    }

    #[tokio::test]
    async fn test_first_page_failure_is_returned() {
        let result = window_opens(now(), |_| async { Err(LookupError::NoCandles) }).await;
        assert!(matches!(result, Err(LookupError::NoCandles)));
    }
}
