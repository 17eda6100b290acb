//! Kraken public API adapter.
//!
//! Kraken keys results by its own pair name (`XBTUSD` comes back as
//! `XXBTZUSD`), so the first entry of `result` is used. The public
//! endpoints allow roughly one call per second, hence the pause before the
//! OHLC lookups.

use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::errors::{LookupError, MarketDataError};
use crate::history::{
    change_or_warn, decode_rows, open_price_with_fallback, CandleLayout, Lookback, TimeUnit,
};
use crate::http::HttpClient;
use crate::models::{Candle, SymbolPrice};
use crate::provider::support::{self, window_start};
use crate::provider::PriceSource;

const BASE_URL: &str = "https://api.kraken.com/0/public";
const PROVIDER_NAME: &str = "Kraken";

const RATE_LIMIT_PAUSE: StdDuration = StdDuration::from_secs(1);

/// `[time, open, high, low, close, vwap, volume, count]`
const OHLC_LAYOUT: CandleLayout = CandleLayout::new(0, 1, TimeUnit::Seconds).with_hlcv(2, 3, 4, 6);

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    error: Vec<String>,
    #[serde(default)]
    result: Map<String, Value>,
}

pub struct KrakenProvider {
    http: HttpClient,
    pause: StdDuration,
}

impl KrakenProvider {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            pause: RATE_LIMIT_PAUSE,
        }
    }

    async fn ohlc(
        &self,
        pair: &str,
        interval_minutes: i64,
        target: DateTime<Utc>,
    ) -> Result<Vec<Candle>, LookupError> {
        let url = format!("{}/OHLC", BASE_URL);
        let since = window_start(target, Duration::minutes(interval_minutes));
        let query = [
            ("pair", pair.to_string()),
            ("interval", interval_minutes.to_string()),
            ("since", since.timestamp().to_string()),
        ];
        let body = self.http.get_text(PROVIDER_NAME, &url, &query, &[]).await?;
        parse_ohlc(&body, pair)
    }
}

#[async_trait]
impl PriceSource for KrakenProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn get_symbol_price(&self, symbol: &str) -> Result<SymbolPrice, MarketDataError> {
        let pair = symbol.to_uppercase();
        let url = format!("{}/Ticker", BASE_URL);
        let body = self
            .http
            .get_text(PROVIDER_NAME, &url, &[("pair", pair.clone())], &[])
            .await?;
        let last = parse_last_price(&body, &pair)?;

        let price = support::decimal(PROVIDER_NAME, &last)?;
        let current = support::as_f64(&price);

        tokio::time::sleep(self.pause).await;
        let now = Utc::now();

        let target = Lookback::OneHour.target(now);
        let historical =
            open_price_with_fallback(&[1i64, 5], target, |minutes| self.ohlc(&pair, minutes, target))
                .await;
        let change_1h = change_or_warn(PROVIDER_NAME, &pair, Lookback::OneHour, current, historical);

        let target = Lookback::OneDay.target(now);
        let historical =
            open_price_with_fallback(&[5i64, 15], target, |minutes| self.ohlc(&pair, minutes, target))
                .await;
        let change_24h = change_or_warn(PROVIDER_NAME, &pair, Lookback::OneDay, current, historical);

        Ok(SymbolPrice::new(pair, price, PROVIDER_NAME, now)
            .with_change_1h(change_1h)
            .with_change_24h(change_24h))
    }
}

/// Decode the envelope and return the first pair entry of `result`.
fn first_result(body: &str, pair: &str) -> Result<Value, MarketDataError> {
    let envelope: Envelope =
        serde_json::from_str(body).map_err(|e| MarketDataError::decode(PROVIDER_NAME, e))?;

    if !envelope.error.is_empty() {
        if envelope.error.iter().any(|e| e.contains("Unknown asset pair")) {
            return Err(MarketDataError::SymbolNotFound {
                provider: PROVIDER_NAME.to_string(),
                symbol: pair.to_string(),
            });
        }
        return Err(MarketDataError::rejected(PROVIDER_NAME, envelope.error.join(", ")));
    }

    envelope
        .result
        .into_iter()
        .find(|(key, _)| key != "last")
        .map(|(_, value)| value)
        .ok_or_else(|| MarketDataError::SymbolNotFound {
            provider: PROVIDER_NAME.to_string(),
            symbol: pair.to_string(),
        })
}

fn parse_last_price(body: &str, pair: &str) -> Result<String, MarketDataError> {
    let ticker = first_result(body, pair)?;
    ticker
        .get("c")
        .and_then(|c| c.get(0))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| MarketDataError::decode(PROVIDER_NAME, "missing last trade price"))
}

fn parse_ohlc(body: &str, pair: &str) -> Result<Vec<Candle>, LookupError> {
    let rows: Vec<Vec<Value>> = serde_json::from_value(first_result(body, pair)?)
        .map_err(|e| MarketDataError::decode(PROVIDER_NAME, e))?;
    decode_rows(&rows, OHLC_LAYOUT)
}
