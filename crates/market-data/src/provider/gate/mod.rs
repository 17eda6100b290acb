//! Gate.io spot adapter (API v4).

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::errors::{LookupError, MarketDataError};
use crate::history::{
    change_or_warn, decode_rows, open_price_with_fallback, CandleLayout, Lookback, TimeUnit,
};
use crate::http::HttpClient;
use crate::models::{Candle, SymbolPrice};
use crate::provider::support::{self, window_end, window_start};
use crate::provider::PriceSource;

const BASE_URL: &str = "https://api.gateio.ws/api/v4";
const PROVIDER_NAME: &str = "Gate";

/// `[time, quote volume, close, high, low, open, base volume, closed]`
const CANDLE_LAYOUT: CandleLayout = CandleLayout::new(0, 5, TimeUnit::Seconds).with_hlcv(3, 4, 2, 6);

#[derive(Debug, Deserialize)]
struct Ticker {
    last: String,
    change_percentage: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    label: String,
    message: Option<String>,
}

pub struct GateProvider {
    http: HttpClient,
}

impl GateProvider {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    async fn candlesticks(
        &self,
        pair: &str,
        interval: &str,
        target: DateTime<Utc>,
    ) -> Result<Vec<Candle>, LookupError> {
        let step = interval_step(interval);
        let url = format!("{}/spot/candlesticks", BASE_URL);
        let query = [
            ("currency_pair", pair.to_string()),
            ("interval", interval.to_string()),
            ("from", window_start(target, step).timestamp().to_string()),
            ("to", window_end(target, step).timestamp().to_string()),
        ];

        let body = self
            .http
            .get_text(PROVIDER_NAME, &url, &query, &[])
            .await
            .map_err(|e| map_error(e, pair))?;
        parse_candlesticks(&body)
    }
}

#[async_trait]
impl PriceSource for GateProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn get_symbol_price(&self, symbol: &str) -> Result<SymbolPrice, MarketDataError> {
        let pair = symbol.to_uppercase();
        let url = format!("{}/spot/tickers", BASE_URL);
        let body = self
            .http
            .get_text(PROVIDER_NAME, &url, &[("currency_pair", pair.clone())], &[])
            .await
            .map_err(|e| map_error(e, &pair))?;
        let ticker = parse_ticker(&body, &pair)?;

        let price = support::decimal(PROVIDER_NAME, &ticker.last)?;
        let current = support::as_f64(&price);

        let target = Lookback::OneHour.target(Utc::now());
        let historical = open_price_with_fallback(&["1m", "5m"], target, |interval| {
            self.candlesticks(&pair, interval, target)
        })
        .await;
        let change_1h = change_or_warn(PROVIDER_NAME, &pair, Lookback::OneHour, current, historical);
        let change_24h = support::float(PROVIDER_NAME, &ticker.change_percentage).ok();

        Ok(SymbolPrice::new(pair, price, PROVIDER_NAME, Utc::now())
            .with_change_1h(change_1h)
            .with_change_24h(change_24h))
    }
}

fn interval_step(interval: &str) -> Duration {
    match interval {
        "5m" => Duration::minutes(5),
        _ => Duration::minutes(1),
    }
}

/// Turn Gate's `{"label": ..., "message": ...}` error bodies into errors.
fn map_error(error: MarketDataError, pair: &str) -> MarketDataError {
    let parsed = match &error {
        MarketDataError::HttpStatus { body, .. } => serde_json::from_str::<ErrorBody>(body).ok(),
        _ => None,
    };
    match parsed {
        Some(err) if err.label == "INVALID_CURRENCY_PAIR" || err.label == "INVALID_CURRENCY" => {
            MarketDataError::SymbolNotFound {
                provider: PROVIDER_NAME.to_string(),
                symbol: pair.to_string(),
            }
        }
        Some(err) => MarketDataError::rejected(PROVIDER_NAME, err.message.unwrap_or(err.label)),
        None => error,
    }
}

fn parse_ticker(body: &str, pair: &str) -> Result<Ticker, MarketDataError> {
    let tickers: Vec<Ticker> =
        serde_json::from_str(body).map_err(|e| MarketDataError::decode(PROVIDER_NAME, e))?;
    tickers
        .into_iter()
        .next()
        .ok_or_else(|| MarketDataError::SymbolNotFound {
            provider: PROVIDER_NAME.to_string(),
            symbol: pair.to_string(),
        })
}

fn parse_candlesticks(body: &str) -> Result<Vec<Candle>, LookupError> {
    let rows: Vec<Vec<Value>> =
        serde_json::from_str(body).map_err(|e| MarketDataError::decode(PROVIDER_NAME, e))?;
    decode_rows(&rows, CANDLE_LAYOUT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ticker() {
        let body = r#"[{
            "currency_pair": "BTC_USDT",
            "last": "64012.3",
            "lowest_ask": "64012.4",
            "highest_bid": "64012.3",
            "change_percentage": "-1.07",
            "base_volume": "7081.62",
            "quote_volume": "453201012.1"
        }]"#;

        let ticker = parse_ticker(body, "BTC_USDT").unwrap();
        assert_eq!(ticker.last, "64012.3");
        assert_eq!(support::float(PROVIDER_NAME, &ticker.change_percentage).unwrap(), -1.07);
    }

    #[test]
    fn test_parse_candlesticks_uses_open_column() {
        let body = r#"[
            ["1700000000", "9900.5", "64020", "64030", "63990", "64000", "0.15", "true"],
            ["1700000060", "6400.1", "64010", "64025", "64005", "64020", "0.10", "true"]
        ]"#;

        let candles = parse_candlesticks(body).unwrap();
        assert_eq!(candles[0].open, 64000.0);
        assert_eq!(candles[1].open, 64020.0);
        assert_eq!(candles[1].timestamp.timestamp(), 1_700_000_060);
    }

    #[test]
    fn test_invalid_pair_maps_to_not_found() {
        let error = MarketDataError::HttpStatus {
            provider: PROVIDER_NAME.to_string(),
            status: 400,
            body: r#"{"label":"INVALID_CURRENCY_PAIR","message":"Invalid currency pair NOPE_USDT"}"#
                .to_string(),
        };

        let mapped = map_error(error, "NOPE_USDT");
        assert!(matches!(mapped, MarketDataError::SymbolNotFound { symbol, .. } if symbol == "NOPE_USDT"));
    }

    #[test]
    fn test_other_errors_pass_through() {
        let error = MarketDataError::Timeout {
            provider: PROVIDER_NAME.to_string(),
        };
        assert!(map_error(error, "BTC_USDT").is_timeout());
    }
}
