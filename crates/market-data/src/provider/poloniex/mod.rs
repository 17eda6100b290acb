//! Poloniex spot adapter (v2 public market API).
//!
//! The ticker carries a 24h `dailyChange` as a fraction, so only the 1h
//! change needs candles. Errors come back as `{"code": N, "message": ".."}`
//! with a 4xx status.

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

const BASE_URL: &str = "https://api.poloniex.com";
const PROVIDER_NAME: &str = "Poloniex";

/// "Invalid symbol!"
const INVALID_SYMBOL_CODE: i64 = 21607;

/// `[low, high, open, close, amount, quantity, buyTakerAmount,
/// buyTakerQuantity, tradeCount, ts, weightedAverage, interval, startTime,
/// closeTime]`, times in millis
const CANDLE_LAYOUT: CandleLayout = CandleLayout::new(12, 2, TimeUnit::Millis).with_hlcv(1, 0, 3, 5);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker {
    close: String,
    /// Fraction, `0.0123` is 1.23%
    daily_change: String,
    ts: i64,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: i64,
    message: Option<String>,
}

pub struct PoloniexProvider {
    http: HttpClient,
}

impl PoloniexProvider {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    async fn candles(
        &self,
        symbol: &str,
        interval: &str,
        target: DateTime<Utc>,
    ) -> Result<Vec<Candle>, LookupError> {
        let step = interval_step(interval);
        let url = format!("{}/markets/{}/candles", BASE_URL, symbol);
        let query = [
            ("interval", interval.to_string()),
            ("startTime", window_start(target, step).timestamp_millis().to_string()),
            ("endTime", window_end(target, step).timestamp_millis().to_string()),
            ("limit", "20".to_string()),
        ];
        let body = self
            .http
            .get_text(PROVIDER_NAME, &url, &query, &[])
            .await
            .map_err(|e| map_error(e, symbol))?;
        parse_candles(&body)
    }
}

#[async_trait]
impl PriceSource for PoloniexProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn get_symbol_price(&self, symbol: &str) -> Result<SymbolPrice, MarketDataError> {
        let symbol = symbol.to_uppercase();
        let url = format!("{}/markets/{}/ticker24h", BASE_URL, symbol);
        let body = self
            .http
            .get_text(PROVIDER_NAME, &url, &[], &[])
            .await
            .map_err(|e| map_error(e, &symbol))?;
        let ticker = parse_ticker(&body)?;

        let price = support::decimal(PROVIDER_NAME, &ticker.close)?;
        let updated_at = support::from_millis(PROVIDER_NAME, ticker.ts)?;
        let current = support::as_f64(&price);

        let target = Lookback::OneHour.target(Utc::now());
        let historical = open_price_with_fallback(&["MINUTE_5", "MINUTE_15"], target, |interval| {
            self.candles(&symbol, interval, target)
        })
        .await;
        let change_1h = change_or_warn(PROVIDER_NAME, &symbol, Lookback::OneHour, current, historical);

        let change_24h = support::float(PROVIDER_NAME, &ticker.daily_change)
            .ok()
            .map(|fraction| fraction * 100.0);

        Ok(SymbolPrice::new(symbol, price, PROVIDER_NAME, updated_at)
            .with_change_1h(change_1h)
            .with_change_24h(change_24h))
    }
}

fn interval_step(interval: &str) -> Duration {
    match interval {
        "MINUTE_15" => Duration::minutes(15),
        _ => Duration::minutes(5),
    }
}

fn map_error(error: MarketDataError, symbol: &str) -> MarketDataError {
    let parsed = match &error {
        MarketDataError::HttpStatus { body, .. } => serde_json::from_str::<ErrorBody>(body).ok(),
        _ => None,
    };
    match parsed {
        Some(err) if err.code == INVALID_SYMBOL_CODE => MarketDataError::SymbolNotFound {
            provider: PROVIDER_NAME.to_string(),
            symbol: symbol.to_string(),
        },
        Some(err) => MarketDataError::rejected(
            PROVIDER_NAME,
            err.message.unwrap_or_else(|| format!("error code {}", err.code)),
        ),
        None => error,
    }
}

fn parse_ticker(body: &str) -> Result<Ticker, MarketDataError> {
    serde_json::from_str(body).map_err(|e| MarketDataError::decode(PROVIDER_NAME, e))
}

fn parse_candles(body: &str) -> Result<Vec<Candle>, LookupError> {
    let rows: Vec<Vec<Value>> =
        serde_json::from_str(body).map_err(|e| MarketDataError::decode(PROVIDER_NAME, e))?;
    decode_rows(&rows, CANDLE_LAYOUT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::open_price_at;
    use chrono::TimeZone;

    #[test]
    fn test_parse_ticker() {
        let body = r#"{
            "symbol": "BTC_USDT",
            "open": "63210.55",
            "low": "62950.01",
            "high": "64400.00",
            "close": "64001.17",
            "quantity": "61.452318",
            "amount": "3921556.31",
            "tradeCount": 18223,
            "startTime": 1699913640000,
            "closeTime": 1700000040123,
            "displayName": "BTC/USDT",
            "dailyChange": "0.0125",
            "bid": "64000.12",
            "bidQuantity": "0.0135",
            "ask": "64002.33",
            "askQuantity": "0.2",
            "ts": 1700000041234,
            "markPrice": "64001.02"
        }"#;

        let ticker = parse_ticker(body).unwrap();
        assert_eq!(ticker.close, "64001.17");
        assert_eq!(ticker.daily_change, "0.0125");
        assert_eq!(ticker.ts, 1_700_000_041_234);
    }

    #[test]
    fn test_parse_candles() {
        let body = r#"[
            ["63990.10", "64050.00", "64000.00", "64020.55", "52340.1", "0.8177", "30000.2", "0.4688", 112, 1700000040000, "64010.3", "MINUTE_5", 1699999800000, 1700000099999],
            ["64001.00", "64090.00", "64020.55", "64080.00", "61022.4", "0.9531", "31002.0", "0.4840", 97, 1700000340000, "64040.1", "MINUTE_5", 1700000100000, 1700000399999]
        ]"#;

        let candles = parse_candles(body).unwrap();
        assert_eq!(candles[0].high, Some(64050.0));
        assert_eq!(candles[0].low, Some(63990.1));
        assert_eq!(candles[0].volume, Some(0.8177));

        let target = Utc.timestamp_opt(1_700_000_200, 0).unwrap();
        assert_eq!(open_price_at(candles, target).unwrap(), 64020.55);
    }

    #[test]
    fn test_invalid_symbol() {
        let error = MarketDataError::HttpStatus {
            provider: PROVIDER_NAME.to_string(),
            status: 400,
            body: r#"{"code":21607,"message":"Invalid symbol!"}"#.to_string(),
        };
        assert!(matches!(map_error(error, "NOPE_USDT"), MarketDataError::SymbolNotFound { .. }));
    }

    #[test]
    fn test_other_error_keeps_message() {
        let error = MarketDataError::HttpStatus {
            provider: PROVIDER_NAME.to_string(),
            status: 400,
            body: r#"{"code":24106,"message":"Invalid market!"}"#.to_string(),
        };
        let err = map_error(error, "BTC_USDT");
        assert!(matches!(err, MarketDataError::ProviderError { message, .. } if message == "Invalid market!"));
    }

    #[test]
    fn test_non_json_status_is_kept() {
        let error = MarketDataError::HttpStatus {
            provider: PROVIDER_NAME.to_string(),
            status: 503,
            body: "<html>maintenance</html>".to_string(),
        };
        assert!(matches!(map_error(error, "BTC_USDT"), MarketDataError::HttpStatus { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_zero_open_widens_to_fifteen_minutes() {
        let target = Utc.timestamp_opt(1_700_000_200, 0).unwrap();
        let mut requested = Vec::new();

        let price = open_price_with_fallback(&["MINUTE_5", "MINUTE_15"], target, |interval| {
            requested.push(interval);
            let open = if interval == "MINUTE_5" { "0" } else { "63980.5" };
            let body = format!(
                r#"[["1", "1", "{}", "1", "1", "1", "1", "1", 1, 1700000040000, "1", "{}", 1699999800000, 1700000099999]]"#,
                open, interval
            );
            async move { parse_candles(&body) }
        })
        .await
        .unwrap();

        assert_eq!(price, 63980.5);
        assert_eq!(requested, ["MINUTE_5", "MINUTE_15"]);
    }
}
