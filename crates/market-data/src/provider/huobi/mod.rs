//! Huobi (HTX) spot adapter.
//!
//! Every response is wrapped in `{"status": "ok" | "error", ...}`. Klines
//! come back newest first with the bucket start (seconds) in `id`.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::errors::{LookupError, MarketDataError};
use crate::history::{change_or_warn, open_price_with_fallback, Lookback};
use crate::http::HttpClient;
use crate::models::{Candle, SymbolPrice};
use crate::provider::support;
use crate::provider::PriceSource;

const BASE_URL: &str = "https://api.huobi.pro";
const PROVIDER_NAME: &str = "Huobi";

/// Kline periods and page sizes for the 1h lookup, two hours each
const MINUTE_KLINES: [(&str, u32); 2] = [("1min", 120), ("5min", 24)];

/// Kline periods and page sizes for the 24h lookup, two days each
const HOURLY_KLINES: [(&str, u32); 2] = [("60min", 48), ("4hour", 12)];

// ============================================================================
// API Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    #[serde(rename = "err-code")]
    err_code: Option<String>,
    #[serde(rename = "err-msg")]
    err_msg: Option<String>,
    /// Server time (Unix millis)
    ts: Option<i64>,
    tick: Option<T>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct MergedTick {
    close: serde_json::Number,
}

#[derive(Debug, Deserialize)]
struct Kline {
    /// Bucket start (Unix seconds)
    id: i64,
    open: f64,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    /// Base currency volume
    amount: Option<f64>,
}

// ============================================================================
// HuobiProvider
// ============================================================================

pub struct HuobiProvider {
    http: HttpClient,
}

impl HuobiProvider {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    async fn klines(&self, symbol: &str, period: &str, size: u32) -> Result<Vec<Candle>, LookupError> {
        let url = format!("{}/market/history/kline", BASE_URL);
        let query = [
            ("symbol", symbol.to_string()),
            ("period", period.to_string()),
            ("size", size.to_string()),
        ];
        let body = self.http.get_text(PROVIDER_NAME, &url, &query, &[]).await?;
        parse_klines(&body, symbol)
    }
}

#[async_trait]
impl PriceSource for HuobiProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn get_symbol_price(&self, symbol: &str) -> Result<SymbolPrice, MarketDataError> {
        let symbol = symbol.to_lowercase();
        let url = format!("{}/market/detail/merged", BASE_URL);
        let body = self
            .http
            .get_text(PROVIDER_NAME, &url, &[("symbol", symbol.clone())], &[])
            .await?;
        let (tick, ts) = parse_merged(&body, &symbol)?;

        let price = support::decimal_from_number(PROVIDER_NAME, &tick.close)?;
        let updated_at = match ts {
            Some(ms) => support::from_millis(PROVIDER_NAME, ms)?,
            None => Utc::now(),
        };
        let current = support::as_f64(&price);
        let now = Utc::now();

        let historical = open_price_with_fallback(
            &MINUTE_KLINES,
            Lookback::OneHour.target(now),
            |(period, size)| self.klines(&symbol, period, size),
        )
        .await;
        let change_1h = change_or_warn(PROVIDER_NAME, &symbol, Lookback::OneHour, current, historical);

        let historical = open_price_with_fallback(
            &HOURLY_KLINES,
            Lookback::OneDay.target(now),
            |(period, size)| self.klines(&symbol, period, size),
        )
        .await;
        let change_24h = change_or_warn(PROVIDER_NAME, &symbol, Lookback::OneDay, current, historical);

        Ok(SymbolPrice::new(symbol, price, PROVIDER_NAME, updated_at)
            .with_change_1h(change_1h)
            .with_change_24h(change_24h))
    }
}

fn unwrap_envelope<T: DeserializeOwned>(body: &str, symbol: &str) -> Result<Envelope<T>, MarketDataError> {
    let envelope: Envelope<T> =
        serde_json::from_str(body).map_err(|e| MarketDataError::decode(PROVIDER_NAME, e))?;

    if !envelope.status.eq_ignore_ascii_case("ok") {
        if envelope.err_code.as_deref() == Some("invalid-parameter")
            && envelope
                .err_msg
                .as_deref()
                .is_some_and(|msg| msg.contains("symbol"))
        {
            return Err(MarketDataError::SymbolNotFound {
                provider: PROVIDER_NAME.to_string(),
                symbol: symbol.to_string(),
            });
        }
        let message = envelope
            .err_msg
            .unwrap_or_else(|| "unknown error message".to_string());
        return Err(MarketDataError::rejected(PROVIDER_NAME, message));
    }

    Ok(envelope)
}

fn parse_merged(body: &str, symbol: &str) -> Result<(MergedTick, Option<i64>), MarketDataError> {
    let envelope = unwrap_envelope::<MergedTick>(body, symbol)?;
    let tick = envelope
        .tick
        .ok_or_else(|| MarketDataError::decode(PROVIDER_NAME, "missing tick"))?;
    Ok((tick, envelope.ts))
}

fn parse_klines(body: &str, symbol: &str) -> Result<Vec<Candle>, LookupError> {
    let envelope = unwrap_envelope::<Vec<Kline>>(body, symbol)?;
    let klines = envelope.data.unwrap_or_default();
    if klines.is_empty() {
        return Err(LookupError::NoCandles);
    }

    klines
        .into_iter()
        .enumerate()
        .map(|(index, kline)| {
            let timestamp = Utc.timestamp_opt(kline.id, 0).single().ok_or_else(|| {
                LookupError::MalformedCandle {
                    index,
                    reason: format!("timestamp {} out of range", kline.id),
                }
            })?;
            Ok(Candle {
                high: kline.high,
                low: kline.low,
                close: kline.close,
                volume: kline.amount,
                ..Candle::new(timestamp, kline.open)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    use crate::history::open_price_at;

    fn kline_page(period: &str, opens: &[(i64, f64)]) -> String {
        let rows: Vec<String> = opens
            .iter()
            .map(|(id, open)| {
                format!(
                    r#"{{"id": {}, "open": {}, "close": {}, "low": {}, "high": {}, "amount": 1.0, "vol": 1.0, "count": 1}}"#,
                    id, open, open, open, open
                )
            })
            .collect();
        format!(
            r#"{{"ch": "market.btcusdt.kline.{}", "status": "ok", "ts": 1700000061000, "data": [{}]}}"#,
            period,
            rows.join(",")
        )
    }

    #[test]
    fn test_parse_merged() {
        let body = r#"{
            "ch": "market.btcusdt.detail.merged",
            "status": "ok",
            "ts": 1700000000123,
            "tick": {
                "id": 311869842695,
                "version": 311869842695,
                "open": 63500.0,
                "close": 64012.55,
                "low": 63200.1,
                "high": 64500.0,
                "amount": 3102.5,
                "vol": 198000000.2,
                "count": 183911,
                "bid": [64012.54, 0.3],
                "ask": [64012.55, 1.2]
            }
        }"#;

        let (tick, ts) = parse_merged(body, "btcusdt").unwrap();
        assert_eq!(
            support::decimal_from_number(PROVIDER_NAME, &tick.close).unwrap(),
            dec!(64012.55)
        );
        assert_eq!(ts, Some(1_700_000_000_123));
    }

    #[test]
    fn test_invalid_symbol() {
        let body = r#"{"status": "error", "err-code": "invalid-parameter", "err-msg": "invalid symbol", "data": null}"#;
        let err = parse_merged(body, "nopeusdt").unwrap_err();
        assert!(matches!(err, MarketDataError::SymbolNotFound { .. }));
    }

    #[test]
    fn test_other_errors_are_rejections() {
        let body = r#"{"status": "error", "err-code": "bad-request", "err-msg": "too many requests"}"#;
        let err = parse_merged(body, "btcusdt").unwrap_err();
        assert!(matches!(err, MarketDataError::ProviderError { message, .. } if message == "too many requests"));
    }

    #[test]
    fn test_klines_newest_first() {
        let body = r#"{
            "ch": "market.btcusdt.kline.1min",
            "status": "ok",
            "ts": 1700000061000,
            "data": [
                {"id": 1700000060, "open": 64010.0, "close": 64020.0, "low": 64000.0, "high": 64030.0, "amount": 1.0, "vol": 64015.0, "count": 10},
                {"id": 1700000000, "open": 64000.0, "close": 64010.0, "low": 63990.0, "high": 64015.0, "amount": 2.0, "vol": 128010.0, "count": 21}
            ]
        }"#;

        let candles = parse_klines(body, "btcusdt").unwrap();
        let target = Utc.timestamp_opt(1_700_000_030, 0).unwrap();

        assert_eq!(open_price_at(candles, target).unwrap(), 64000.0);
    }

    #[test]
    fn test_no_klines() {
        let body = r#"{"status": "ok", "data": []}"#;
        assert!(matches!(parse_klines(body, "btcusdt"), Err(LookupError::NoCandles)));
    }

    #[test]
    fn test_kline_extremes_are_kept() {
        let body = kline_page("1min", &[(1_700_000_000, 64000.0)]);
        let candles = parse_klines(&body, "btcusdt").unwrap();

        assert_eq!(candles[0].high, Some(64000.0));
        assert_eq!(candles[0].volume, Some(1.0));
    }

    #[tokio::test]
    async fn test_zero_open_widens_to_coarser_klines() {
        let target = Utc.timestamp_opt(1_700_000_030, 0).unwrap();
        let mut requested = Vec::new();

        let price = open_price_with_fallback(&MINUTE_KLINES, target, |(period, _)| {
            requested.push(period);
            let page = match period {
                "1min" => kline_page(period, &[(1_700_000_060, 64010.0), (1_700_000_000, 0.0)]),
                _ => kline_page(period, &[(1_700_000_100, 64050.0), (1_699_999_800, 63990.0)]),
            };
            async move { parse_klines(&page, "btcusdt") }
        })
        .await
        .unwrap();

        assert_eq!(price, 63990.0);
        assert_eq!(requested, ["1min", "5min"]);
    }

    #[tokio::test]
    async fn test_hourly_lookup_widens_too() {
        let target = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut requested = Vec::new();

        let price = open_price_with_fallback(&HOURLY_KLINES, target, |(period, size)| {
            requested.push((period, size));
            let open = if period == "60min" { 0.0 } else { 63000.0 };
            let page = kline_page(period, &[(1_699_999_200, open)]);
            async move { parse_klines(&page, "btcusdt") }
        })
        .await
        .unwrap();

        assert_eq!(price, 63000.0);
        assert_eq!(requested, [("60min", 48), ("4hour", 12)]);
    }
}
