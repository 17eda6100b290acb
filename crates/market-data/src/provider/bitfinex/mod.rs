//! Bitfinex adapter (public API v2).
//!
//! Tickers and candles are positional JSON arrays. Errors come back as
//! `["error", code, "message"]`.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::errors::{LookupError, MarketDataError};
use crate::history::{
    change_or_warn, decode_rows, open_price_with_fallback, CandleLayout, Lookback, TimeUnit,
};
use crate::http::HttpClient;
use crate::models::{Candle, SymbolPrice};
use crate::provider::support::{self, window_end, window_start};
use crate::provider::PriceSource;

const BASE_URL: &str = "https://api-pub.bitfinex.com/v2";
const PROVIDER_NAME: &str = "Bitfinex";

/// Position of LAST_PRICE in the ticker array
const LAST_PRICE_INDEX: usize = 6;

const CANDLE_LAYOUT: CandleLayout = CandleLayout::new(0, 1, TimeUnit::Millis).with_hlcv(3, 4, 2, 5);

pub struct BitfinexProvider {
    http: HttpClient,
}

impl BitfinexProvider {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    async fn candles(
        &self,
        symbol: &str,
        frame: &str,
        target: DateTime<Utc>,
    ) -> Result<Vec<Candle>, LookupError> {
        let step = frame_step(frame);
        let url = format!("{}/candles/trade:{}:t{}/hist", BASE_URL, frame, symbol);
        let query = [
            ("start", window_start(target, step).timestamp_millis().to_string()),
            ("end", window_end(target, step).timestamp_millis().to_string()),
            ("sort", "1".to_string()),
            ("limit", "10".to_string()),
        ];

        let body = self.http.get_text(PROVIDER_NAME, &url, &query, &[]).await?;
        parse_candles(&body)
    }
}

#[async_trait]
impl PriceSource for BitfinexProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn get_symbol_price(&self, symbol: &str) -> Result<SymbolPrice, MarketDataError> {
        let symbol = symbol.to_uppercase();
        let url = format!("{}/ticker/t{}", BASE_URL, symbol);
        let body = self.http.get_text(PROVIDER_NAME, &url, &[], &[]).await?;
        let price = parse_last_price(&body, &symbol)?;
        let current = support::as_f64(&price);
        let now = Utc::now();

        let target_1h = Lookback::OneHour.target(now);
        let historical = open_price_with_fallback(&["1m", "5m"], target_1h, |frame| {
            self.candles(&symbol, frame, target_1h)
        })
        .await;
        let change_1h = change_or_warn(PROVIDER_NAME, &symbol, Lookback::OneHour, current, historical);

        let target_24h = Lookback::OneDay.target(now);
        let historical = open_price_with_fallback(&["15m"], target_24h, |frame| {
            self.candles(&symbol, frame, target_24h)
        })
        .await;
        let change_24h = change_or_warn(PROVIDER_NAME, &symbol, Lookback::OneDay, current, historical);

        Ok(SymbolPrice::new(symbol, price, PROVIDER_NAME, now)
            .with_change_1h(change_1h)
            .with_change_24h(change_24h))
    }
}

fn frame_step(frame: &str) -> Duration {
    match frame {
        "5m" => Duration::minutes(5),
        "15m" => Duration::minutes(15),
        _ => Duration::minutes(1),
    }
}

/// Reject `["error", code, message]` bodies.
fn check_error(values: &[Value]) -> Result<(), MarketDataError> {
    if values.first().and_then(Value::as_str) == Some("error") {
        let message = values
            .get(2)
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(MarketDataError::rejected(PROVIDER_NAME, message));
    }
    Ok(())
}

fn parse_last_price(body: &str, symbol: &str) -> Result<rust_decimal::Decimal, MarketDataError> {
    let values: Vec<Value> =
        serde_json::from_str(body).map_err(|e| MarketDataError::decode(PROVIDER_NAME, e))?;
    check_error(&values)?;

    // Unknown pairs answer with an empty array
    let last = values
        .get(LAST_PRICE_INDEX)
        .ok_or_else(|| MarketDataError::SymbolNotFound {
            provider: PROVIDER_NAME.to_string(),
            symbol: symbol.to_string(),
        })?;

    match last {
        Value::Number(n) => support::decimal_from_number(PROVIDER_NAME, n),
        other => Err(MarketDataError::decode(
            PROVIDER_NAME,
            format!("last price is not a number: {}", other),
        )),
    }
}

fn parse_candles(body: &str) -> Result<Vec<Candle>, LookupError> {
    let values: Vec<Value> =
        serde_json::from_str(body).map_err(|e| MarketDataError::decode(PROVIDER_NAME, e))?;
    check_error(&values)?;

    let rows = values
        .into_iter()
        .enumerate()
        .map(|(index, row)| match row {
            Value::Array(cells) => Ok(cells),
            other => Err(LookupError::MalformedCandle {
                index,
                reason: format!("expected an array, got {}", other),
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    decode_rows(&rows, CANDLE_LAYOUT)
}
