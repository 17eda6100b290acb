//! Binance spot market adapter.
//!
//! - Current price and 24h change from `/api/v3/ticker/24hr`
//! - 1h change from `/api/v3/klines` (1m candles, widened to 5m on a zero price)
//!
//! API documentation: https://binance-docs.github.io/apidocs/spot/en/

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
use crate::provider::support::{self, window_start};
use crate::provider::PriceSource;

const BASE_URL: &str = "https://api.binance.com";
const PROVIDER_NAME: &str = "Binance";

/// Binance rejects unknown symbols with this error code.
const INVALID_SYMBOL_CODE: &str = "-1121";

const KLINE_LAYOUT: CandleLayout = CandleLayout::new(0, 1, TimeUnit::Millis).with_hlcv(2, 3, 4, 5);

// ============================================================================
// API Response Structures
// ============================================================================

/// Response from /api/v3/ticker/24hr
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker24h {
    last_price: String,
    price_change_percent: String,
    /// Close of the statistics window (Unix millis)
    close_time: i64,
}

// ============================================================================
// BinanceProvider
// ============================================================================

pub struct BinanceProvider {
    http: HttpClient,
}

impl BinanceProvider {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    async fn ticker(&self, symbol: &str) -> Result<Ticker24h, MarketDataError> {
        let url = format!("{}/api/v3/ticker/24hr", BASE_URL);
        self.http
            .get_json(PROVIDER_NAME, &url, &[("symbol", symbol.to_string())], &[])
            .await
            .map_err(|e| match e {
                MarketDataError::HttpStatus { status: 400, body, .. }
                    if body.contains(INVALID_SYMBOL_CODE) =>
                {
                    MarketDataError::SymbolNotFound {
                        provider: PROVIDER_NAME.to_string(),
                        symbol: symbol.to_string(),
                    }
                }
                other => other,
            })
    }

    async fn klines(
        &self,
        symbol: &str,
        interval: &str,
        target: DateTime<Utc>,
    ) -> Result<Vec<Candle>, LookupError> {
        let step = interval_step(interval);
        let url = format!("{}/api/v3/klines", BASE_URL);
        let query = [
            ("symbol", symbol.to_string()),
            ("interval", interval.to_string()),
            (
                "startTime",
                window_start(target, step).timestamp_millis().to_string(),
            ),
            ("limit", "10".to_string()),
        ];

        let body = self.http.get_text(PROVIDER_NAME, &url, &query, &[]).await?;
        parse_klines(&body)
    }
}

#[async_trait]
impl PriceSource for BinanceProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn get_symbol_price(&self, symbol: &str) -> Result<SymbolPrice, MarketDataError> {
        let symbol = symbol.to_uppercase();
        let ticker = self.ticker(&symbol).await?;

        let price = support::decimal(PROVIDER_NAME, &ticker.last_price)?;
        let updated_at = support::from_millis(PROVIDER_NAME, ticker.close_time)?;
        let current = support::as_f64(&price);

        let target = Lookback::OneHour.target(Utc::now());
        let historical = open_price_with_fallback(&["1m", "5m"], target, |interval| {
            self.klines(&symbol, interval, target)
        })
        .await;
        let change_1h = change_or_warn(PROVIDER_NAME, &symbol, Lookback::OneHour, current, historical);

        let change_24h = support::float(PROVIDER_NAME, &ticker.price_change_percent).ok();

        Ok(SymbolPrice::new(symbol, price, PROVIDER_NAME, updated_at)
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

fn parse_klines(body: &str) -> Result<Vec<Candle>, LookupError> {
    let rows: Vec<Vec<Value>> =
        serde_json::from_str(body).map_err(|e| MarketDataError::decode(PROVIDER_NAME, e))?;
    decode_rows(&rows, KLINE_LAYOUT)
}
