//! HitBTC spot adapter (API v3).
//!
//! The ticker includes the 24h `open`, so only the 1h change needs candles.
//! Errors come back as `{"error": {"code": N, "message": ".."}}`.

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Deserialize;

use crate::errors::{LookupError, MarketDataError};
use crate::history::{change_or_warn, open_price_with_fallback, percent_change, Lookback};
use crate::http::HttpClient;
use crate::models::{Candle, SymbolPrice};
use crate::provider::support::{self, window_end, window_start};
use crate::provider::PriceSource;

const BASE_URL: &str = "https://api.hitbtc.com/api/3/public";
const PROVIDER_NAME: &str = "HitBTC";

/// "Symbol not found"
const SYMBOL_NOT_FOUND_CODE: i64 = 2001;

#[derive(Debug, Deserialize)]
struct Ticker {
    last: Option<String>,
    open: Option<String>,
    timestamp: DateTime<Utc>,
}

/// Extremes are named `min` / `max` by the vendor.
#[derive(Debug, Deserialize)]
struct RawCandle {
    timestamp: DateTime<Utc>,
    open: String,
    close: Option<String>,
    min: Option<String>,
    max: Option<String>,
    volume: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    code: i64,
    message: String,
}

pub struct HitBtcProvider {
    http: HttpClient,
}

impl HitBtcProvider {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    async fn candles(
        &self,
        symbol: &str,
        period: &str,
        target: DateTime<Utc>,
    ) -> Result<Vec<Candle>, LookupError> {
        let step = period_step(period);
        let url = format!("{}/candles/{}", BASE_URL, symbol);
        let query = [
            ("period", period.to_string()),
            ("from", window_start(target, step).to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("till", window_end(target, step).to_rfc3339_opts(SecondsFormat::Secs, true)),
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
impl PriceSource for HitBtcProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn get_symbol_price(&self, symbol: &str) -> Result<SymbolPrice, MarketDataError> {
        let symbol = symbol.to_uppercase();
        let url = format!("{}/ticker/{}", BASE_URL, symbol);
        let body = self
            .http
            .get_text(PROVIDER_NAME, &url, &[], &[])
            .await
            .map_err(|e| map_error(e, &symbol))?;
        let ticker = parse_ticker(&body)?;

        // No trades yet on a freshly listed market
        let last = ticker.last.ok_or_else(|| MarketDataError::SymbolNotFound {
            provider: PROVIDER_NAME.to_string(),
            symbol: symbol.clone(),
        })?;
        let price = support::decimal(PROVIDER_NAME, &last)?;
        let current = support::as_f64(&price);

        let target = Lookback::OneHour.target(Utc::now());
        let historical = open_price_with_fallback(&["M1", "M5"], target, |period| {
            self.candles(&symbol, period, target)
        })
        .await;
        let change_1h = change_or_warn(PROVIDER_NAME, &symbol, Lookback::OneHour, current, historical);

        let change_24h = ticker
            .open
            .and_then(|open| support::float(PROVIDER_NAME, &open).ok())
            .and_then(|open| percent_change(current, open));

        Ok(SymbolPrice::new(symbol, price, PROVIDER_NAME, ticker.timestamp)
            .with_change_1h(change_1h)
            .with_change_24h(change_24h))
    }
}

fn period_step(period: &str) -> Duration {
    match period {
        "M5" => Duration::minutes(5),
        _ => Duration::minutes(1),
    }
}

fn map_error(error: MarketDataError, symbol: &str) -> MarketDataError {
    let parsed = match &error {
        MarketDataError::HttpStatus { body, .. } => serde_json::from_str::<ErrorBody>(body).ok(),
        _ => None,
    };
    match parsed {
        Some(ErrorBody { error: detail }) if detail.code == SYMBOL_NOT_FOUND_CODE => {
            MarketDataError::SymbolNotFound {
                provider: PROVIDER_NAME.to_string(),
                symbol: symbol.to_string(),
            }
        }
        Some(ErrorBody { error: detail }) => MarketDataError::rejected(
            PROVIDER_NAME,
            format!("{} (code {})", detail.message, detail.code),
        ),
        None => error,
    }
}

fn parse_ticker(body: &str) -> Result<Ticker, MarketDataError> {
    serde_json::from_str(body).map_err(|e| MarketDataError::decode(PROVIDER_NAME, e))
}

fn parse_candles(body: &str) -> Result<Vec<Candle>, LookupError> {
    let rows: Vec<RawCandle> =
        serde_json::from_str(body).map_err(|e| MarketDataError::decode(PROVIDER_NAME, e))?;
    if rows.is_empty() {
        return Err(LookupError::NoCandles);
    }

    rows.into_iter()
        .enumerate()
        .map(|(index, row)| {
            let open = support::float(PROVIDER_NAME, &row.open).map_err(|_| {
                LookupError::MalformedCandle {
                    index,
                    reason: format!("open price is not a number: {:?}", row.open),
                }
            })?;
            let extra = |raw: Option<String>| raw.and_then(|r| support::float(PROVIDER_NAME, &r).ok());
            Ok(Candle {
                high: extra(row.max),
                low: extra(row.min),
                close: extra(row.close),
                volume: extra(row.volume),
                ..Candle::new(row.timestamp, open)
            })
        })
        .collect()
}
