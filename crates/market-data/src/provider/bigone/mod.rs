//! BigONE spot adapter (API v3).
//!
//! - Current price from `/asset_pairs/{pair}/ticker` (`close`)
//! - 1h change from 1 minute candles, widened to 5 minutes on a zero price
//! - 24h change from 15 minute candles, widened to hourly ones
//!
//! Pairs are dash separated (`BTC-USDT`). Candles come back newest first,
//! ending at the `time` parameter.

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::errors::{LookupError, MarketDataError};
use crate::history::{change_or_warn, open_price_with_fallback, Lookback};
use crate::http::HttpClient;
use crate::models::{Candle, SymbolPrice};
use crate::provider::support::{self, window_end};
use crate::provider::PriceSource;

const BASE_URL: &str = "https://big.one/api/v3";
const PROVIDER_NAME: &str = "BigONE";

/// "Resource not found"
const NOT_FOUND_CODE: i64 = 10013;

// ============================================================================
// API Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct Ticker {
    close: String,
}

#[derive(Debug, Deserialize)]
struct RawCandle {
    time: DateTime<Utc>,
    open: String,
    high: Option<String>,
    low: Option<String>,
    close: Option<String>,
    volume: Option<String>,
}

// ============================================================================
// BigOneProvider
// ============================================================================

pub struct BigOneProvider {
    http: HttpClient,
}

impl BigOneProvider {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    async fn get_body(&self, pair: &str, url: &str, query: &[(&str, String)]) -> Result<String, MarketDataError> {
        match self.http.get_text(PROVIDER_NAME, url, query, &[]).await {
            // Errors share the envelope, so let it speak for the failure
            Err(MarketDataError::HttpStatus { status, body, .. }) if body.contains("\"code\"") => {
                match unwrap_envelope::<serde_json::Value>(&body, pair) {
                    Err(e) => Err(e),
                    Ok(_) => Err(MarketDataError::HttpStatus {
                        provider: PROVIDER_NAME.to_string(),
                        status,
                        body,
                    }),
                }
            }
            Err(MarketDataError::HttpStatus { status: 404, .. }) => Err(MarketDataError::SymbolNotFound {
                provider: PROVIDER_NAME.to_string(),
                symbol: pair.to_string(),
            }),
            other => other,
        }
    }

    async fn candles(
        &self,
        pair: &str,
        period: &str,
        target: DateTime<Utc>,
    ) -> Result<Vec<Candle>, LookupError> {
        let url = format!("{}/asset_pairs/{}/candles", BASE_URL, pair);
        let end = window_end(target, period_step(period));
        let query = [
            ("period", period.to_string()),
            ("time", end.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("limit", "10".to_string()),
        ];
        let body = self.get_body(pair, &url, &query).await?;
        parse_candles(&body, pair)
    }
}

#[async_trait]
impl PriceSource for BigOneProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn get_symbol_price(&self, symbol: &str) -> Result<SymbolPrice, MarketDataError> {
        let pair = symbol.to_uppercase();
        let url = format!("{}/asset_pairs/{}/ticker", BASE_URL, pair);
        let body = self.get_body(&pair, &url, &[]).await?;
        let ticker = parse_ticker(&body, &pair)?;

        let price = support::decimal(PROVIDER_NAME, &ticker.close)?;
        let current = support::as_f64(&price);
        let now = Utc::now();

        let target = Lookback::OneHour.target(now);
        let historical = open_price_with_fallback(&["min1", "min5"], target, |period| {
            self.candles(&pair, period, target)
        })
        .await;
        let change_1h = change_or_warn(PROVIDER_NAME, &pair, Lookback::OneHour, current, historical);

        let target = Lookback::OneDay.target(now);
        let historical = open_price_with_fallback(&["min15", "hour1"], target, |period| {
            self.candles(&pair, period, target)
        })
        .await;
        let change_24h = change_or_warn(PROVIDER_NAME, &pair, Lookback::OneDay, current, historical);

        Ok(SymbolPrice::new(pair, price, PROVIDER_NAME, now)
            .with_change_1h(change_1h)
            .with_change_24h(change_24h))
    }
}

fn period_step(period: &str) -> Duration {
    match period {
        "min5" => Duration::minutes(5),
        "min15" => Duration::minutes(15),
        "hour1" => Duration::hours(1),
        _ => Duration::minutes(1),
    }
}

fn unwrap_envelope<T: DeserializeOwned>(body: &str, pair: &str) -> Result<T, MarketDataError> {
    let envelope: Envelope<T> =
        serde_json::from_str(body).map_err(|e| MarketDataError::decode(PROVIDER_NAME, e))?;

    match envelope.code {
        0 => envelope
            .data
            .ok_or_else(|| MarketDataError::decode(PROVIDER_NAME, "missing data")),
        NOT_FOUND_CODE => Err(MarketDataError::SymbolNotFound {
            provider: PROVIDER_NAME.to_string(),
            symbol: pair.to_string(),
        }),
        code => Err(MarketDataError::rejected(
            PROVIDER_NAME,
            envelope
                .message
                .unwrap_or_else(|| format!("error code {}", code)),
        )),
    }
}

fn parse_ticker(body: &str, pair: &str) -> Result<Ticker, MarketDataError> {
    unwrap_envelope(body, pair)
}

fn parse_candles(body: &str, pair: &str) -> Result<Vec<Candle>, LookupError> {
    let rows: Vec<RawCandle> = unwrap_envelope(body, pair)?;
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
                high: extra(row.high),
                low: extra(row.low),
                close: extra(row.close),
                volume: extra(row.volume),
                ..Candle::new(row.time, open)
            })
        })
        .collect()
}
