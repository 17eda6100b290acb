//! OKX spot adapter (API v5).
//!
//! Responses are wrapped in `{"code": "0", "msg": "", "data": [...]}`;
//! a non-zero code is a rejection. History candles come back newest first.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::errors::{LookupError, MarketDataError};
use crate::history::{
    change_or_warn, decode_rows, open_price_with_fallback, percent_change, CandleLayout, Lookback,
    TimeUnit,
};
use crate::http::HttpClient;
use crate::models::{Candle, SymbolPrice};
use crate::provider::support;
use crate::provider::PriceSource;

const BASE_URL: &str = "https://www.okx.com/api/v5";
const PROVIDER_NAME: &str = "OKX";

/// "Instrument ID does not exist"
const UNKNOWN_INSTRUMENT_CODE: &str = "51001";

/// `[ts, o, h, l, c, vol, volCcy, volCcyQuote, confirm]`, ts in millis
const CANDLE_LAYOUT: CandleLayout = CandleLayout::new(0, 1, TimeUnit::Millis).with_hlcv(2, 3, 4, 5);

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker {
    last: String,
    open24h: String,
    /// Unix millis, as a string
    ts: String,
}

pub struct OkxProvider {
    http: HttpClient,
}

impl OkxProvider {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    async fn candles(
        &self,
        inst_id: &str,
        bar: &str,
        target: DateTime<Utc>,
    ) -> Result<Vec<Candle>, LookupError> {
        let url = format!("{}/market/history-candles", BASE_URL);
        // `after` pages backwards: only candles strictly older than it
        let query = [
            ("instId", inst_id.to_string()),
            ("bar", bar.to_string()),
            ("after", (target + Duration::milliseconds(1)).timestamp_millis().to_string()),
            ("limit", "10".to_string()),
        ];
        let body = self.http.get_text(PROVIDER_NAME, &url, &query, &[]).await?;
        parse_candles(&body, inst_id)
    }
}

#[async_trait]
impl PriceSource for OkxProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn get_symbol_price(&self, symbol: &str) -> Result<SymbolPrice, MarketDataError> {
        let inst_id = symbol.to_uppercase();
        let url = format!("{}/market/ticker", BASE_URL);
        let body = self
            .http
            .get_text(PROVIDER_NAME, &url, &[("instId", inst_id.clone())], &[])
            .await?;
        let ticker = parse_ticker(&body, &inst_id)?;

        let price = support::decimal(PROVIDER_NAME, &ticker.last)?;
        let millis = ticker
            .ts
            .parse::<i64>()
            .map_err(|e| MarketDataError::decode(PROVIDER_NAME, e))?;
        let updated_at = support::from_millis(PROVIDER_NAME, millis)?;
        let current = support::as_f64(&price);

        let target = Lookback::OneHour.target(Utc::now());
        let historical = open_price_with_fallback(&["1m", "5m"], target, |bar| {
            self.candles(&inst_id, bar, target)
        })
        .await;
        let change_1h = change_or_warn(PROVIDER_NAME, &inst_id, Lookback::OneHour, current, historical);

        let change_24h = support::float(PROVIDER_NAME, &ticker.open24h)
            .ok()
            .and_then(|open| percent_change(current, open));

        Ok(SymbolPrice::new(inst_id, price, PROVIDER_NAME, updated_at)
            .with_change_1h(change_1h)
            .with_change_24h(change_24h))
    }
}

fn unwrap_envelope<T: DeserializeOwned>(body: &str, inst_id: &str) -> Result<Vec<T>, MarketDataError> {
    let envelope: Envelope<T> =
        serde_json::from_str(body).map_err(|e| MarketDataError::decode(PROVIDER_NAME, e))?;

    match envelope.code.as_str() {
        "0" => Ok(envelope.data),
        UNKNOWN_INSTRUMENT_CODE => Err(MarketDataError::SymbolNotFound {
            provider: PROVIDER_NAME.to_string(),
            symbol: inst_id.to_string(),
        }),
        code => Err(MarketDataError::rejected(
            PROVIDER_NAME,
            format!("{} (code {})", envelope.msg, code),
        )),
    }
}

fn parse_ticker(body: &str, inst_id: &str) -> Result<Ticker, MarketDataError> {
    unwrap_envelope::<Ticker>(body, inst_id)?
        .into_iter()
        .next()
        .ok_or_else(|| MarketDataError::SymbolNotFound {
            provider: PROVIDER_NAME.to_string(),
            symbol: inst_id.to_string(),
        })
}

fn parse_candles(body: &str, inst_id: &str) -> Result<Vec<Candle>, LookupError> {
    let rows = unwrap_envelope::<Vec<Value>>(body, inst_id)?;
    decode_rows(&rows, CANDLE_LAYOUT)
}
