//! CoinMarketCap adapter.
//!
//! Requires an API key sent as `X-CMC_PRO_API_KEY`. The quote already
//! carries the 1h and 24h changes, so no candle lookup is needed.
//!
//! API documentation: https://coinmarketcap.com/api/documentation/v1/

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::errors::MarketDataError;
use crate::http::HttpClient;
use crate::models::SymbolPrice;
use crate::provider::support;
use crate::provider::PriceSource;

const BASE_URL: &str = "https://pro-api.coinmarketcap.com";
const PROVIDER_NAME: &str = "CoinMarketCap";
const API_KEY_HEADER: &str = "X-CMC_PRO_API_KEY";
const CONVERT: &str = "USD";

// ============================================================================
// API Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct QuotesResponse {
    status: Status,
    #[serde(default)]
    data: HashMap<String, Vec<Listing>>,
}

#[derive(Debug, Deserialize)]
struct Status {
    error_code: i64,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    symbol: String,
    quote: HashMap<String, Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    price: Option<serde_json::Number>,
    percent_change_1h: Option<f64>,
    percent_change_24h: Option<f64>,
    last_updated: DateTime<Utc>,
}

// ============================================================================
// CoinMarketCapProvider
// ============================================================================

pub struct CoinMarketCapProvider {
    http: HttpClient,
    api_key: Option<String>,
}

impl CoinMarketCapProvider {
    pub fn new(http: HttpClient, api_key: Option<String>) -> Self {
        Self {
            http,
            api_key: api_key.filter(|key| !key.is_empty()),
        }
    }
}

#[async_trait]
impl PriceSource for CoinMarketCapProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn requires_api_key(&self) -> bool {
        true
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn get_symbol_price(&self, symbol: &str) -> Result<SymbolPrice, MarketDataError> {
        let api_key = self
            .api_key
            .clone()
            .ok_or_else(|| MarketDataError::rejected(PROVIDER_NAME, "API key is not configured"))?;

        let symbol = symbol.to_uppercase();
        let url = format!("{}/v2/cryptocurrency/quotes/latest", BASE_URL);
        let query = [
            ("symbol", symbol.clone()),
            ("convert", CONVERT.to_string()),
        ];
        let response = self
            .http
            .get_text(PROVIDER_NAME, &url, &query, &[(API_KEY_HEADER, api_key)])
            .await;

        parse_quote(&envelope_body(response)?, &symbol)
    }
}

/// Business errors (bad key, unknown symbol) come with a 4xx status and the
/// same envelope as a success, so their body is decoded too.
fn envelope_body(response: Result<String, MarketDataError>) -> Result<String, MarketDataError> {
    match response {
        Err(MarketDataError::HttpStatus { status, body, .. })
            if (400..500).contains(&status) && body.contains("error_code") =>
        {
            Ok(body)
        }
        other => other,
    }
}

fn parse_quote(body: &str, symbol: &str) -> Result<SymbolPrice, MarketDataError> {
    let response: QuotesResponse =
        serde_json::from_str(body).map_err(|e| MarketDataError::decode(PROVIDER_NAME, e))?;

    if response.status.error_code != 0 {
        let message = response
            .status
            .error_message
            .unwrap_or_else(|| format!("error code {}", response.status.error_code));
        return Err(MarketDataError::rejected(PROVIDER_NAME, message));
    }

    let not_found = || MarketDataError::SymbolNotFound {
        provider: PROVIDER_NAME.to_string(),
        symbol: symbol.to_string(),
    };

    // Several coins can share a ticker; the first is the highest ranked
    let listing = response
        .data
        .into_iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(symbol))
        .and_then(|(_, listings)| listings.into_iter().next())
        .ok_or_else(not_found)?;

    let quote = listing.quote.get(CONVERT).ok_or_else(|| {
        MarketDataError::decode(PROVIDER_NAME, format!("no {} quote for {}", CONVERT, symbol))
    })?;
    let price = quote.price.as_ref().ok_or_else(not_found)?;

    Ok(SymbolPrice::new(
        listing.symbol.clone(),
        support::decimal_from_number(PROVIDER_NAME, price)?,
        PROVIDER_NAME,
        quote.last_updated,
    )
    .with_change_1h(quote.percent_change_1h)
    .with_change_24h(quote.percent_change_24h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const QUOTE: &str = r#"{
        "status": {
            "timestamp": "2024-03-01T12:00:05.000Z",
            "error_code": 0,
            "error_message": null,
            "credit_count": 1
        },
        "data": {
            "BTC": [{
                "id": 1,
                "name": "Bitcoin",
                "symbol": "BTC",
                "cmc_rank": 1,
                "quote": {
                    "USD": {
                        "price": 61234.56789,
                        "volume_24h": 32000000000.5,
                        "percent_change_1h": 0.25,
                        "percent_change_24h": -1.75,
                        "last_updated": "2024-03-01T12:00:00.000Z"
                    }
                }
            }]
        }
    }"#;

    #[test]
    fn test_parse_quote() {
        let price = parse_quote(QUOTE, "BTC").unwrap();

        assert_eq!(price.symbol, "BTC");
        assert_eq!(price.source, "CoinMarketCap");
        assert_eq!(price.price, dec!(61234.56789));
        assert_eq!(price.percent_change_1h, Some(0.25));
        assert_eq!(price.percent_change_24h, Some(-1.75));
    }

    #[test]
    fn test_unknown_symbol() {
        let body = r#"{"status": {"error_code": 0, "error_message": null}, "data": {"NOPE": []}}"#;
        let err = parse_quote(body, "NOPE").unwrap_err();
        assert!(matches!(err, MarketDataError::SymbolNotFound { .. }));
    }

    #[test]
    fn test_api_error() {
        let body = r#"{"status": {"error_code": 1001, "error_message": "This API Key is invalid."}}"#;
        let err = parse_quote(body, "BTC").unwrap_err();
        assert!(matches!(err, MarketDataError::ProviderError { message, .. } if message == "This API Key is invalid."));
    }

    #[test]
    fn test_long_client_error_keeps_vendor_message() {
        let message = format!("Invalid value for \\\"symbol\\\": \\\"{}\\\"", "X,".repeat(150));
        let body = format!(
            r#"{{"status": {{"timestamp": "2024-03-01T12:00:05.000Z", "error_code": 400, "error_message": "{}", "elapsed": 0, "credit_count": 0}}}}"#,
            message
        );
        assert!(body.len() > 300);

        let response = Err(MarketDataError::HttpStatus {
            provider: PROVIDER_NAME.to_string(),
            status: 400,
            body,
        });
        let err = parse_quote(&envelope_body(response).unwrap(), "BTC").unwrap_err();

        assert!(
            matches!(err, MarketDataError::ProviderError { ref message, .. } if message.starts_with("Invalid value for")),
            "{}",
            err
        );
    }

    #[test]
    fn test_server_errors_are_not_decoded() {
        let response = Err(MarketDataError::HttpStatus {
            provider: PROVIDER_NAME.to_string(),
            status: 502,
            body: r#"{"error_code": "bad gateway"}"#.to_string(),
        });
        assert!(matches!(
            envelope_body(response),
            Err(MarketDataError::HttpStatus { status: 502, .. })
        ));
    }

    #[test]
    fn test_configuration_follows_api_key() {
        let http = HttpClient::new(&crate::config::SourceConfig::default()).unwrap();

        let without = CoinMarketCapProvider::new(http.clone(), None);
        assert!(without.requires_api_key());
        assert!(!without.is_configured());

        let blank = CoinMarketCapProvider::new(http.clone(), Some(String::new()));
        assert!(!blank.is_configured());

        let with = CoinMarketCapProvider::new(http, Some("key".to_string()));
        assert!(with.is_configured());
    }
}
