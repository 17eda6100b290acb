//! Error types for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: failure of a single fetch from one price source
//! - [`ConfigError`]: wiring/configuration problems that must stop the process
//! - [`LookupError`]: failures of the historical candle lookup

mod lookup;

pub use lookup::LookupError;

use thiserror::Error;

/// How much of a failed response body is shown in messages.
const MAX_BODY_PREVIEW_CHARS: usize = 200;

fn body_preview(body: &str) -> String {
    body.chars().take(MAX_BODY_PREVIEW_CHARS).collect()
}

/// Errors that can occur while fetching a price from a source.
///
/// These never abort a batch: the aggregator logs them and drops the
/// affected symbol from the output.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// The source does not know the requested symbol.
    #[error("Symbol not found: {symbol} ({provider})")]
    SymbolNotFound {
        /// The source that rejected the symbol
        provider: String,
        /// The symbol as requested by the caller
        symbol: String,
    },

    /// The request to the source timed out.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The source that timed out
        provider: String,
    },

    /// The source rate limited the request (HTTP 429).
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The source that rate limited the request
        provider: String,
    },

    /// The source answered with a non-2xx status.
    #[error("HTTP {status} from {provider}: {}", body_preview(.body))]
    HttpStatus {
        /// The source that answered
        provider: String,
        /// HTTP status code
        status: u16,
        /// Full response body; only its leading part is displayed
        body: String,
    },

    /// The source rejected the request at the business level.
    #[error("Provider error: {provider} - {message}")]
    ProviderError {
        /// The source that returned the error
        provider: String,
        /// The error message from the source
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("Decode error: {provider} - {message}")]
    Decode {
        /// The source whose payload failed to decode
        provider: String,
        /// What went wrong
        message: String,
    },

    /// A network error occurred while communicating with a source.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl MarketDataError {
    /// Whether this failure was caused by a request timing out.
    ///
    /// # Examples
    ///
    /// ```
    /// use token_ticker_market_data::errors::MarketDataError;
    ///
    /// let error = MarketDataError::Timeout { provider: "Binance".to_string() };
    /// assert!(error.is_timeout());
    ///
    /// let error = MarketDataError::RateLimited { provider: "Binance".to_string() };
    /// assert!(!error.is_timeout());
    /// ```
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Network(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Shorthand for a decode failure.
    pub fn decode(provider: &str, message: impl std::fmt::Display) -> Self {
        Self::Decode {
            provider: provider.to_string(),
            message: message.to_string(),
        }
    }

    /// Shorthand for a business-level rejection.
    pub fn rejected(provider: &str, message: impl Into<String>) -> Self {
        Self::ProviderError {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}

/// Configuration and wiring errors.
///
/// Any of these is fatal: they are surfaced before a single query runs.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Two providers yielded the same case-insensitive source name.
    #[error("{name:?} already exists in the source registry")]
    DuplicateSource {
        /// Display name of the second source registered under the name
        name: String,
    },

    /// A queried source needs an API key that was not supplied.
    #[error("{source_name} requires an API key")]
    MissingApiKey {
        /// Display name of the source
        source_name: String,
    },

    /// The proxy URL could not be parsed.
    #[error("Invalid proxy URL {url:?}: {message}")]
    InvalidProxy {
        /// The configured proxy URL
        url: String,
        /// Parser message
        message: String,
    },

    /// The shared HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    /// A query definition could not be understood.
    #[error("Unrecognized query {0:?}, expecting {{exchange}}.{{token}}[.api_key]")]
    InvalidQuery(String),
}
