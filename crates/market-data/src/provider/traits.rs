//! Price source trait definitions.
//!
//! This module defines the `PriceSource` trait that every exchange or
//! aggregator adapter implements.

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::SymbolPrice;

/// Trait for price sources.
///
/// Implement this trait to add support for a new exchange. Adapters may
/// issue any number of requests (a ticker call plus candle lookups, sleeps
/// to respect vendor limits) but present a single call to the aggregator.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use token_ticker_market_data::provider::PriceSource;
///
/// struct MyExchange {
///     http: HttpClient,
/// }
///
/// #[async_trait]
/// impl PriceSource for MyExchange {
///     fn name(&self) -> &str {
///         "MyExchange"
///     }
///
///     async fn get_symbol_price(&self, symbol: &str) -> Result<SymbolPrice, MarketDataError> {
///         // ... fetch the ticker, look up historical candles
///     }
/// }
/// ```
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Display name of this source.
    ///
    /// Used as the registry key (matched case-insensitively) and as
    /// [`SymbolPrice::source`]. Must be stable for the life of the process.
    fn name(&self) -> &str;

    /// Whether the source refuses to work without an API key.
    fn requires_api_key(&self) -> bool {
        false
    }

    /// Whether the source has everything it needs to serve requests.
    ///
    /// Checked for queried sources before any fetch starts.
    fn is_configured(&self) -> bool {
        true
    }

    /// Fetch the current price of one symbol.
    ///
    /// A failure of the current price fails the whole symbol; failures of
    /// historical lookups only leave the affected percentage change unknown.
    async fn get_symbol_price(&self, symbol: &str) -> Result<SymbolPrice, MarketDataError>;
}
