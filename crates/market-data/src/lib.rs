//! Token Ticker Market Data Crate
//!
//! This crate fetches current prices and recent percentage changes of
//! crypto-asset symbols from many exchanges at once.
//!
//! # Overview
//!
//! - One capability contract ([`PriceSource`]) implemented by every exchange adapter
//! - A built-once [`SourceRegistry`] with case-insensitive lookup
//! - A [`PriceAggregator`] that fans out one task per (source, symbol) and
//!   returns the prices in request order, dropping failures
//! - A shared historical candle lookup used to compute 1h/24h changes
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! |  PriceQuery[]    |  (exchange name + symbols)
//! +------------------+
//!          |
//!          v
//! +------------------+     +------------------+
//! | PriceAggregator  | --> |  SourceRegistry  |  (name -> PriceSource)
//! +------------------+     +------------------+
//!          |
//!          v  one task per symbol
//! +------------------+     +------------------+
//! |   PriceSource    | --> |     history      |  (candle lookup, % change)
//! +------------------+     +------------------+
//!          |
//!          v
//! +------------------+
//! |  SymbolPrice[]   |  (input order, failures elided)
//! +------------------+
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use token_ticker_market_data::{
//!     builtin_providers, HttpClient, PriceAggregator, PriceQuery, SourceConfig, SourceRegistry,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SourceConfig::default();
//! let http = HttpClient::new(&config)?;
//! let registry = SourceRegistry::build(&builtin_providers(), &config, http)?;
//!
//! let aggregator = PriceAggregator::new(Arc::new(registry));
//! let prices = aggregator
//!     .fetch_all(&[PriceQuery::new("Binance", ["BTCUSDT", "ETHUSDT"])])
//!     .await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod history;
pub mod http;
pub mod models;
pub mod provider;
pub mod registry;

pub use config::{SourceConfig, DEFAULT_TIMEOUT};
pub use errors::{ConfigError, LookupError, MarketDataError};
pub use http::HttpClient;
pub use models::{canonical_name, Candle, PriceQuery, SymbolPrice};
pub use provider::{builtin_providers, PriceSource, ProviderContext};
pub use registry::{
    BatchDiagnostics, FetchFailure, PriceAggregator, ProviderConstructor, ProviderList,
    SourceRegistry,
};
