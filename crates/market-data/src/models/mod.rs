//! Market data models
//!
//! This module contains the core data types shared by sources, the registry
//! and the aggregator:
//! - `types` - Source name normalization
//! - `symbol_price` - The normalized price record returned to callers (SymbolPrice)
//! - `query` - What the caller asks for (PriceQuery)
//! - `candle` - Historical OHLCV bucket consumed by the lookup (Candle)

mod candle;
mod query;
mod symbol_price;
mod types;

pub use candle::Candle;
pub use query::PriceQuery;
pub use symbol_price::SymbolPrice;
pub use types::canonical_name;
