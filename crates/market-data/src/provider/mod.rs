//! Price source abstractions and implementations.
//!
//! This module contains:
//! - The `PriceSource` trait that all exchange adapters implement
//! - The context handed to provider constructors
//! - Concrete adapters (Binance, Coinbase, Kraken, etc.)
//!
//! # Composition
//!
//! Adapters are not discovered. [`builtin_providers`] lists them explicitly
//! and the caller passes that list (or its own) to
//! [`SourceRegistry::build`](crate::registry::SourceRegistry::build).

mod context;
pub(crate) mod support;
mod traits;

pub mod bigone;
pub mod binance;
pub mod bitfinex;
pub mod coinbase;
pub mod coinmarketcap;
pub mod gate;
pub mod hitbtc;
pub mod huobi;
pub mod kraken;
pub mod okx;
pub mod poloniex;

use std::sync::Arc;

use crate::registry::ProviderList;

pub use context::ProviderContext;
pub use traits::PriceSource;

/// Constructors for every built-in adapter.
pub fn builtin_providers() -> ProviderList {
    ProviderList::new()
        .with(|ctx| Arc::new(bigone::BigOneProvider::new(ctx.http.clone())))
        .with(|ctx| Arc::new(binance::BinanceProvider::new(ctx.http.clone())))
        .with(|ctx| Arc::new(bitfinex::BitfinexProvider::new(ctx.http.clone())))
        .with(|ctx| Arc::new(coinbase::CoinbaseProvider::new(ctx.http.clone())))
        .with(|ctx| {
            Arc::new(coinmarketcap::CoinMarketCapProvider::new(
                ctx.http.clone(),
                ctx.api_key("CoinMarketCap"),
            ))
        })
        .with(|ctx| Arc::new(gate::GateProvider::new(ctx.http.clone())))
        .with(|ctx| Arc::new(hitbtc::HitBtcProvider::new(ctx.http.clone())))
        .with(|ctx| Arc::new(huobi::HuobiProvider::new(ctx.http.clone())))
        .with(|ctx| Arc::new(kraken::KrakenProvider::new(ctx.http.clone())))
        .with(|ctx| Arc::new(okx::OkxProvider::new(ctx.http.clone())))
        .with(|ctx| Arc::new(poloniex::PoloniexProvider::new(ctx.http.clone())))
}
