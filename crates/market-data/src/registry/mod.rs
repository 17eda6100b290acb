//! Source registry module.
//!
//! This module provides:
//! - Provider registration (an explicit list of constructors)
//! - The built-once registry with case-insensitive lookup
//! - Concurrent, order-preserving aggregation of price queries
//! - Per-batch diagnostics

mod aggregator;
mod diagnostics;
mod providers;
#[allow(clippy::module_inception)]
mod registry;

pub use aggregator::PriceAggregator;
pub use diagnostics::{BatchDiagnostics, FetchFailure};
pub use providers::{ProviderConstructor, ProviderList};
pub use registry::SourceRegistry;
