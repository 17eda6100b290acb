use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Normalized price of one symbol from one source.
///
/// Produced fresh for every request and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SymbolPrice {
    /// Symbol as reported by the source (usually the requested one)
    pub symbol: String,

    /// Last traded price, serialized as a decimal string
    pub price: Decimal,

    /// Display name of the source that produced this price
    pub source: String,

    /// When the source last updated this price
    pub updated_at: DateTime<Utc>,

    /// Percentage change over the last hour; `None` when unknown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent_change_1h: Option<f64>,

    /// Percentage change over the last 24 hours; `None` when unknown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent_change_24h: Option<f64>,
}

impl SymbolPrice {
    /// Create a price with both percentage changes unknown
    pub fn new(
        symbol: impl Into<String>,
        price: Decimal,
        source: impl Into<String>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            source: source.into(),
            updated_at,
            percent_change_1h: None,
            percent_change_24h: None,
        }
    }

    /// Set the one hour change
    pub fn with_change_1h(mut self, change: Option<f64>) -> Self {
        self.percent_change_1h = change;
        self
    }

    /// Set the 24 hour change
    pub fn with_change_24h(mut self, change: Option<f64>) -> Self {
        self.percent_change_24h = change;
        self
    }
}
