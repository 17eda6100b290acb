use serde::{Deserialize, Serialize};

/// A request for prices of several symbols from one source.
///
/// Supplied by the caller and treated as read-only input.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuery {
    /// Source name, matched case-insensitively
    pub exchange_name: String,

    /// Symbols in the order the caller wants them back
    pub tokens: Vec<String>,

    /// API key for sources that need one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl PriceQuery {
    pub fn new<I, S>(exchange_name: impl Into<String>, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            exchange_name: exchange_name.into(),
            tokens: tokens.into_iter().map(Into::into).collect(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}
