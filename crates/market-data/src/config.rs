//! Shared configuration handed to the HTTP client and to every source.

use std::collections::HashMap;
use std::time::Duration;

use crate::models::{canonical_name, PriceQuery};

/// Default HTTP request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Settings every source is constructed with.
#[derive(Clone, Debug)]
pub struct SourceConfig {
    /// Per-request timeout of the shared HTTP client
    pub timeout: Duration,

    /// Proxy for all outbound requests (http, https or socks5 URL)
    pub proxy_url: Option<String>,

    /// API keys by canonical source name
    api_keys: HashMap<String, String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            proxy_url: None,
            api_keys: HashMap::new(),
        }
    }
}

impl SourceConfig {
    pub fn new(timeout: Duration, proxy_url: Option<String>) -> Self {
        Self {
            timeout,
            proxy_url: proxy_url.filter(|url| !url.trim().is_empty()),
            api_keys: HashMap::new(),
        }
    }

    /// Register an API key for a source.
    pub fn set_api_key(&mut self, source: &str, key: impl Into<String>) {
        self.api_keys.insert(canonical_name(source), key.into());
    }

    /// API key for a source, matched case-insensitively.
    pub fn api_key(&self, source: &str) -> Option<&str> {
        self.api_keys
            .get(&canonical_name(source))
            .map(String::as_str)
    }

    /// Copy the keys carried by queries into the per-source map.
    ///
    /// Later queries for the same source overwrite earlier ones.
    pub fn merge_query_keys(&mut self, queries: &[PriceQuery]) {
        for query in queries {
            if let Some(key) = query.api_key.as_deref().filter(|k| !k.is_empty()) {
                self.set_api_key(&query.exchange_name, key);
            }
        }
    }
}
