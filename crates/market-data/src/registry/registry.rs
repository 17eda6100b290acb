//! Source registry mapping case-insensitive names to constructed sources.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::{debug, error};

use super::ProviderList;
use crate::config::SourceConfig;
use crate::errors::ConfigError;
use crate::http::HttpClient;
use crate::models::{canonical_name, PriceQuery};
use crate::provider::{PriceSource, ProviderContext};

/// Built-once, read-only map from source name to source.
pub struct SourceRegistry {
    sources: HashMap<String, Arc<dyn PriceSource>>,
    names: Vec<String>,
    has_proxy: bool,
}

impl SourceRegistry {
    /// Construct every registered provider with the shared configuration.
    ///
    /// Fails with [`ConfigError::DuplicateSource`] when two providers yield
    /// the same name, ignoring case.
    pub fn build(
        providers: &ProviderList,
        config: &SourceConfig,
        http: HttpClient,
    ) -> Result<Self, ConfigError> {
        let context = ProviderContext::new(&http, config);
        let sources = providers.construct(&context);

        let mut registry = Self::from_sources(sources)?;
        registry.has_proxy = http.has_proxy();
        Ok(registry)
    }

    /// Index already constructed sources.
    pub fn from_sources<I>(sources: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = Arc<dyn PriceSource>>,
    {
        let mut by_name: HashMap<String, Arc<dyn PriceSource>> = HashMap::new();
        let mut names = Vec::new();

        for source in sources {
            let key = canonical_name(source.name());
            if by_name.contains_key(&key) {
                error!("Source {} is registered twice", source.name());
                return Err(ConfigError::DuplicateSource {
                    name: source.name().to_string(),
                });
            }
            debug!("Registered source {}", source.name());
            names.push(source.name().to_string());
            by_name.insert(key, source);
        }

        names.sort_by_cached_key(|name| canonical_name(name));

        Ok(Self {
            sources: by_name,
            names,
            has_proxy: false,
        })
    }

    /// Find a source by name, ignoring case.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn PriceSource>> {
        self.sources.get(&canonical_name(name)).cloned()
    }

    /// Display names of all sources, sorted ignoring case.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Whether the shared client sends requests through a proxy.
    pub fn has_proxy(&self) -> bool {
        self.has_proxy
    }

    /// Check that every queried source has the credentials it needs.
    ///
    /// Unknown exchanges are ignored here; the aggregator skips them.
    pub fn ensure_configured(&self, queries: &[PriceQuery]) -> Result<(), ConfigError> {
        for query in queries {
            if let Some(source) = self.lookup(&query.exchange_name) {
                if !source.is_configured() {
                    error!("Source {} requires an API key", source.name());
                    return Err(ConfigError::MissingApiKey {
                        source_name: source.name().to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("names", &self.names)
            .field("has_proxy", &self.has_proxy)
            .finish()
    }
}
