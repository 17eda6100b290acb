use crate::config::SourceConfig;
use crate::http::HttpClient;

/// What a provider constructor is given to build its source.
///
/// Borrowed for the duration of [`SourceRegistry::build`](crate::registry::SourceRegistry::build);
/// constructors clone what they keep.
#[derive(Clone, Copy, Debug)]
pub struct ProviderContext<'a> {
    pub http: &'a HttpClient,
    pub config: &'a SourceConfig,
}

impl<'a> ProviderContext<'a> {
    pub fn new(http: &'a HttpClient, config: &'a SourceConfig) -> Self {
        Self { http, config }
    }

    /// API key configured for `source`, if any.
    pub fn api_key(&self, source: &str) -> Option<String> {
        self.config.api_key(source).map(str::to_string)
    }
}
