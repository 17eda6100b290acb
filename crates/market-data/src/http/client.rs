use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL};
use reqwest::{Client, Proxy, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::SourceConfig;
use crate::errors::{ConfigError, MarketDataError};

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("token-ticker/", env!("CARGO_PKG_VERSION"));

/// HTTP client shared by all sources.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: Client,
    has_proxy: bool,
}

impl HttpClient {
    /// Build the client from the shared configuration.
    ///
    /// Fails when the proxy URL cannot be parsed or the TLS backend cannot
    /// be initialised.
    pub fn new(config: &SourceConfig) -> Result<Self, ConfigError> {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        let mut builder = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers);

        if let Some(url) = &config.proxy_url {
            let proxy = Proxy::all(url.as_str()).map_err(|e| ConfigError::InvalidProxy {
                url: url.clone(),
                message: e.to_string(),
            })?;
            debug!("Using proxy {}", url);
            builder = builder.proxy(proxy);
        }

        debug!("HTTP request timeout is set to {:?}", config.timeout);

        let client = builder
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            has_proxy: config.proxy_url.is_some(),
        })
    }

    /// Whether requests go through a configured proxy.
    pub fn has_proxy(&self) -> bool {
        self.has_proxy
    }

    /// GET a URL and return the body of a 2xx response.
    ///
    /// # Arguments
    ///
    /// * `provider` - Source name used in errors and logs
    /// * `url` - Absolute URL
    /// * `query` - Query string parameters
    /// * `headers` - Extra request headers (e.g. API keys)
    pub async fn get_text(
        &self,
        provider: &str,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&'static str, String)],
    ) -> Result<String, MarketDataError> {
        let mut request = self.client.get(url);

        if !query.is_empty() {
            request = request.query(query);
        }

        for (name, value) in headers {
            request = request.header(*name, value);
        }

        debug!("{} request: {} with {} params", provider, url, query.len());

        let response = request
            .send()
            .await
            .map_err(|e| classify_request_error(provider, e))?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::RateLimited {
                provider: provider.to_string(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_request_error(provider, e))?;

        if !status.is_success() {
            return Err(MarketDataError::HttpStatus {
                provider: provider.to_string(),
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        Ok(body)
    }

    /// GET a URL and decode the 2xx body as JSON.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        provider: &str,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&'static str, String)],
    ) -> Result<T, MarketDataError> {
        let body = self.get_text(provider, url, query, headers).await?;
        serde_json::from_str(&body).map_err(|e| MarketDataError::decode(provider, e))
    }
}

fn classify_request_error(provider: &str, error: reqwest::Error) -> MarketDataError {
    if error.is_timeout() {
        MarketDataError::Timeout {
            provider: provider.to_string(),
        }
    } else {
        MarketDataError::Network(error)
    }
}
