use std::sync::Arc;

use token_ticker_market_data::{builtin_providers, HttpClient, PriceAggregator, SourceRegistry};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;
use crate::render::render_table;

pub fn init_tracing(debug: bool) {
    let log_format = std::env::var("TT_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so the table on stdout stays clean
    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

pub fn build_registry(config: &Config) -> anyhow::Result<SourceRegistry> {
    let http = HttpClient::new(&config.source)?;
    let registry = SourceRegistry::build(&builtin_providers(), &config.source, http)?;
    tracing::debug!("Built registry with {} sources", registry.len());
    Ok(registry)
}

pub fn list_exchanges(registry: &SourceRegistry) -> String {
    let mut out = String::from("Supported exchanges:\n");
    for name in registry.names() {
        let needs_key = registry
            .lookup(name)
            .is_some_and(|source| source.requires_api_key());
        if needs_key {
            out.push_str(&format!(" {} (API key required)\n", name));
        } else {
            out.push_str(&format!(" {}\n", name));
        }
    }
    out
}

/// Fetch and print once, or forever when a refresh interval is set.
pub async fn run(config: &Config, registry: Arc<SourceRegistry>) -> anyhow::Result<()> {
    registry.ensure_configured(&config.queries)?;

    let aggregator = PriceAggregator::new(registry);
    if let Some(interval) = config.refresh {
        tracing::info!("Auto refresh on every {} seconds", interval.as_secs());
    }

    loop {
        let (prices, diagnostics) = aggregator
            .fetch_all_with_diagnostics(&config.queries)
            .await;
        print!("{}", render_table(&prices));
        if diagnostics.has_failures() || !diagnostics.unknown_sources.is_empty() {
            tracing::debug!("{}", diagnostics.summary());
        }

        match config.refresh {
            Some(interval) => tokio::time::sleep(interval).await,
            None => return Ok(()),
        }
    }
}
