use std::time::Duration;

use clap::Parser;
use token_ticker_market_data::{ConfigError, PriceQuery, SourceConfig};

/// Command-line arguments. Every flag can also be set through a `TT_*`
/// environment variable (a `.env` file is loaded first).
#[derive(Parser, Debug)]
#[command(name = "token-ticker", version)]
#[command(about = "Track token prices of your favorite exchanges in the terminal")]
#[command(
    after_help = "Queries are space-separated EXCHANGE.TOKEN pairs (eg. \"Binance.BTCUSDT\"), \
                  optionally followed by an API key: EXCHANGE.TOKEN.API_KEY"
)]
pub struct Args {
    /// HTTP request timeout in seconds
    #[arg(short, long, env = "TT_TIMEOUT", default_value_t = 20)]
    pub timeout: u64,

    /// Proxy for every request (eg. "http://localhost:7777", "socks5://localhost:1080")
    #[arg(short, long, env = "TT_PROXY")]
    pub proxy: Option<String>,

    /// Refresh every N seconds, 0 fetches once
    #[arg(short, long, env = "TT_REFRESH", default_value_t = 0)]
    pub refresh: u64,

    /// List supported exchanges and exit
    #[arg(short, long)]
    pub list_exchanges: bool,

    /// Enable debug logging
    #[arg(short, long, env = "TT_DEBUG")]
    pub debug: bool,

    /// EXCHANGE.TOKEN[.API_KEY] pairs
    #[arg(env = "TT_QUERIES", value_delimiter = ' ')]
    pub queries: Vec<String>,
}

/// Resolved runtime configuration.
#[derive(Debug)]
pub struct Config {
    pub source: SourceConfig,
    pub queries: Vec<PriceQuery>,
    pub refresh: Option<Duration>,
    pub list_exchanges: bool,
}

impl Config {
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        let queries = parse_queries(&args.queries)?;

        let mut source = SourceConfig::new(Duration::from_secs(args.timeout), args.proxy);
        source.merge_query_keys(&queries);

        Ok(Self {
            source,
            queries,
            refresh: (args.refresh > 0).then(|| Duration::from_secs(args.refresh)),
            list_exchanges: args.list_exchanges,
        })
    }
}

/// Parse `EXCHANGE.TOKEN[.API_KEY]` arguments.
///
/// Consecutive arguments naming the same exchange are merged into one query.
pub fn parse_queries<S: AsRef<str>>(args: &[S]) -> Result<Vec<PriceQuery>, ConfigError> {
    let mut queries: Vec<PriceQuery> = Vec::new();

    for arg in args {
        let arg = arg.as_ref().trim();
        if arg.is_empty() {
            continue;
        }

        let mut parts = arg.splitn(3, '.');
        let exchange = parts.next().unwrap_or_default();
        let token = match parts.next() {
            Some(token) if !exchange.is_empty() && !token.is_empty() => token,
            _ => {
                return Err(ConfigError::InvalidQuery(format!(
                    "unrecognized token definition {:?}, expecting EXCHANGE.TOKEN[.API_KEY]",
                    arg
                )))
            }
        };
        let api_key = parts.next().filter(|key| !key.is_empty());

        let same_exchange = queries
            .last()
            .is_some_and(|last| last.exchange_name == exchange);
        if !same_exchange {
            queries.push(PriceQuery::new(exchange, Vec::<String>::new()));
        }
        let Some(query) = queries.last_mut() else {
            continue;
        };
        query.tokens.push(token.to_string());
        if let Some(key) = api_key {
            query.api_key = Some(key.to_string());
        }
    }

    Ok(queries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consecutive_exchanges_are_merged() {
        let queries = parse_queries(&[
            "Binance.BTCUSDT",
            "Binance.ETHUSDT",
            "Kraken.XBTUSD",
            "Binance.SOLUSDT",
        ])
        .unwrap();

        assert_eq!(
            queries,
            vec![
                PriceQuery::new("Binance", ["BTCUSDT", "ETHUSDT"]),
                PriceQuery::new("Kraken", ["XBTUSD"]),
                PriceQuery::new("Binance", ["SOLUSDT"]),
            ]
        );
    }

    #[test]
    fn test_api_key_is_third_part() {
        let queries = parse_queries(&["CoinMarketCap.BTC.secret", "CoinMarketCap.ETH"]).unwrap();

        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].tokens, ["BTC", "ETH"]);
        assert_eq!(queries[0].api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_malformed_argument_is_rejected() {
        for bad in ["BTCUSDT", ".BTC", "Binance."] {
            let err = parse_queries(&[bad]).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidQuery(_)), "{}", bad);
        }
    }

    #[test]
    fn test_blank_arguments_are_skipped() {
        let queries = parse_queries(&["", "OKX.BTC-USDT", " "]).unwrap();
        assert_eq!(queries, vec![PriceQuery::new("OKX", ["BTC-USDT"])]);
    }

    #[test]
    fn test_config_from_args() {
        let args = Args::parse_from([
            "token-ticker",
            "--timeout",
            "5",
            "--refresh",
            "30",
            "coinmarketcap.BTC.key",
            "Gate.BTC_USDT",
        ]);

        let config = Config::from_args(args).unwrap();

        assert_eq!(config.source.timeout, Duration::from_secs(5));
        assert_eq!(config.refresh, Some(Duration::from_secs(30)));
        assert_eq!(config.source.api_key("CoinMarketCap"), Some("key"));
        assert_eq!(config.queries.len(), 2);
        assert!(!config.list_exchanges);
    }

    #[test]
    fn test_zero_refresh_runs_once() {
        let args = Args::parse_from(["token-ticker", "--refresh", "0", "Binance.BTCUSDT"]);
        assert!(Config::from_args(args).unwrap().refresh.is_none());
    }
}
