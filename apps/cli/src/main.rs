mod config;
mod main_lib;
mod render;

use std::sync::Arc;

use clap::{CommandFactory, Parser};
use config::{Args, Config};
use dotenvy::dotenv;
use main_lib::{build_registry, init_tracing, list_exchanges, run};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok(); // Load environment variables from .env file if available
    let args = Args::parse();
    init_tracing(args.debug);

    let config = Config::from_args(args)?;
    let registry = build_registry(&config)?;

    if config.list_exchanges {
        eprint!("{}", list_exchanges(&registry));
        return Ok(());
    }
    if config.queries.is_empty() {
        Args::command().print_help()?;
        anyhow::bail!("no EXCHANGE.TOKEN queries given");
    }

    run(&config, Arc::new(registry)).await
}
