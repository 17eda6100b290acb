//! Concurrent fan-out of price queries over the registry.
//!
//! Every (source, symbol) pair becomes its own task. Handles are kept in
//! input order and joined together, so the output follows the queries no
//! matter which source answers first. Failures are logged and leave their
//! slot empty; they never fail the batch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{BatchDiagnostics, FetchFailure, SourceRegistry};
use crate::errors::MarketDataError;
use crate::models::{PriceQuery, SymbolPrice};

type FetchOutcome = (Result<SymbolPrice, MarketDataError>, Duration);

struct Slot {
    source: String,
    symbol: String,
}

/// Fetches prices for many queries at once.
#[derive(Clone, Debug)]
pub struct PriceAggregator {
    registry: Arc<SourceRegistry>,
}

impl PriceAggregator {
    pub fn new(registry: Arc<SourceRegistry>) -> Self {
        Self { registry }
    }

    /// Fetch every symbol of every query, in input order.
    ///
    /// Unknown exchanges and failed fetches are logged and left out.
    /// Returns once every task has finished.
    pub async fn fetch_all(&self, queries: &[PriceQuery]) -> Vec<SymbolPrice> {
        self.fetch_all_with_diagnostics(queries).await.0
    }

    /// [`fetch_all`](Self::fetch_all), also reporting what was dropped.
    pub async fn fetch_all_with_diagnostics(
        &self,
        queries: &[PriceQuery],
    ) -> (Vec<SymbolPrice>, BatchDiagnostics) {
        let mut diagnostics = BatchDiagnostics::new();
        let mut slots = Vec::new();
        let mut handles: Vec<JoinHandle<FetchOutcome>> = Vec::new();

        for query in queries {
            let Some(source) = self.registry.lookup(&query.exchange_name) else {
                warn!(
                    exchange = %query.exchange_name,
                    "Unknown exchange {}, skipping",
                    query.exchange_name
                );
                diagnostics.record_unknown_source(&query.exchange_name);
                continue;
            };

            for symbol in &query.tokens {
                let task_source = Arc::clone(&source);
                let task_symbol = symbol.clone();

                handles.push(tokio::spawn(async move {
                    let started = Instant::now();
                    let result = task_source.get_symbol_price(&task_symbol).await;
                    (result, started.elapsed())
                }));
                slots.push(Slot {
                    source: source.name().to_string(),
                    symbol: symbol.clone(),
                });
            }
        }

        debug!("Started {} fetch tasks", handles.len());

        let outcomes = join_all(handles).await;
        let mut prices = Vec::with_capacity(outcomes.len());

        for (slot, outcome) in slots.into_iter().zip(outcomes) {
            match outcome {
                Ok((Ok(price), _)) => {
                    diagnostics.record_success();
                    prices.push(price);
                }
                Ok((Err(e), elapsed)) => {
                    let failure = FetchFailure {
                        timed_out: e.is_timeout(),
                        elapsed: Some(elapsed),
                        message: e.to_string(),
                        source: slot.source,
                        symbol: slot.symbol,
                    };
                    self.report(&failure);
                    diagnostics.record_failure(failure);
                }
                Err(join_error) => {
                    let failure = FetchFailure {
                        timed_out: false,
                        elapsed: None,
                        message: format!("fetch task failed: {}", join_error),
                        source: slot.source,
                        symbol: slot.symbol,
                    };
                    self.report(&failure);
                    diagnostics.record_failure(failure);
                }
            }
        }

        debug!("Batch finished: {}", diagnostics.summary());

        (prices, diagnostics)
    }

    fn report(&self, failure: &FetchFailure) {
        if failure.timed_out {
            let elapsed = failure.elapsed.unwrap_or_default();
            warn!(
                source = %failure.source,
                symbol = %failure.symbol,
                timed_out = true,
                elapsed_ms = elapsed.as_millis() as u64,
                error = %failure.message,
                "Failed to get symbol price for {} from {}: timed out after {:.1}s",
                failure.symbol,
                failure.source,
                elapsed.as_secs_f64()
            );
            if !self.registry.has_proxy() {
                info!(
                    source = %failure.source,
                    "{} may be unreachable from your network, try --proxy",
                    failure.source
                );
            }
        } else {
            warn!(
                source = %failure.source,
                symbol = %failure.symbol,
                timed_out = false,
                error = %failure.message,
                "Failed to get symbol price for {} from {}",
                failure.symbol,
                failure.source
            );
        }
    }
}
