//! Per-batch fetch diagnostics.

use std::time::Duration;

/// A (source, symbol) fetch that produced no price.
#[derive(Clone, Debug)]
pub struct FetchFailure {
    pub source: String,
    pub symbol: String,
    pub timed_out: bool,
    /// Time spent before the failure; `None` when the task panicked
    pub elapsed: Option<Duration>,
    pub message: String,
}

/// What happened to a batch besides the prices it returned.
#[derive(Clone, Debug, Default)]
pub struct BatchDiagnostics {
    /// Exchange names that matched no source, in query order
    pub unknown_sources: Vec<String>,
    pub failures: Vec<FetchFailure>,
    pub succeeded: usize,
}

impl BatchDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_unknown_source(&mut self, name: &str) {
        self.unknown_sources.push(name.to_string());
    }

    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, failure: FetchFailure) {
        self.failures.push(failure);
    }

    /// Number of fetch tasks started.
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failures.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn timeouts(&self) -> usize {
        self.failures.iter().filter(|f| f.timed_out).count()
    }

    /// Summary for logging/debugging.
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("{}/{} fetched", self.succeeded, self.attempted())];

        if !self.unknown_sources.is_empty() {
            parts.push(format!("unknown: {}", self.unknown_sources.join(", ")));
        }

        if !self.failures.is_empty() {
            let failed = self
                .failures
                .iter()
                .map(|f| {
                    if f.timed_out {
                        format!("{}/{} (timeout)", f.source, f.symbol)
                    } else {
                        format!("{}/{}", f.source, f.symbol)
                    }
                })
                .collect::<Vec<_>>()
                .join(", ");
            parts.push(format!("failed: {}", failed));
        }

        parts.join("; ")
    }
}
