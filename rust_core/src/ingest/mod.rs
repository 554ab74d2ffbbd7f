//! Ingestion pass
//!
//! Resolves the coin universe, then reconciles every symbol on a bounded
//! worker pool. Per-symbol source failures are counted and the pass goes on;
//! a store failure aborts the pass.

mod universe;

pub use universe::resolve_universe;

use crate::clients::MarketDataSource;
use crate::config::IngestConfig;
use crate::db::CoinStore;
use crate::error::Result;
use crate::reconcile::{ReconcileOutcome, SnapshotReconciler};
use chrono::Utc;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct DriverSettings {
    /// When false a pass makes no source or store calls
    pub enabled: bool,
    /// Upper bound on symbols being fetched/reconciled at once
    pub max_concurrent_requests: usize,
    /// Applied to every upstream call
    pub request_timeout: Duration,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            max_concurrent_requests: 4,
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolFailure {
    pub symbol: String,
    pub reason: String,
}

/// Counters of one ingestion pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestSummary {
    /// Symbols attempted
    pub processed: usize,
    /// Records upserted
    pub stored: usize,
    /// Unprocessable snapshots
    pub skipped: usize,
    /// Symbols whose snapshot could not be fetched
    pub failed: usize,
    pub failures: Vec<SymbolFailure>,
    /// Ingestion was switched off by configuration
    pub disabled: bool,
    /// The pass was interrupted before every symbol finished
    pub cancelled: bool,
}

impl IngestSummary {
    fn record_failure(&mut self, symbol: String, reason: String) {
        self.failed += 1;
        self.failures.push(SymbolFailure { symbol, reason });
    }
}

enum SymbolOutcome {
    Stored,
    Unprocessable,
    SourceFailed(String),
}

pub struct IngestionDriver {
    source: Arc<dyn MarketDataSource>,
    reconciler: Arc<SnapshotReconciler>,
    settings: DriverSettings,
}

impl IngestionDriver {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        reconciler: SnapshotReconciler,
        settings: DriverSettings,
    ) -> Self {
        Self {
            source,
            reconciler: Arc::new(reconciler),
            settings,
        }
    }

    pub fn from_config(
        config: &IngestConfig,
        source: Arc<dyn MarketDataSource>,
        store: Arc<dyn CoinStore>,
    ) -> Self {
        let reconciler = SnapshotReconciler::new(store, config.quote_policy());
        Self::new(source, reconciler, config.driver_settings())
    }

    /// Run one full pass.
    pub async fn run(&self) -> Result<IngestSummary> {
        self.run_until(std::future::pending()).await
    }

    /// Run one pass, stopping early when `shutdown` completes.
    ///
    /// On shutdown, in-flight symbols are aborted and the counters gathered so
    /// far are returned with `cancelled` set. Saves replace whole records, so an
    /// aborted symbol leaves either its previous record or the new one.
    pub async fn run_until<S>(&self, shutdown: S) -> Result<IngestSummary>
    where
        S: Future<Output = ()>,
    {
        let mut summary = IngestSummary::default();

        if !self.settings.enabled {
            info!("Ingestion is disabled; not fetching coin data");
            summary.disabled = true;
            return Ok(summary);
        }

        info!(
            "Ingesting coin data from {} (max {} concurrent requests)",
            self.source.source_name(),
            self.settings.max_concurrent_requests
        );

        tokio::pin!(shutdown);

        let symbols = tokio::select! {
            symbols = resolve_universe(self.source.as_ref(), self.settings.request_timeout) => symbols?,
            _ = &mut shutdown => {
                warn!("Ingestion cancelled before the coin universe was resolved");
                summary.cancelled = true;
                return Ok(summary);
            }
        };

        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent_requests.max(1)));
        let mut tasks = JoinSet::new();

        for symbol in symbols {
            let source = self.source.clone();
            let reconciler = self.reconciler.clone();
            let semaphore = semaphore.clone();
            let timeout = self.settings.request_timeout;

            tasks.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => process_symbol(source.as_ref(), &reconciler, &symbol, timeout).await,
                    Err(_) => Ok(SymbolOutcome::SourceFailed("worker pool closed".to_string())),
                };
                (symbol, outcome)
            });
        }

        loop {
            tokio::select! {
                joined = tasks.join_next() => {
                    let Some(joined) = joined else { break };
                    summary.processed += 1;

                    match joined {
                        Ok((_, Ok(SymbolOutcome::Stored))) => summary.stored += 1,
                        Ok((symbol, Ok(SymbolOutcome::Unprocessable))) => {
                            debug!("Skipped {}: incomplete snapshot", symbol);
                            summary.skipped += 1;
                        }
                        Ok((symbol, Ok(SymbolOutcome::SourceFailed(reason)))) => {
                            warn!("Could not fetch a snapshot of {}: {}", symbol, reason);
                            summary.record_failure(symbol, reason);
                        }
                        Ok((symbol, Err(e))) => {
                            error!("Aborting ingestion: failed to store {}: {}", symbol, e);
                            tasks.abort_all();
                            return Err(e);
                        }
                        Err(e) => {
                            error!("Ingestion task failed: {}", e);
                            summary.record_failure("<unknown>".to_string(), e.to_string());
                        }
                    }
                }
                _ = &mut shutdown => {
                    warn!("Ingestion cancelled; aborting {} unfinished symbols", tasks.len());
                    tasks.abort_all();
                    summary.cancelled = true;
                    break;
                }
            }
        }

        info!(
            "Finished ingestion (stored {}/{} coins, {} skipped, {} failed)",
            summary.stored, summary.processed, summary.skipped, summary.failed
        );

        Ok(summary)
    }
}

/// Fetch and reconcile one symbol. Source problems are folded into the
/// outcome; only store errors come back as `Err`.
async fn process_symbol(
    source: &dyn MarketDataSource,
    reconciler: &SnapshotReconciler,
    symbol: &str,
    timeout: Duration,
) -> Result<SymbolOutcome> {
    let snapshot = match tokio::time::timeout(timeout, source.fetch_snapshot(symbol)).await {
        Ok(Ok(snapshot)) => snapshot,
        Ok(Err(e)) => return Ok(SymbolOutcome::SourceFailed(e.to_string())),
        Err(_) => return Ok(SymbolOutcome::SourceFailed(format!("timed out after {:?}", timeout))),
    };

    match reconciler.reconcile(symbol, snapshot, Utc::now()).await? {
        ReconcileOutcome::Stored(_) => Ok(SymbolOutcome::Stored),
        ReconcileOutcome::Unprocessable => Ok(SymbolOutcome::Unprocessable),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_disabled() {
        let settings = DriverSettings::default();
        assert!(!settings.enabled);
        assert_eq!(settings.max_concurrent_requests, 4);
    }

    #[test]
    fn test_record_failure() {
        let mut summary = IngestSummary::default();
        summary.record_failure("BTC".to_string(), "HTTP 500".to_string());
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures[0].symbol, "BTC");
    }
}
