use super::{merge, QuotePolicy};
use crate::db::retry::execute_with_retry;
use crate::db::CoinStore;
use crate::error::Result;
use crate::models::{CoinRecord, Snapshot};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

/// Maximum attempts for a single record save.
const SAVE_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// Record upserted, as returned by the store
    Stored(CoinRecord),
    /// Snapshot lacked a required block; nothing was written
    Unprocessable,
}

impl ReconcileOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, ReconcileOutcome::Stored(_))
    }
}

/// Loads the existing record, merges the snapshot into it and saves it back.
pub struct SnapshotReconciler {
    store: Arc<dyn CoinStore>,
    policy: QuotePolicy,
}

impl SnapshotReconciler {
    pub fn new(store: Arc<dyn CoinStore>, policy: QuotePolicy) -> Self {
        Self { store, policy }
    }

    /// Reconcile one symbol's snapshot against the store.
    ///
    /// Store errors are returned after retrying transient failures; an
    /// incomplete snapshot is not an error.
    pub async fn reconcile(
        &self,
        symbol: &str,
        snapshot: Snapshot,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome> {
        let snapshot = match snapshot.into_complete(symbol) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                debug!("Skipping {}: a required block is missing", e);
                return Ok(ReconcileOutcome::Unprocessable);
            }
        };

        if snapshot.coin_info.name != symbol {
            debug!(
                "Snapshot for {} reports coin name {}",
                symbol, snapshot.coin_info.name
            );
        }

        let existing = self.store.find_by_symbol(symbol).await?;
        let record = merge(existing, &snapshot, &self.policy, now);

        let saved = execute_with_retry(
            || {
                let store = self.store.clone();
                let record = record.clone();
                async move { store.save(record).await }
            },
            SAVE_ATTEMPTS,
        )
        .await?;

        debug!(
            "Stored {}: min={:?} max={:?} gap={:?}",
            saved.symbol,
            saved.min_price.as_ref().map(|q| q.price),
            saved.max_price.as_ref().map(|q| q.price),
            saved.price_gap
        );

        Ok(ReconcileOutcome::Stored(saved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryCoinStore;
    use crate::models::{AggregatedData, CoinInfo, ExchangeQuote};
    use chrono::Duration;

    fn snapshot(now: DateTime<Utc>) -> Snapshot {
        Snapshot {
            coin_info: Some(CoinInfo {
                name: "ETH".to_string(),
                full_name: Some("Ethereum".to_string()),
                total_coins_mined: Some(120_000_000),
                total_volume_24h: Some(9_000.0),
            }),
            aggregated: Some(AggregatedData {
                price: Some(2000.0),
                last_updated: Some(now),
                open_day: Some(1950.0),
                high_day: Some(2050.0),
                low_day: Some(1900.0),
            }),
            exchanges: Some(vec![
                ExchangeQuote {
                    exchange_name: "Kraken".to_string(),
                    price: 2001.0,
                    last_updated: Some(now - Duration::minutes(5)),
                    open_24h: 1950.0,
                    high_24h: 2050.0,
                    low_24h: 1900.0,
                    volume_24h: 10.0,
                },
                ExchangeQuote {
                    exchange_name: "Bitstamp".to_string(),
                    price: 1999.0,
                    last_updated: Some(now - Duration::minutes(1)),
                    open_24h: 1950.0,
                    high_24h: 2050.0,
                    low_24h: 1900.0,
                    volume_24h: 20.0,
                },
            ]),
        }
    }

    #[tokio::test]
    async fn test_reconcile_stores_new_record() {
        let store = Arc::new(InMemoryCoinStore::new());
        let reconciler = SnapshotReconciler::new(store.clone(), QuotePolicy::new(["Kraken", "Bitstamp"], 24));
        let now = Utc::now();

        let outcome = reconciler.reconcile("ETH", snapshot(now), now).await.unwrap();
        assert!(outcome.is_stored());

        let stored = store.find_by_symbol("ETH").await.unwrap().unwrap();
        assert_eq!(stored.min_price.as_ref().unwrap().exchange, "Bitstamp");
        assert_eq!(stored.max_price.as_ref().unwrap().exchange, "Kraken");
        assert_eq!(stored.price_gap, Some(2.0));
        assert!(stored.date_created.is_some());
    }

    #[tokio::test]
    async fn test_reconcile_skips_incomplete_snapshot() {
        let store = Arc::new(InMemoryCoinStore::new());
        let reconciler = SnapshotReconciler::new(store.clone(), QuotePolicy::new(["Kraken"], 24));
        let now = Utc::now();

        let mut incomplete = snapshot(now);
        incomplete.aggregated = None;

        let outcome = reconciler.reconcile("ETH", incomplete, now).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Unprocessable);
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_reconcile_updates_existing_record() {
        let store = Arc::new(InMemoryCoinStore::new());
        let reconciler = SnapshotReconciler::new(store.clone(), QuotePolicy::new(["Kraken", "Bitstamp"], 24));
        let now = Utc::now();

        reconciler.reconcile("ETH", snapshot(now), now).await.unwrap();
        let first = store.find_by_symbol("ETH").await.unwrap().unwrap();

        // Second pass with nothing whitelisted wipes the prices but keeps the row
        let strict = SnapshotReconciler::new(store.clone(), QuotePolicy::new(["Gemini"], 24));
        strict.reconcile("ETH", snapshot(now), now).await.unwrap();
        let second = store.find_by_symbol("ETH").await.unwrap().unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(second.date_created, first.date_created);
        assert!(second.date_updated > first.date_updated);
        assert!(second.min_price.is_none());
        assert!(second.price_gap_percent.is_none());
    }
}
