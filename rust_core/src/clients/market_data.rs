//! Market Data Source Trait
//!
//! Interface of the upstream price-aggregation API the ingestion pass reads from.

use crate::error::Result;
use crate::models::{Snapshot, TopCoin};
use async_trait::async_trait;

/// Upstream provider of the coin universe and per-coin snapshots.
///
/// Implementations classify transport, HTTP and error-payload failures as
/// `IngestError::SourceUnavailable`.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Display name used in logs (e.g. "CryptoCompare")
    fn source_name(&self) -> &str;

    /// Coins ranked by trading volume, in upstream order
    async fn fetch_top_coins(&self) -> Result<Vec<TopCoin>>;

    /// Current snapshot of one coin with its per-exchange quotes
    async fn fetch_snapshot(&self, symbol: &str) -> Result<Snapshot>;
}
