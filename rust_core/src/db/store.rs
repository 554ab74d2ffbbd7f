//! Coin store contract

use crate::error::Result;
use crate::models::CoinRecord;
use async_trait::async_trait;

/// Persistent home of [`CoinRecord`]s, keyed by symbol.
///
/// Implementations must be Send + Sync; writes of distinct symbols are
/// independent and a save replaces the whole record.
#[async_trait]
pub trait CoinStore: Send + Sync {
    async fn find_by_symbol(&self, symbol: &str) -> Result<Option<CoinRecord>>;

    /// Upsert by symbol.
    ///
    /// Assigns `date_created` on the first save of a symbol and keeps it
    /// afterwards; refreshes `date_updated` on every call. Returns the record as
    /// persisted.
    async fn save(&self, record: CoinRecord) -> Result<CoinRecord>;

    async fn find_by_full_name(&self, name: &str) -> Result<Vec<CoinRecord>>;

    /// Records with `low <= price_gap <= high`
    async fn find_by_price_gap_between(&self, low: f64, high: f64) -> Result<Vec<CoinRecord>>;

    /// Records with `low <= price_gap_percent <= high`
    async fn find_by_price_gap_percent_between(&self, low: f64, high: f64) -> Result<Vec<CoinRecord>>;
}
