//! In-process coin store, used for dry runs and tests.

use super::CoinStore;
use crate::error::Result;
use crate::models::CoinRecord;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct InMemoryCoinStore {
    records: RwLock<BTreeMap<String, CoinRecord>>,
}

impl InMemoryCoinStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn filter<F>(&self, predicate: F) -> Vec<CoinRecord>
    where
        F: Fn(&CoinRecord) -> bool,
    {
        self.records
            .read()
            .values()
            .filter(|r| predicate(r))
            .cloned()
            .collect()
    }
}

/// Next update stamp, strictly after the previous one even when the clock has
/// not moved.
fn next_update_stamp(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match previous {
        Some(prev) if now <= prev => prev + Duration::microseconds(1),
        _ => now,
    }
}

#[async_trait]
impl CoinStore for InMemoryCoinStore {
    async fn find_by_symbol(&self, symbol: &str) -> Result<Option<CoinRecord>> {
        Ok(self.records.read().get(symbol).cloned())
    }

    async fn save(&self, mut record: CoinRecord) -> Result<CoinRecord> {
        let mut records = self.records.write();
        let previous = records.get(&record.symbol);

        let date_updated = next_update_stamp(previous.and_then(|p| p.date_updated));
        record.date_created = previous
            .and_then(|p| p.date_created)
            .or(Some(date_updated));
        record.date_updated = Some(date_updated);

        records.insert(record.symbol.clone(), record.clone());
        Ok(record)
    }

    async fn find_by_full_name(&self, name: &str) -> Result<Vec<CoinRecord>> {
        Ok(self.filter(|r| r.full_name == name))
    }

    async fn find_by_price_gap_between(&self, low: f64, high: f64) -> Result<Vec<CoinRecord>> {
        Ok(self.filter(|r| matches!(r.price_gap, Some(gap) if gap >= low && gap <= high)))
    }

    async fn find_by_price_gap_percent_between(&self, low: f64, high: f64) -> Result<Vec<CoinRecord>> {
        Ok(self.filter(|r| matches!(r.price_gap_percent, Some(pct) if pct >= low && pct <= high)))
    }
}
