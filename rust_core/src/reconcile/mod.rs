//! Snapshot reconciliation
//!
//! Turns a coin snapshot into a canonical [`CoinRecord`]:
//! - maps identity and aggregate fields onto the record
//! - keeps only whitelisted, fresh exchange quotes
//! - derives min/max price and the spread between them
//!
//! [`merge`] is pure; [`SnapshotReconciler`] wraps it with store I/O.

mod reconciler;

pub use reconciler::{ReconcileOutcome, SnapshotReconciler};

use crate::models::{AggregatedData, CoinInfo, CoinRecord, CompleteSnapshot, ExchangeQuote, PriceQuote};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use tracing::warn;

/// Which exchange quotes may take part in min/max derivation.
#[derive(Debug, Clone)]
pub struct QuotePolicy {
    whitelist: HashSet<String>,
    stale_after: Duration,
}

impl QuotePolicy {
    /// Hours beyond what a `Duration` can hold saturate to the longest window.
    pub fn new<I, S>(whitelist: I, stale_after_hours: i64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            whitelist: whitelist.into_iter().map(Into::into).collect(),
            stale_after: Duration::try_hours(stale_after_hours).unwrap_or(Duration::MAX),
        }
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    pub fn is_whitelisted(&self, exchange: &str) -> bool {
        self.whitelist.contains(exchange)
    }

    /// A quote is fresh while `now - last_updated < stale_after`. Quotes stamped
    /// in the future count as fresh; quotes without a timestamp never do.
    pub fn is_fresh(&self, quote: &ExchangeQuote, now: DateTime<Utc>) -> bool {
        match quote.last_updated {
            Some(updated) => now.signed_duration_since(updated) < self.stale_after,
            None => false,
        }
    }

    pub fn accepts(&self, quote: &ExchangeQuote, now: DateTime<Utc>) -> bool {
        quote.price.is_finite() && self.is_whitelisted(&quote.exchange_name) && self.is_fresh(quote, now)
    }
}

/// Quotes accepted by `policy`, in upstream order.
pub fn filter_quotes<'a>(
    quotes: &'a [ExchangeQuote],
    policy: &QuotePolicy,
    now: DateTime<Utc>,
) -> Vec<&'a ExchangeQuote> {
    quotes.iter().filter(|q| policy.accepts(q, now)).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceExtremes {
    pub min: PriceQuote,
    pub max: PriceQuote,
}

/// Lowest and highest priced quote. On equal prices the quote seen first wins,
/// for both ends.
pub fn find_extremes(quotes: &[&ExchangeQuote]) -> Option<PriceExtremes> {
    let (first, rest) = quotes.split_first()?;
    let mut min = *first;
    let mut max = *first;
    for quote in rest {
        if quote.price < min.price {
            min = quote;
        }
        if quote.price > max.price {
            max = quote;
        }
    }
    Some(PriceExtremes {
        min: to_price_quote(min)?,
        max: to_price_quote(max)?,
    })
}

fn to_price_quote(quote: &ExchangeQuote) -> Option<PriceQuote> {
    Some(PriceQuote {
        price: quote.price,
        exchange: quote.exchange_name.clone(),
        updated: quote.last_updated?,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceGap {
    pub absolute: f64,
    /// `None` when `min` is not positive, since the ratio is undefined
    pub percent: Option<f64>,
}

pub fn price_gap(min: f64, max: f64) -> PriceGap {
    let absolute = max - min;
    let percent = if min > 0.0 {
        Some(absolute / min * 100.0).filter(|p| p.is_finite())
    } else {
        None
    };
    PriceGap { absolute, percent }
}

/// Merge a snapshot into the existing record (or a fresh one).
///
/// Identity and aggregate fields are always overwritten. Price fields are
/// rebuilt from the accepted quotes, and cleared when none are accepted so that
/// stale prices never linger. Timestamps are left for the store.
pub fn merge(
    existing: Option<CoinRecord>,
    snapshot: &CompleteSnapshot,
    policy: &QuotePolicy,
    now: DateTime<Utc>,
) -> CoinRecord {
    let mut record = existing.unwrap_or_default();
    apply_coin_info(&mut record, &snapshot.coin_info);
    apply_aggregated(&mut record, &snapshot.aggregated);

    let accepted = filter_quotes(&snapshot.exchanges, policy, now);
    match find_extremes(&accepted) {
        Some(extremes) => {
            let gap = price_gap(extremes.min.price, extremes.max.price);
            if gap.percent.is_none() {
                warn!(
                    "{}: min price {} from {} leaves gap percent undefined",
                    record.symbol, extremes.min.price, extremes.min.exchange
                );
            }
            record.price_gap = Some(gap.absolute);
            record.price_gap_percent = gap.percent;
            record.min_price = Some(extremes.min);
            record.max_price = Some(extremes.max);
        }
        None => record.clear_price_data(),
    }

    record
}

// Absent upstream fields keep whatever the record already holds.
fn apply_coin_info(record: &mut CoinRecord, info: &CoinInfo) {
    record.symbol = info.name.clone();
    if let Some(full_name) = &info.full_name {
        record.full_name = full_name.clone();
    }
    if let Some(mined) = info.total_coins_mined {
        record.total_coins_mined = mined;
    }
    if let Some(volume) = info.total_volume_24h {
        record.total_volume_24h = volume;
    }
}

fn apply_aggregated(record: &mut CoinRecord, aggregated: &AggregatedData) {
    if let Some(price) = aggregated.price {
        record.aggregated_price = price;
    }
    if let Some(open) = aggregated.open_day {
        record.aggregated_day_price_open = open;
    }
    if let Some(high) = aggregated.high_day {
        record.aggregated_day_price_high = high;
    }
    if let Some(low) = aggregated.low_day {
        record.aggregated_day_price_low = low;
    }
}
