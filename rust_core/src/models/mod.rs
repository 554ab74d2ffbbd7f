// Domain models for coin ingestion
mod coin;
mod snapshot;

pub use coin::{CoinRecord, PriceQuote};
pub use snapshot::{AggregatedData, CoinInfo, CompleteSnapshot, ExchangeQuote, Snapshot, TopCoin};
