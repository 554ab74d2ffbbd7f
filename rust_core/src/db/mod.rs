//! Coin persistence.
//!
//! - [`CoinStore`]: the store contract the reconciler writes through
//! - [`PgCoinStore`]: Postgres implementation with atomic per-symbol upsert
//! - [`InMemoryCoinStore`]: process-local implementation for dry runs
//! - pool creation, schema bootstrap and write retry

pub mod coins;
pub mod memory;
pub mod pool;
pub mod retry;
pub mod schema;
mod store;

pub use coins::PgCoinStore;
pub use memory::InMemoryCoinStore;
pub use pool::{create_pool, DbPoolConfig};
pub use schema::ensure_schema;
pub use store::CoinStore;
