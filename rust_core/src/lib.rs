//! PriceGap Core - coin price ingestion and cross-exchange spread tracking.
//!
//! This crate provides:
//! - A CryptoCompare market data client (top coins, per-exchange snapshots)
//! - Snapshot reconciliation: exchange whitelisting, staleness filtering,
//!   min/max price and price gap derivation
//! - A coin store with Postgres and in-memory implementations
//! - The ingestion driver running one bounded, concurrent pass over the universe

pub mod clients;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod models;
pub mod reconcile;

pub use config::{IngestConfig, SourceConfig};
pub use error::{IngestError, Result};
pub use ingest::{DriverSettings, IngestSummary, IngestionDriver};
