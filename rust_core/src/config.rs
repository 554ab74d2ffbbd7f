//! Configuration for the ingestion pass
//!
//! Read from environment variables (a `.env` file is honoured by the service
//! binary). All options have defaults except `DATABASE_URL`, which is required
//! unless the pass runs against the in-memory store.

use crate::error::{IngestError, Result};
use crate::ingest::DriverSettings;
use crate::reconcile::QuotePolicy;
use std::env;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://min-api.cryptocompare.com";
pub const DEFAULT_TOP_COINS_PATH: &str = "/data/top/totalvol?limit=50&tsym=USD";
pub const DEFAULT_SNAPSHOT_PATH: &str = "/data/top/exchanges/full?tsym=USD&fsym=";

/// Where and how to reach the market data API
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub base_url: String,
    pub top_coins_path: String,
    /// The coin symbol is appended verbatim
    pub snapshot_path: String,
    pub request_timeout: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            top_coins_path: DEFAULT_TOP_COINS_PATH.to_string(),
            snapshot_path: DEFAULT_SNAPSHOT_PATH.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub source: SourceConfig,

    // Quote filtering
    pub exchange_whitelist: Vec<String>,
    pub exchange_data_stale_after_hours: i64,

    // Driver
    pub run_ingestion_on_startup: bool,
    pub max_concurrent_requests: usize,

    // Storage
    pub database_url: Option<String>,
    /// Use the in-memory store instead of Postgres
    pub dry_run: bool,
}

impl IngestConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key/value source; `from_env` passes `std::env::var`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("CRYPTOCOMPARE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if base_url.trim().is_empty() {
            return Err(IngestError::Config("CRYPTOCOMPARE_URL must not be empty".to_string()));
        }

        let request_timeout_secs = parse_u64(&lookup, "INGEST_REQUEST_TIMEOUT_SECS", 30)?;
        if request_timeout_secs == 0 {
            return Err(IngestError::Config("INGEST_REQUEST_TIMEOUT_SECS must be > 0".to_string()));
        }

        let stale_after_hours = parse_i64(&lookup, "CRYPTOCOMPARE_EXCHANGE_DATA_STALE_AFTER_HOURS", 24)?;
        if stale_after_hours <= 0 {
            return Err(IngestError::Config(
                "CRYPTOCOMPARE_EXCHANGE_DATA_STALE_AFTER_HOURS must be > 0".to_string(),
            ));
        }
        if chrono::Duration::try_hours(stale_after_hours).is_none() {
            return Err(IngestError::Config(format!(
                "CRYPTOCOMPARE_EXCHANGE_DATA_STALE_AFTER_HOURS is out of range: {}",
                stale_after_hours
            )));
        }

        let max_concurrent_requests = parse_u64(&lookup, "INGEST_MAX_CONCURRENT_REQUESTS", 4)? as usize;
        if max_concurrent_requests == 0 {
            return Err(IngestError::Config("INGEST_MAX_CONCURRENT_REQUESTS must be > 0".to_string()));
        }

        let dry_run = parse_bool(&lookup, "INGEST_DRY_RUN", false)?;
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        let run_ingestion_on_startup = parse_bool(&lookup, "INIT_DB", false)?;
        if run_ingestion_on_startup && !dry_run && database_url.is_none() {
            return Err(IngestError::Config(
                "DATABASE_URL must be set unless INGEST_DRY_RUN=true".to_string(),
            ));
        }

        Ok(Self {
            source: SourceConfig {
                base_url,
                top_coins_path: lookup("CRYPTOCOMPARE_TOP_COINS_PATH")
                    .unwrap_or_else(|| DEFAULT_TOP_COINS_PATH.to_string()),
                snapshot_path: lookup("CRYPTOCOMPARE_SNAPSHOT_PATH")
                    .unwrap_or_else(|| DEFAULT_SNAPSHOT_PATH.to_string()),
                request_timeout: Duration::from_secs(request_timeout_secs),
            },

            exchange_whitelist: lookup("CRYPTOCOMPARE_EXCHANGE_WHITELIST")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            exchange_data_stale_after_hours: stale_after_hours,

            run_ingestion_on_startup,
            max_concurrent_requests,

            database_url,
            dry_run,
        })
    }

    pub fn quote_policy(&self) -> QuotePolicy {
        QuotePolicy::new(
            self.exchange_whitelist.iter().cloned(),
            self.exchange_data_stale_after_hours,
        )
    }

    pub fn driver_settings(&self) -> DriverSettings {
        DriverSettings {
            enabled: self.run_ingestion_on_startup,
            max_concurrent_requests: self.max_concurrent_requests,
            request_timeout: self.source.request_timeout,
        }
    }
}

fn parse_u64<F: Fn(&str) -> Option<String>>(lookup: &F, var_name: &str, default: u64) -> Result<u64> {
    match lookup(var_name) {
        Some(val) => val
            .trim()
            .parse()
            .map_err(|_| IngestError::Config(format!("{} must be a valid u64", var_name))),
        None => Ok(default),
    }
}

fn parse_i64<F: Fn(&str) -> Option<String>>(lookup: &F, var_name: &str, default: i64) -> Result<i64> {
    match lookup(var_name) {
        Some(val) => val
            .trim()
            .parse()
            .map_err(|_| IngestError::Config(format!("{} must be a valid integer", var_name))),
        None => Ok(default),
    }
}

fn parse_bool<F: Fn(&str) -> Option<String>>(lookup: &F, var_name: &str, default: bool) -> Result<bool> {
    match lookup(var_name) {
        Some(val) => match val.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" | "" => Ok(false),
            _ => Err(IngestError::Config(format!("{} must be true or false", var_name))),
        },
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<IngestConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        IngestConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.source.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.source.request_timeout, Duration::from_secs(30));
        assert!(config.exchange_whitelist.is_empty());
        assert_eq!(config.exchange_data_stale_after_hours, 24);
        assert!(!config.run_ingestion_on_startup);
        assert_eq!(config.max_concurrent_requests, 4);
        assert!(config.database_url.is_none());
        assert!(!config.driver_settings().enabled);
    }

    #[test]
    fn test_whitelist_and_flags() {
        let config = config_from(&[
            ("CRYPTOCOMPARE_EXCHANGE_WHITELIST", "Kraken, Bitstamp,,Coinbase "),
            ("CRYPTOCOMPARE_EXCHANGE_DATA_STALE_AFTER_HOURS", "6"),
            ("INIT_DB", "true"),
            ("DATABASE_URL", "postgres://localhost/coins"),
            ("INGEST_MAX_CONCURRENT_REQUESTS", "8"),
        ])
        .unwrap();

        assert_eq!(config.exchange_whitelist, vec!["Kraken", "Bitstamp", "Coinbase"]);
        assert!(config.quote_policy().is_whitelisted("Bitstamp"));
        assert!(!config.quote_policy().is_whitelisted("Binance"));
        assert_eq!(config.quote_policy().stale_after(), chrono::Duration::hours(6));

        let settings = config.driver_settings();
        assert!(settings.enabled);
        assert_eq!(settings.max_concurrent_requests, 8);
    }

    #[test]
    fn test_staleness_window_range() {
        // 100 years
        let config = config_from(&[("CRYPTOCOMPARE_EXCHANGE_DATA_STALE_AFTER_HOURS", "876000")]).unwrap();
        assert_eq!(config.quote_policy().stale_after(), chrono::Duration::hours(876_000));

        let err = config_from(&[("CRYPTOCOMPARE_EXCHANGE_DATA_STALE_AFTER_HOURS", "9999999999999")]).unwrap_err();
        assert!(matches!(err, IngestError::Config(msg) if msg.contains("out of range")));
    }

    #[test]
    fn test_enabled_requires_database_unless_dry_run() {
        assert!(config_from(&[("INIT_DB", "true")]).is_err());

        let config = config_from(&[("INIT_DB", "true"), ("INGEST_DRY_RUN", "true")]).unwrap();
        assert!(config.dry_run);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(config_from(&[("CRYPTOCOMPARE_EXCHANGE_DATA_STALE_AFTER_HOURS", "0")]).is_err());
        assert!(config_from(&[("CRYPTOCOMPARE_EXCHANGE_DATA_STALE_AFTER_HOURS", "soon")]).is_err());
        assert!(config_from(&[("INGEST_MAX_CONCURRENT_REQUESTS", "0")]).is_err());
        assert!(config_from(&[("INGEST_REQUEST_TIMEOUT_SECS", "0")]).is_err());
        assert!(config_from(&[("INIT_DB", "maybe")]).is_err());
        assert!(config_from(&[("CRYPTOCOMPARE_URL", "  ")]).is_err());
    }
}
