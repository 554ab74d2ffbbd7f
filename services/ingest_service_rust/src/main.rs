use anyhow::{Context, Result};
use dotenv::dotenv;
use pricegap_core::clients::{CryptoCompareClient, MarketDataSource};
use pricegap_core::db::{create_pool, ensure_schema, CoinStore, DbPoolConfig, InMemoryCoinStore, PgCoinStore};
use pricegap_core::{IngestConfig, IngestionDriver};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    info!("Starting Coin Ingest Service...");

    let config = IngestConfig::from_env().context("Invalid ingestion configuration")?;

    if !config.run_ingestion_on_startup {
        info!("INIT_DB is not set; nothing to ingest");
        return Ok(());
    }

    // Store
    let store: Arc<dyn CoinStore> = if config.dry_run {
        warn!("INGEST_DRY_RUN is set; records are kept in memory only");
        Arc::new(InMemoryCoinStore::new())
    } else {
        let database_url = config
            .database_url
            .as_deref()
            .context("DATABASE_URL must be set")?;
        let pool = create_pool(database_url, &DbPoolConfig::for_workers(config.max_concurrent_requests))
            .await
            .context("Failed to connect to database")?;
        ensure_schema(&pool)
            .await
            .context("Failed to prepare coins table")?;
        Arc::new(PgCoinStore::new(pool))
    };

    // Source
    let source: Arc<dyn MarketDataSource> = Arc::new(
        CryptoCompareClient::new(&config.source).context("Failed to initialize CryptoCompareClient")?,
    );

    let driver = IngestionDriver::from_config(&config, source, store);

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            // No signal handler; let the pass run to completion
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    let summary = driver.run_until(shutdown).await.context("Ingestion pass failed")?;

    info!(
        "Ingestion summary: {}",
        serde_json::to_string(&summary).unwrap_or_else(|_| format!("{:?}", summary))
    );

    if summary.cancelled {
        warn!("Ingestion was interrupted; some coins were not refreshed");
    }

    Ok(())
}
