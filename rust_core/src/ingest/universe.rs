use crate::clients::MarketDataSource;
use crate::error::{IngestError, Result};
use std::time::Duration;
use tracing::info;

/// Symbols to ingest, in the ranking order the source returns.
pub async fn resolve_universe(source: &dyn MarketDataSource, timeout: Duration) -> Result<Vec<String>> {
    let coins = tokio::time::timeout(timeout, source.fetch_top_coins())
        .await
        .map_err(|_| {
            IngestError::source_unavailable("top coins", format!("timed out after {:?}", timeout))
        })??;

    let symbols: Vec<String> = coins.into_iter().map(|c| c.symbol).collect();
    info!("Resolved {} symbols from {}", symbols.len(), source.source_name());
    Ok(symbols)
}
