//! `coins` table definition

use crate::error::Result;
use sqlx::PgPool;
use tracing::info;

const SCHEMA_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS coins (
        id BIGSERIAL PRIMARY KEY,
        symbol TEXT NOT NULL UNIQUE,
        full_name TEXT NOT NULL,
        total_coins_mined BIGINT NOT NULL DEFAULT 0 CHECK (total_coins_mined >= 0),
        aggregated_price DOUBLE PRECISION NOT NULL,
        aggregated_day_price_open DOUBLE PRECISION NOT NULL,
        aggregated_day_price_high DOUBLE PRECISION NOT NULL,
        aggregated_day_price_low DOUBLE PRECISION NOT NULL,
        total_volume_24h DOUBLE PRECISION NOT NULL,
        min_price DOUBLE PRECISION,
        min_price_exchange TEXT,
        min_price_updated TIMESTAMPTZ,
        max_price DOUBLE PRECISION,
        max_price_exchange TEXT,
        max_price_updated TIMESTAMPTZ,
        price_gap DOUBLE PRECISION,
        price_gap_percent DOUBLE PRECISION,
        date_created TIMESTAMPTZ NOT NULL,
        date_updated TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_coins_full_name ON coins (full_name)",
    "CREATE INDEX IF NOT EXISTS idx_coins_min_price ON coins (min_price)",
    "CREATE INDEX IF NOT EXISTS idx_coins_max_price ON coins (max_price)",
    "CREATE INDEX IF NOT EXISTS idx_coins_price_gap ON coins (price_gap)",
    "CREATE INDEX IF NOT EXISTS idx_coins_price_gap_percent ON coins (price_gap_percent)",
];

/// Create the `coins` table and its indexes if they do not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    for statement in SCHEMA_STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("coins schema ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_declares_unique_symbol() {
        assert!(SCHEMA_STATEMENTS[0].contains("symbol TEXT NOT NULL UNIQUE"));
        assert!(SCHEMA_STATEMENTS.iter().all(|s| s.contains("IF NOT EXISTS")));
    }
}
