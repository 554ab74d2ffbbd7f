//! Coin record database operations
//!
//! Postgres implementation of [`CoinStore`] over the `coins` table.

use super::CoinStore;
use crate::error::Result;
use crate::models::{CoinRecord, PriceQuote};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;

const COIN_COLUMNS: &str = r#"
    symbol, full_name, total_coins_mined,
    aggregated_price, aggregated_day_price_open, aggregated_day_price_high, aggregated_day_price_low,
    total_volume_24h,
    min_price, min_price_exchange, min_price_updated,
    max_price, max_price_exchange, max_price_updated,
    price_gap, price_gap_percent,
    date_created, date_updated
"#;

#[derive(Clone)]
pub struct PgCoinStore {
    pool: PgPool,
}

impl PgCoinStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CoinStore for PgCoinStore {
    async fn find_by_symbol(&self, symbol: &str) -> Result<Option<CoinRecord>> {
        let row = sqlx::query_as::<_, CoinRow>(&format!(
            "SELECT {} FROM coins WHERE symbol = $1",
            COIN_COLUMNS
        ))
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(CoinRow::into_record))
    }

    async fn save(&self, record: CoinRecord) -> Result<CoinRecord> {
        let row = CoinRow::from_record(&record);

        // date_created is only written by the INSERT branch
        let saved = sqlx::query_as::<_, CoinRow>(&format!(
            r#"
            INSERT INTO coins (
                symbol, full_name, total_coins_mined,
                aggregated_price, aggregated_day_price_open, aggregated_day_price_high, aggregated_day_price_low,
                total_volume_24h,
                min_price, min_price_exchange, min_price_updated,
                max_price, max_price_exchange, max_price_updated,
                price_gap, price_gap_percent,
                date_created, date_updated
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                clock_timestamp(), clock_timestamp()
            )
            ON CONFLICT (symbol) DO UPDATE SET
                full_name = EXCLUDED.full_name,
                total_coins_mined = EXCLUDED.total_coins_mined,
                aggregated_price = EXCLUDED.aggregated_price,
                aggregated_day_price_open = EXCLUDED.aggregated_day_price_open,
                aggregated_day_price_high = EXCLUDED.aggregated_day_price_high,
                aggregated_day_price_low = EXCLUDED.aggregated_day_price_low,
                total_volume_24h = EXCLUDED.total_volume_24h,
                min_price = EXCLUDED.min_price,
                min_price_exchange = EXCLUDED.min_price_exchange,
                min_price_updated = EXCLUDED.min_price_updated,
                max_price = EXCLUDED.max_price,
                max_price_exchange = EXCLUDED.max_price_exchange,
                max_price_updated = EXCLUDED.max_price_updated,
                price_gap = EXCLUDED.price_gap,
                price_gap_percent = EXCLUDED.price_gap_percent,
                date_updated = GREATEST(clock_timestamp(), coins.date_updated + INTERVAL '1 microsecond')
            RETURNING {}
            "#,
            COIN_COLUMNS
        ))
        .bind(&row.symbol)
        .bind(&row.full_name)
        .bind(row.total_coins_mined)
        .bind(row.aggregated_price)
        .bind(row.aggregated_day_price_open)
        .bind(row.aggregated_day_price_high)
        .bind(row.aggregated_day_price_low)
        .bind(row.total_volume_24h)
        .bind(row.min_price)
        .bind(&row.min_price_exchange)
        .bind(row.min_price_updated)
        .bind(row.max_price)
        .bind(&row.max_price_exchange)
        .bind(row.max_price_updated)
        .bind(row.price_gap)
        .bind(row.price_gap_percent)
        .fetch_one(&self.pool)
        .await?;

        debug!("Upserted coin {}", saved.symbol);

        Ok(saved.into_record())
    }

    async fn find_by_full_name(&self, name: &str) -> Result<Vec<CoinRecord>> {
        let rows = sqlx::query_as::<_, CoinRow>(&format!(
            "SELECT {} FROM coins WHERE full_name = $1 ORDER BY symbol",
            COIN_COLUMNS
        ))
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CoinRow::into_record).collect())
    }

    async fn find_by_price_gap_between(&self, low: f64, high: f64) -> Result<Vec<CoinRecord>> {
        let rows = sqlx::query_as::<_, CoinRow>(&format!(
            "SELECT {} FROM coins WHERE price_gap BETWEEN $1 AND $2 ORDER BY price_gap DESC",
            COIN_COLUMNS
        ))
        .bind(low)
        .bind(high)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CoinRow::into_record).collect())
    }

    async fn find_by_price_gap_percent_between(&self, low: f64, high: f64) -> Result<Vec<CoinRecord>> {
        let rows = sqlx::query_as::<_, CoinRow>(&format!(
            "SELECT {} FROM coins WHERE price_gap_percent BETWEEN $1 AND $2 ORDER BY price_gap_percent DESC",
            COIN_COLUMNS
        ))
        .bind(low)
        .bind(high)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CoinRow::into_record).collect())
    }
}

/// Flat row of the `coins` table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CoinRow {
    pub symbol: String,
    pub full_name: String,
    pub total_coins_mined: i64,
    pub aggregated_price: f64,
    pub aggregated_day_price_open: f64,
    pub aggregated_day_price_high: f64,
    pub aggregated_day_price_low: f64,
    pub total_volume_24h: f64,
    pub min_price: Option<f64>,
    pub min_price_exchange: Option<String>,
    pub min_price_updated: Option<DateTime<Utc>>,
    pub max_price: Option<f64>,
    pub max_price_exchange: Option<String>,
    pub max_price_updated: Option<DateTime<Utc>>,
    pub price_gap: Option<f64>,
    pub price_gap_percent: Option<f64>,
    pub date_created: Option<DateTime<Utc>>,
    pub date_updated: Option<DateTime<Utc>>,
}

impl CoinRow {
    pub fn from_record(record: &CoinRecord) -> Self {
        let min = record.min_price.as_ref();
        let max = record.max_price.as_ref();
        Self {
            symbol: record.symbol.clone(),
            full_name: record.full_name.clone(),
            total_coins_mined: record.total_coins_mined,
            aggregated_price: record.aggregated_price,
            aggregated_day_price_open: record.aggregated_day_price_open,
            aggregated_day_price_high: record.aggregated_day_price_high,
            aggregated_day_price_low: record.aggregated_day_price_low,
            total_volume_24h: record.total_volume_24h,
            min_price: min.map(|q| q.price),
            min_price_exchange: min.map(|q| q.exchange.clone()),
            min_price_updated: min.map(|q| q.updated),
            max_price: max.map(|q| q.price),
            max_price_exchange: max.map(|q| q.exchange.clone()),
            max_price_updated: max.map(|q| q.updated),
            price_gap: record.price_gap,
            price_gap_percent: record.price_gap_percent,
            date_created: record.date_created,
            date_updated: record.date_updated,
        }
    }

    /// A price triple with any column missing is read back as no price at all.
    pub fn into_record(self) -> CoinRecord {
        CoinRecord {
            min_price: quote(self.min_price, self.min_price_exchange, self.min_price_updated),
            max_price: quote(self.max_price, self.max_price_exchange, self.max_price_updated),
            symbol: self.symbol,
            full_name: self.full_name,
            total_coins_mined: self.total_coins_mined,
            aggregated_price: self.aggregated_price,
            aggregated_day_price_open: self.aggregated_day_price_open,
            aggregated_day_price_high: self.aggregated_day_price_high,
            aggregated_day_price_low: self.aggregated_day_price_low,
            total_volume_24h: self.total_volume_24h,
            price_gap: self.price_gap,
            price_gap_percent: self.price_gap_percent,
            date_created: self.date_created,
            date_updated: self.date_updated,
        }
    }
}

fn quote(price: Option<f64>, exchange: Option<String>, updated: Option<DateTime<Utc>>) -> Option<PriceQuote> {
    Some(PriceQuote {
        price: price?,
        exchange: exchange?,
        updated: updated?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_round_trip_keeps_price_triples() {
        let now = Utc::now();
        let record = CoinRecord {
            full_name: "Bitcoin".to_string(),
            total_coins_mined: 21,
            min_price: Some(PriceQuote {
                price: 1.0,
                exchange: "Kraken".to_string(),
                updated: now,
            }),
            max_price: None,
            price_gap: None,
            ..CoinRecord::new("BTC")
        };

        let row = CoinRow::from_record(&record);
        assert_eq!(row.min_price, Some(1.0));
        assert_eq!(row.min_price_exchange.as_deref(), Some("Kraken"));
        assert!(row.max_price.is_none());
        assert!(row.max_price_exchange.is_none());
        assert!(row.max_price_updated.is_none());

        assert_eq!(row.into_record(), record);
    }

    #[test]
    fn test_partial_price_columns_read_as_none() {
        let mut row = CoinRow::from_record(&CoinRecord::new("ETH"));
        row.min_price = Some(3.0);
        row.min_price_exchange = Some("Kraken".to_string());
        // min_price_updated left null

        assert!(row.into_record().min_price.is_none());
    }
}
