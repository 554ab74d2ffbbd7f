//! Postgres coin store tests
//!
//! Need a scratch database: `DATABASE_URL=postgres://... cargo test -- --ignored`

use chrono::{TimeZone, Utc};
use pricegap_core::db::{create_pool, ensure_schema, CoinStore, DbPoolConfig, PgCoinStore};
use pricegap_core::models::{CoinRecord, PriceQuote};

async fn store() -> PgCoinStore {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = create_pool(&url, &DbPoolConfig::default()).await.unwrap();
    ensure_schema(&pool).await.unwrap();
    PgCoinStore::new(pool)
}

fn record(symbol: &str, gap: f64, gap_pct: f64) -> CoinRecord {
    let updated = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    CoinRecord {
        full_name: format!("{} PgTest", symbol),
        total_coins_mined: 21,
        aggregated_price: 10.0,
        min_price: Some(PriceQuote {
            price: 10.0,
            exchange: "Kraken".to_string(),
            updated,
        }),
        max_price: Some(PriceQuote {
            price: 10.0 + gap,
            exchange: "Bitstamp".to_string(),
            updated,
        }),
        price_gap: Some(gap),
        price_gap_percent: Some(gap_pct),
        ..CoinRecord::new(symbol)
    }
}

#[tokio::test]
#[ignore]
async fn test_upsert_keeps_created_and_moves_updated() {
    let store = store().await;
    sqlx::query("DELETE FROM coins WHERE symbol = 'PGT1'")
        .execute(store.pool())
        .await
        .unwrap();

    let first = store.save(record("PGT1", 1.0, 10.0)).await.unwrap();
    let second = store.save(CoinRecord::new("PGT1")).await.unwrap();

    assert_eq!(first.min_price.as_ref().unwrap().exchange, "Kraken");
    assert!(first.date_created.is_some());
    assert_eq!(second.date_created, first.date_created);
    assert!(second.date_updated > first.date_updated);
    assert!(!second.has_price_data());

    let loaded = store.find_by_symbol("PGT1").await.unwrap().unwrap();
    assert_eq!(loaded, second);
}

#[tokio::test]
#[ignore]
async fn test_range_finders_are_inclusive() {
    let store = store().await;
    sqlx::query("DELETE FROM coins WHERE symbol IN ('PGT2', 'PGT3')")
        .execute(store.pool())
        .await
        .unwrap();

    store.save(record("PGT2", 5.0, 50.0)).await.unwrap();
    store.save(record("PGT3", 7.5, 75.0)).await.unwrap();

    let by_gap: Vec<String> = store
        .find_by_price_gap_between(5.0, 7.5)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.symbol)
        .filter(|s| s.starts_with("PGT"))
        .collect();
    assert_eq!(by_gap, vec!["PGT3", "PGT2"]);

    let by_pct = store.find_by_price_gap_percent_between(60.0, 75.0).await.unwrap();
    assert!(by_pct.iter().any(|r| r.symbol == "PGT3"));
    assert!(!by_pct.iter().any(|r| r.symbol == "PGT2"));

    let by_name = store.find_by_full_name("PGT2 PgTest").await.unwrap();
    assert_eq!(by_name.len(), 1);
}
