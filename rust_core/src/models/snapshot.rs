use crate::error::{IngestError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Entry of the upstream top-coins ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopCoin {
    pub symbol: String,
}

/// Identity block of a snapshot. Optional fields were absent upstream and
/// leave the stored value alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinInfo {
    /// Ticker, stored as the record's `symbol`
    pub name: String,
    pub full_name: Option<String>,
    pub total_coins_mined: Option<i64>,
    pub total_volume_24h: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AggregatedData {
    pub price: Option<f64>,
    pub last_updated: Option<DateTime<Utc>>,
    pub open_day: Option<f64>,
    pub high_day: Option<f64>,
    pub low_day: Option<f64>,
}

/// One exchange's quote inside a snapshot. The 24h fields are carried for
/// completeness; only name, price and update time take part in reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeQuote {
    pub exchange_name: String,
    pub price: f64,
    /// `None` when the upstream timestamp could not be parsed
    pub last_updated: Option<DateTime<Utc>>,
    pub open_24h: f64,
    pub high_24h: f64,
    pub low_24h: f64,
    pub volume_24h: f64,
}

/// Point-in-time payload for one coin as returned by the market data source.
/// Any block may be missing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub coin_info: Option<CoinInfo>,
    pub aggregated: Option<AggregatedData>,
    /// Kept in upstream order
    pub exchanges: Option<Vec<ExchangeQuote>>,
}

/// Snapshot with every block present.
#[derive(Debug, Clone, PartialEq)]
pub struct CompleteSnapshot {
    pub coin_info: CoinInfo,
    pub aggregated: AggregatedData,
    pub exchanges: Vec<ExchangeQuote>,
}

impl Snapshot {
    pub fn is_processable(&self) -> bool {
        self.coin_info.is_some() && self.aggregated.is_some() && self.exchanges.is_some()
    }

    /// Fails with [`IngestError::UnprocessableSnapshot`] if any of coin info,
    /// aggregate data or exchange list is absent.
    pub fn into_complete(self, symbol: &str) -> Result<CompleteSnapshot> {
        match (self.coin_info, self.aggregated, self.exchanges) {
            (Some(coin_info), Some(aggregated), Some(exchanges)) => Ok(CompleteSnapshot {
                coin_info,
                aggregated,
                exchanges,
            }),
            _ => Err(IngestError::UnprocessableSnapshot(symbol.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coin_info() -> CoinInfo {
        CoinInfo {
            name: "BTC".to_string(),
            full_name: Some("Bitcoin".to_string()),
            total_coins_mined: Some(19_000_000),
            total_volume_24h: Some(1_000.0),
        }
    }

    fn aggregated() -> AggregatedData {
        AggregatedData {
            price: Some(100.0),
            last_updated: None,
            open_day: Some(90.0),
            high_day: Some(110.0),
            low_day: Some(85.0),
        }
    }

    #[test]
    fn test_complete_snapshot() {
        let snapshot = Snapshot {
            coin_info: Some(coin_info()),
            aggregated: Some(aggregated()),
            exchanges: Some(Vec::new()),
        };
        assert!(snapshot.is_processable());
        let complete = snapshot.into_complete("BTC").unwrap();
        assert_eq!(complete.coin_info.name, "BTC");
        assert!(complete.exchanges.is_empty());
    }

    #[test]
    fn test_missing_blocks_are_unprocessable() {
        let err = Snapshot::default().into_complete("BTC").unwrap_err();
        assert!(matches!(err, IngestError::UnprocessableSnapshot(ref symbol) if symbol == "BTC"));
        assert_eq!(err.to_string(), "unprocessable snapshot for 'BTC'");

        let no_exchanges = Snapshot {
            coin_info: Some(coin_info()),
            aggregated: Some(aggregated()),
            exchanges: None,
        };
        assert!(!no_exchanges.is_processable());
        assert!(no_exchanges.into_complete("BTC").is_err());

        let no_aggregate = Snapshot {
            coin_info: Some(coin_info()),
            aggregated: None,
            exchanges: Some(Vec::new()),
        };
        assert!(no_aggregate.into_complete("BTC").is_err());
    }
}
