use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One exchange's price at a point in time, as stored on a coin record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub price: f64,
    pub exchange: String,
    pub updated: DateTime<Utc>,
}

/// Canonical per-coin record, unique by `symbol`.
///
/// `min_price` and `max_price` keep price, exchange and update time together so
/// the three columns can only ever be all set or all null.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CoinRecord {
    pub symbol: String,
    pub full_name: String,
    pub total_coins_mined: i64,

    // Source-reported aggregate, not exchange specific
    pub aggregated_price: f64,
    pub aggregated_day_price_open: f64,
    pub aggregated_day_price_high: f64,
    pub aggregated_day_price_low: f64,
    pub total_volume_24h: f64,

    pub min_price: Option<PriceQuote>,
    pub max_price: Option<PriceQuote>,
    /// `max_price - min_price`
    pub price_gap: Option<f64>,
    /// `price_gap / min_price * 100`
    pub price_gap_percent: Option<f64>,

    /// Assigned by the store on first save
    pub date_created: Option<DateTime<Utc>>,
    /// Refreshed by the store on every save
    pub date_updated: Option<DateTime<Utc>>,
}

impl CoinRecord {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }

    pub fn has_price_data(&self) -> bool {
        self.min_price.is_some() && self.max_price.is_some()
    }

    /// Drop every exchange-derived price field.
    pub fn clear_price_data(&mut self) {
        self.min_price = None;
        self.max_price = None;
        self.price_gap = None;
        self.price_gap_percent = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_has_no_price_data_or_timestamps() {
        let record = CoinRecord::new("BTC");
        assert_eq!(record.symbol, "BTC");
        assert!(!record.has_price_data());
        assert!(record.date_created.is_none());
        assert!(record.date_updated.is_none());
    }

    #[test]
    fn test_clear_price_data() {
        let quote = PriceQuote {
            price: 10.0,
            exchange: "Kraken".to_string(),
            updated: Utc::now(),
        };
        let mut record = CoinRecord {
            min_price: Some(quote.clone()),
            max_price: Some(quote),
            price_gap: Some(0.0),
            price_gap_percent: Some(0.0),
            ..CoinRecord::new("ETH")
        };

        record.clear_price_data();

        assert!(record.min_price.is_none());
        assert!(record.max_price.is_none());
        assert!(record.price_gap.is_none());
        assert!(record.price_gap_percent.is_none());
    }
}
