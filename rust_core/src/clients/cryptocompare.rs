//! CryptoCompare API Client
//!
//! Fetches the top coins by trading volume and full per-exchange snapshots
//! for a coin from https://min-api.cryptocompare.com.
//!
//! The API does not always signal failure through the HTTP status: a 2xx body
//! may carry `"Error"` in either its `Response` or its `Message` field. The one
//! exception is `Message == "No exchanges available"`, which only means the
//! coin has no exchange data.

use super::market_data::MarketDataSource;
use crate::config::SourceConfig;
use crate::error::{IngestError, Result};
use crate::models::{AggregatedData, CoinInfo, ExchangeQuote, Snapshot, TopCoin};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

const ERROR_MARKER: &str = "Error";
const NO_EXCHANGES_MESSAGE: &str = "No exchanges available";

pub struct CryptoCompareClient {
    client: Client,
    base_url: String,
    top_coins_path: String,
    snapshot_path: String,
}

impl CryptoCompareClient {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent("PriceGap/1.0")
            .build()
            .map_err(|e| IngestError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            top_coins_path: config.top_coins_path.clone(),
            snapshot_path: config.snapshot_path.clone(),
        })
    }

    pub fn top_coins_url(&self) -> String {
        format!("{}{}", self.base_url, self.top_coins_path)
    }

    pub fn snapshot_url(&self, symbol: &str) -> String {
        format!("{}{}{}", self.base_url, self.snapshot_path, symbol)
    }

    /// GET `url` and return the body once it passed error classification.
    async fn get_checked(&self, url: &str, context: &str) -> Result<String> {
        debug!("Fetching {} from CryptoCompare", context);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| IngestError::source_unavailable(context, format!("request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| IngestError::source_unavailable(context, format!("failed to read body: {}", e)))?;

        check_for_errors(status, &body, context)?;
        Ok(body)
    }
}

#[async_trait]
impl MarketDataSource for CryptoCompareClient {
    fn source_name(&self) -> &str {
        "CryptoCompare"
    }

    async fn fetch_top_coins(&self) -> Result<Vec<TopCoin>> {
        let body = self.get_checked(&self.top_coins_url(), "top coins").await?;
        parse_top_coins(&body)
    }

    async fn fetch_snapshot(&self, symbol: &str) -> Result<Snapshot> {
        let context = format!("snapshot {}", symbol);
        let body = self.get_checked(&self.snapshot_url(symbol), &context).await?;
        parse_snapshot(&body, &context)
    }
}

// ============================================================================
// Error classification
// ============================================================================

/// Status fields shared by every CryptoCompare response
#[derive(Debug, Default, Deserialize)]
struct ResponseEnvelope {
    #[serde(rename = "Response", default)]
    response: Option<String>,
    #[serde(rename = "Message", default)]
    message: Option<String>,
    #[serde(rename = "ErrorsSummary", default)]
    errors_summary: Option<serde_json::Value>,
}

impl ResponseEnvelope {
    fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }

    fn signals_error(&self) -> bool {
        let contains_error = self.message.as_deref() == Some(ERROR_MARKER)
            || self.response.as_deref() == Some(ERROR_MARKER);
        let false_positive = self.message.as_deref() == Some(NO_EXCHANGES_MESSAGE);
        contains_error && !false_positive
    }
}

fn check_for_errors(status: StatusCode, body: &str, context: &str) -> Result<()> {
    let envelope = ResponseEnvelope::parse(body);
    if !status.is_success() || envelope.signals_error() {
        return Err(IngestError::source_unavailable(
            context,
            describe_failure(status, &envelope),
        ));
    }
    Ok(())
}

fn describe_failure(status: StatusCode, envelope: &ResponseEnvelope) -> String {
    let mut text = format!(
        "Did not receive a successful response from CryptoCompare: HTTP status code = {}",
        status.as_u16()
    );
    if let Some(message) = &envelope.message {
        text.push_str(&format!(", Message = '{}'", message));
    }
    if let Some(response) = &envelope.response {
        text.push_str(&format!(", Response = '{}'", response));
    }
    match &envelope.errors_summary {
        Some(serde_json::Value::String(summary)) => {
            text.push_str(&format!(", Summary = '{}'", summary))
        }
        Some(serde_json::Value::Null) | None => {}
        Some(other) => text.push_str(&format!(", Summary = '{}'", other)),
    }
    text
}

// ============================================================================
// Response decoding
// ============================================================================

/// `Data` is an array on success but can be `{}` or `[]` on empty results, so
/// it is captured untyped and decoded afterwards.
#[derive(Debug, Deserialize)]
struct DataResponse {
    #[serde(rename = "Data", default)]
    data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct TopCoinEntry {
    #[serde(rename = "CoinInfo", default)]
    coin_info: Option<TopCoinInfo>,
}

#[derive(Debug, Deserialize)]
struct TopCoinInfo {
    #[serde(rename = "Name", default)]
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SnapshotData {
    #[serde(rename = "CoinInfo", default)]
    coin_info: Option<CoinInfoDto>,
    #[serde(rename = "AggregatedData", default)]
    aggregated_data: Option<AggregatedDto>,
    #[serde(rename = "Exchanges", default)]
    exchanges: Option<Vec<ExchangeDto>>,
}

#[derive(Debug, Deserialize)]
struct CoinInfoDto {
    #[serde(rename = "Name", default)]
    name: Option<String>,
    #[serde(rename = "FullName", default)]
    full_name: Option<String>,
    #[serde(rename = "TotalCoinsMined", default, deserialize_with = "de::lenient_f64")]
    total_coins_mined: Option<f64>,
    #[serde(rename = "TotalVolume24H", default, deserialize_with = "de::lenient_f64")]
    total_volume_24h: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct AggregatedDto {
    #[serde(rename = "PRICE", default, deserialize_with = "de::lenient_f64")]
    price: Option<f64>,
    #[serde(rename = "LASTUPDATE", default, deserialize_with = "de::unix_seconds")]
    last_updated: Option<DateTime<Utc>>,
    #[serde(rename = "OPENDAY", default, deserialize_with = "de::lenient_f64")]
    open_day: Option<f64>,
    #[serde(rename = "HIGHDAY", default, deserialize_with = "de::lenient_f64")]
    high_day: Option<f64>,
    #[serde(rename = "LOWDAY", default, deserialize_with = "de::lenient_f64")]
    low_day: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ExchangeDto {
    #[serde(rename = "MARKET", default)]
    market: Option<String>,
    #[serde(rename = "PRICE", default, deserialize_with = "de::lenient_f64")]
    price: Option<f64>,
    #[serde(rename = "LASTUPDATE", default, deserialize_with = "de::unix_seconds")]
    last_updated: Option<DateTime<Utc>>,
    #[serde(rename = "OPEN24HOUR", default, deserialize_with = "de::lenient_f64")]
    open_24h: Option<f64>,
    #[serde(rename = "HIGH24HOUR", default, deserialize_with = "de::lenient_f64")]
    high_24h: Option<f64>,
    #[serde(rename = "LOW24HOUR", default, deserialize_with = "de::lenient_f64")]
    low_24h: Option<f64>,
    #[serde(rename = "VOLUME24HOUR", default, deserialize_with = "de::lenient_f64")]
    volume_24h: Option<f64>,
}

fn decode<T: DeserializeOwned>(body: &str, context: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| {
        IngestError::source_unavailable(context, format!("failed to parse CryptoCompare response: {}", e))
    })
}

/// Top coins in upstream order; entries without a coin name are dropped.
fn parse_top_coins(body: &str) -> Result<Vec<TopCoin>> {
    let response: DataResponse = decode(body, "top coins")?;
    let entries: Vec<TopCoinEntry> = match response.data {
        Some(data @ serde_json::Value::Array(_)) => serde_json::from_value(data).map_err(|e| {
            IngestError::source_unavailable("top coins", format!("unexpected Data layout: {}", e))
        })?,
        _ => Vec::new(),
    };

    Ok(entries
        .into_iter()
        .filter_map(|entry| entry.coin_info?.name)
        .map(|symbol| TopCoin { symbol })
        .collect())
}

fn parse_snapshot(body: &str, context: &str) -> Result<Snapshot> {
    let response: DataResponse = decode(body, context)?;
    let data: SnapshotData = match response.data {
        Some(data @ serde_json::Value::Object(_)) => serde_json::from_value(data).map_err(|e| {
            IngestError::source_unavailable(context, format!("unexpected Data layout: {}", e))
        })?,
        _ => SnapshotData::default(),
    };

    Ok(Snapshot {
        coin_info: data.coin_info.and_then(CoinInfoDto::into_domain),
        aggregated: data.aggregated_data.map(AggregatedDto::into_domain),
        exchanges: data
            .exchanges
            .map(|quotes| quotes.into_iter().filter_map(ExchangeDto::into_domain).collect()),
    })
}

impl CoinInfoDto {
    /// Without a name the coin cannot be keyed, so the block counts as absent.
    fn into_domain(self) -> Option<CoinInfo> {
        Some(CoinInfo {
            name: self.name?,
            full_name: self.full_name,
            total_coins_mined: self.total_coins_mined.map(|mined| mined.max(0.0) as i64),
            total_volume_24h: self.total_volume_24h,
        })
    }
}

impl AggregatedDto {
    fn into_domain(self) -> AggregatedData {
        AggregatedData {
            price: self.price,
            last_updated: self.last_updated,
            open_day: self.open_day,
            high_day: self.high_day,
            low_day: self.low_day,
        }
    }
}

impl ExchangeDto {
    /// Quotes lacking an exchange name or a price are not comparable and are dropped.
    fn into_domain(self) -> Option<ExchangeQuote> {
        Some(ExchangeQuote {
            exchange_name: self.market?,
            price: self.price?,
            last_updated: self.last_updated,
            open_24h: self.open_24h.unwrap_or(0.0),
            high_24h: self.high_24h.unwrap_or(0.0),
            low_24h: self.low_24h.unwrap_or(0.0),
            volume_24h: self.volume_24h.unwrap_or(0.0),
        })
    }
}

mod de {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Unix seconds given as a number or a numeric string. Anything else
    /// decodes as `None` rather than failing the whole response.
    pub fn unix_seconds<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = match Option::<Value>::deserialize(deserializer)? {
            Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        Ok(secs.and_then(|s| Utc.timestamp_opt(s, 0).single()))
    }

    /// Number or numeric string.
    pub fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<Value>::deserialize(deserializer)? {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        })
    }
}
