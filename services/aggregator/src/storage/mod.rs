//! Storage traits and row types.
//!
//! The relational token store (Postgres) and the columnar time-series store
//! (ClickHouse) sit behind traits so the resolver, sinks and poller are
//! testable with in-memory fakes. TTLs and partitioning live in the DDL
//! under `sql/`, not in code.

pub mod clickhouse;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use types::{
    CanonicalTicker, HealthEvent, PriceOutlier, SymbolMapping, Token, TradingPairMapping,
    VwapResult,
};

pub use self::clickhouse::ClickHouseSeriesStore;
pub use self::postgres::PgTokenStore;

/// Storage-layer error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("postgres error: {0}")]
    Postgres(#[from] sqlx::Error),

    #[error("clickhouse error: {0}")]
    ClickHouse(#[from] ::clickhouse::error::Error),

    #[error("corrupt stored value: {0}")]
    Corrupt(String),
}

/// Authoritative store for tokens and symbol/pair mappings.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn load_tokens(&self) -> Result<Vec<Token>, StoreError>;
    async fn load_symbol_mappings(&self) -> Result<Vec<SymbolMapping>, StoreError>;
    async fn load_pair_mappings(&self) -> Result<Vec<TradingPairMapping>, StoreError>;

    /// Insert or update; keyed by `(exchange_id, exchange_symbol)`.
    async fn upsert_symbol_mapping(&self, mapping: &SymbolMapping) -> Result<(), StoreError>;

    /// Insert or update; keyed by `(exchange_id, exchange_pair_symbol)`.
    async fn upsert_pair_mapping(&self, mapping: &TradingPairMapping) -> Result<(), StoreError>;

    async fn insert_outlier(&self, outlier: &PriceOutlier) -> Result<(), StoreError>;
}

/// Columnar time-series store for tickers, VWAP points and health events.
#[async_trait]
pub trait SeriesStore: Send + Sync {
    async fn write_tickers(&self, rows: &[TickerRow]) -> Result<(), StoreError>;
    async fn write_vwap(&self, rows: &[VwapRow]) -> Result<(), StoreError>;
    async fn write_health(&self, rows: &[HealthRow]) -> Result<(), StoreError>;

    /// Latest price per `(pair, exchange)` within the look-back window,
    /// resolved rows only. Feeds the outlier detector.
    async fn latest_pair_prices(&self, window: Duration)
        -> Result<Vec<PairPriceSample>, StoreError>;
}

/// Raw ticker row. Unresolved token ids are stored as 0 so the record stays
/// available for later remapping.
#[derive(Debug, Clone, PartialEq, ::clickhouse::Row, Serialize, Deserialize)]
#[clickhouse(crate = "::clickhouse")]
pub struct TickerRow {
    #[serde(with = "::clickhouse::serde::chrono::datetime")]
    pub timestamp: DateTime<Utc>,
    pub exchange_id: String,
    pub base_token_id: u32,
    pub quote_token_id: u32,
    pub symbol: String,
    pub base_symbol: String,
    pub quote_symbol: String,
    pub price: f64,
    pub volume_24h: f64,
    pub quote_volume_24h: f64,
    pub high_24h: f64,
    pub low_24h: f64,
    pub price_change_24h: f64,
}

fn to_f64(d: rust_decimal::Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

impl From<&CanonicalTicker> for TickerRow {
    fn from(t: &CanonicalTicker) -> Self {
        Self {
            timestamp: t.timestamp,
            exchange_id: t.exchange_id.to_string(),
            base_token_id: t.base_token_id,
            quote_token_id: t.quote_token_id,
            symbol: t.raw_symbol.clone(),
            base_symbol: t.base_symbol.clone(),
            quote_symbol: t.quote_symbol.clone(),
            price: to_f64(t.price),
            volume_24h: to_f64(t.volume_24h),
            quote_volume_24h: t.quote_volume_24h.map(to_f64).unwrap_or(0.0),
            high_24h: t.high_24h.map(to_f64).unwrap_or(0.0),
            low_24h: t.low_24h.map(to_f64).unwrap_or(0.0),
            price_change_24h: t.price_change_24h.map(to_f64).unwrap_or(0.0),
        }
    }
}

/// VWAP series row. The price was quantized to 8 decimals before this row
/// was built, so the stored value is decimal-stable.
#[derive(Debug, Clone, PartialEq, ::clickhouse::Row, Serialize, Deserialize)]
#[clickhouse(crate = "::clickhouse")]
pub struct VwapRow {
    #[serde(with = "::clickhouse::serde::chrono::datetime")]
    pub timestamp: DateTime<Utc>,
    pub base_token_id: u32,
    pub quote_token_id: u32,
    pub vwap_price: f64,
    pub total_volume: f64,
    pub exchange_count: u32,
    pub contributing_exchanges: Vec<String>,
}

impl From<&VwapResult> for VwapRow {
    fn from(v: &VwapResult) -> Self {
        Self {
            timestamp: v.timestamp,
            base_token_id: v.base_token_id,
            quote_token_id: v.quote_token_id,
            vwap_price: to_f64(v.vwap_price),
            total_volume: to_f64(v.total_volume),
            exchange_count: v.exchange_count,
            contributing_exchanges: v
                .contributing_exchanges
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }
}

/// One adapter call outcome in the health series.
#[derive(Debug, Clone, PartialEq, ::clickhouse::Row, Serialize, Deserialize)]
#[clickhouse(crate = "::clickhouse")]
pub struct HealthRow {
    #[serde(with = "::clickhouse::serde::chrono::datetime")]
    pub timestamp: DateTime<Utc>,
    pub exchange_id: String,
    pub response_time_ms: u64,
    pub success: bool,
    pub error_message: Option<String>,
    pub http_status_code: Option<u16>,
    pub symbols_fetched: u32,
    /// Remaining venue budget; the cell limiter does not expose it, kept
    /// nullable for venues that report it in response headers.
    pub rate_limit_remaining: Option<u32>,
}

impl From<&HealthEvent> for HealthRow {
    fn from(e: &HealthEvent) -> Self {
        Self {
            timestamp: e.timestamp,
            exchange_id: e.exchange_id.to_string(),
            response_time_ms: e.response_time_ms,
            success: e.success,
            error_message: e.error_message.clone(),
            http_status_code: e.http_status_code,
            symbols_fetched: e.symbols_fetched,
            rate_limit_remaining: None,
        }
    }
}

/// Latest per-exchange price for one pair, as returned by the look-back
/// query. Statistics over these run in floating point by design.
#[derive(Debug, Clone, PartialEq, ::clickhouse::Row, Serialize, Deserialize)]
#[clickhouse(crate = "::clickhouse")]
pub struct PairPriceSample {
    pub exchange_id: String,
    pub base_token_id: u32,
    pub quote_token_id: u32,
    pub price: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use types::ExchangeId;

    #[test]
    fn ticker_row_preserves_unresolved_ids_as_zero() {
        let ticker = CanonicalTicker {
            exchange_id: ExchangeId::new("somedex"),
            raw_symbol: "ABCXYZ".into(),
            base_symbol: "ABC".into(),
            quote_symbol: "XYZ".into(),
            base_token_id: 0,
            quote_token_id: 0,
            price: dec!(1.5),
            volume_24h: dec!(10),
            quote_volume_24h: None,
            high_24h: Some(dec!(2)),
            low_24h: None,
            price_change_24h: Some(dec!(-0.1)),
            timestamp: Utc::now(),
        };
        let row = TickerRow::from(&ticker);
        assert_eq!(row.base_token_id, 0);
        assert_eq!(row.quote_token_id, 0);
        assert_eq!(row.price, 1.5);
        assert_eq!(row.quote_volume_24h, 0.0);
        assert_eq!(row.high_24h, 2.0);
    }

    #[test]
    fn vwap_row_flattens_contributors() {
        let result = VwapResult {
            base_token_id: 1,
            quote_token_id: 2,
            timestamp: Utc::now(),
            vwap_price: dec!(50050),
            total_volume: dec!(30),
            exchange_count: 2,
            contributing_exchanges: vec![ExchangeId::new("a"), ExchangeId::new("b")],
        };
        let row = VwapRow::from(&result);
        assert_eq!(row.contributing_exchanges, vec!["a", "b"]);
        assert_eq!(row.exchange_count, 2);
    }
}
