//! Aggregation outputs: VWAP series points and flagged price outliers.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::exchange::ExchangeId;
use crate::token::{MappingMethod, TokenId};

/// One cross-exchange VWAP point for a `(base, quote)` pair.
///
/// Invariants: `exchange_count >= 2`, `vwap_price > 0`, price quantized to
/// 8 decimal places, `contributing_exchanges` deduplicated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VwapResult {
    pub base_token_id: TokenId,
    pub quote_token_id: TokenId,
    pub timestamp: DateTime<Utc>,
    pub vwap_price: Decimal,
    /// Sum of 24h volumes over the deduplicated (untrimmed) contributor set.
    pub total_volume: Decimal,
    pub exchange_count: u32,
    pub contributing_exchanges: Vec<ExchangeId>,
}

/// A per-exchange price flagged as deviating from the cross-exchange mean.
///
/// Surfaces suspected mis-mappings, not market anomalies: rows are only
/// persisted when the offending mapping was auto-backfilled (`symbol`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceOutlier {
    pub exchange_id: ExchangeId,
    pub base_token_id: TokenId,
    pub quote_token_id: TokenId,
    pub exchange_price: Decimal,
    pub average_price: Decimal,
    /// `|price - mean| / mean`, as a percentage.
    pub deviation_percent: f64,
    /// `|price - mean| / sigma`; 0 when the window had no spread.
    pub std_deviations: f64,
    pub mapping_method: MappingMethod,
    pub detected_at: DateTime<Utc>,
    pub is_resolved: bool,
}
