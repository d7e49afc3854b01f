//! In-flight ticker snapshots, normalized from vendor payloads.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::exchange::ExchangeId;
use crate::token::{TokenId, UNRESOLVED_TOKEN};

/// Sanity gate: a price at or above this is treated as decimal misplacement.
pub const MAX_SANE_PRICE: u64 = 1_000_000;

/// Sanity gate for 24h volume, in the token's native decimals.
pub const MAX_SANE_VOLUME: u64 = 1_000_000_000;

/// One per-symbol snapshot in canonical form.
///
/// Produced by an adapter's response parser, enriched by the symbol resolver
/// (token ids start out unresolved), consumed by the sinks and the VWAP
/// engine. Parsers guarantee `price > 0`; empty base/quote legs are passed
/// through and filtered out of VWAP input downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTicker {
    pub exchange_id: ExchangeId,
    /// The symbol exactly as the venue spelled it.
    pub raw_symbol: String,
    pub base_symbol: String,
    pub quote_symbol: String,
    #[serde(default)]
    pub base_token_id: TokenId,
    #[serde(default)]
    pub quote_token_id: TokenId,
    pub price: Decimal,
    pub volume_24h: Decimal,
    pub quote_volume_24h: Option<Decimal>,
    pub high_24h: Option<Decimal>,
    pub low_24h: Option<Decimal>,
    pub price_change_24h: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

impl CanonicalTicker {
    /// Both legs carry a real token id.
    pub fn is_resolved(&self) -> bool {
        self.base_token_id != UNRESOLVED_TOKEN && self.quote_token_id != UNRESOLVED_TOKEN
    }

    /// Whether this ticker may contribute to VWAP: resolved, positive price
    /// and volume, and within the coarse sanity gates.
    pub fn is_vwap_eligible(&self) -> bool {
        self.is_resolved()
            && self.price > Decimal::ZERO
            && self.volume_24h > Decimal::ZERO
            && self.price < Decimal::from(MAX_SANE_PRICE)
            && self.volume_24h < Decimal::from(MAX_SANE_VOLUME)
    }
}

/// A tradable symbol reported by a venue's discovery endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeSymbol {
    /// Venue spelling, e.g. `BTCUSDT`.
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
    /// False when the venue reports the market as halted or delisted.
    pub is_active: bool,
}
