//! Tokens and the symbol/pair mapping records that bind them to exchanges.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::exchange::ExchangeId;

/// Stable integer token identifier. `0` marks an unresolved reference.
pub type TokenId = u32;

/// Sentinel for a ticker leg the resolver could not map.
pub const UNRESOLVED_TOKEN: TokenId = 0;

/// A listed asset. Created out-of-band by the seed process; `token_id` is
/// immutable once assigned and `symbol` is unique case-insensitively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub token_id: TokenId,
    /// Uppercase canonical ticker, e.g. `BTC`.
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub categories: Vec<String>,
    /// Free-form metadata; may carry a cross-market `slug`.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub is_active: bool,
}

impl Token {
    /// Cross-market slug from the metadata bag, if present.
    pub fn slug(&self) -> Option<&str> {
        self.metadata.get("slug").map(String::as_str)
    }
}

/// Provenance of a symbol-to-token assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingMethod {
    /// Assigned by an operator.
    Manual,
    /// Matched by cross-market slug.
    Slug,
    /// Auto-matched by ticker symbol; lower confidence.
    Symbol,
    /// Approximate match.
    Fuzzy,
}

impl MappingMethod {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Slug => "slug",
            Self::Symbol => "symbol",
            Self::Fuzzy => "fuzzy",
        }
    }
}

impl fmt::Display for MappingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for an unknown mapping-method string.
#[derive(Debug, thiserror::Error)]
#[error("unknown mapping method: {0}")]
pub struct MappingMethodError(pub String);

impl FromStr for MappingMethod {
    type Err = MappingMethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Self::Manual),
            "slug" => Ok(Self::Slug),
            "symbol" => Ok(Self::Symbol),
            "fuzzy" => Ok(Self::Fuzzy),
            other => Err(MappingMethodError(other.to_string())),
        }
    }
}

/// `(exchange, exchange_symbol) -> token` assignment.
///
/// Unique by `(exchange_id, exchange_symbol)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolMapping {
    pub token_id: TokenId,
    pub exchange_id: ExchangeId,
    pub exchange_symbol: String,
    pub normalized_symbol: String,
    pub mapping_method: MappingMethod,
    /// In [0, 1].
    pub confidence_score: Decimal,
    pub needs_verification: bool,
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
}

impl SymbolMapping {
    /// A low-confidence mapping produced by resolver backfill.
    pub fn backfilled(
        token_id: TokenId,
        exchange_id: ExchangeId,
        exchange_symbol: String,
        normalized_symbol: String,
    ) -> Self {
        Self {
            token_id,
            exchange_id,
            exchange_symbol,
            normalized_symbol,
            mapping_method: MappingMethod::Symbol,
            confidence_score: Decimal::new(5, 1),
            needs_verification: true,
            verified_by: None,
            verified_at: None,
        }
    }
}

/// `(exchange, pair_symbol) -> (base, quote)` assignment.
///
/// Unique by `(exchange_id, exchange_pair_symbol)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingPairMapping {
    pub base_token_id: TokenId,
    pub quote_token_id: TokenId,
    pub exchange_id: ExchangeId,
    pub exchange_pair_symbol: String,
    pub mapping_method: MappingMethod,
    pub confidence_score: Decimal,
    pub needs_verification: bool,
    pub last_volume_24h: Option<Decimal>,
}

impl TradingPairMapping {
    /// A low-confidence pair produced by resolver backfill.
    pub fn backfilled(
        base_token_id: TokenId,
        quote_token_id: TokenId,
        exchange_id: ExchangeId,
        exchange_pair_symbol: String,
    ) -> Self {
        Self {
            base_token_id,
            quote_token_id,
            exchange_id,
            exchange_pair_symbol,
            mapping_method: MappingMethod::Symbol,
            confidence_score: Decimal::new(5, 1),
            needs_verification: true,
            last_volume_24h: None,
        }
    }
}
