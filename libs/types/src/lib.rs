//! # Pricegrid Unified Types Library
//!
//! Single home for the domain model shared by every Pricegrid service:
//! exchange descriptors, canonical tickers, token/mapping records, VWAP
//! results and outlier rows.
//!
//! ## Design Philosophy
//!
//! - **Typed identifiers**: `ExchangeId` and `TokenId` are distinct types so
//!   an exchange slug can never be confused with a token reference.
//! - **Decimal prices**: all pricing fields are `rust_decimal::Decimal`;
//!   floating point appears only in statistics (see the outlier detector).
//! - **No back-references**: tokens, mappings and exchanges form a DAG keyed
//!   by integer ids, never by shared object references.

pub mod exchange;
pub mod ticker;
pub mod token;
pub mod vwap;

pub use exchange::{
    ExchangeDescriptor, ExchangeHealth, ExchangeId, HealthEvent, SymbolFormat, SymbolFormatError,
};
pub use ticker::{CanonicalTicker, ExchangeSymbol};
pub use token::{
    MappingMethod, MappingMethodError, SymbolMapping, Token, TokenId, TradingPairMapping,
    UNRESOLVED_TOKEN,
};
pub use vwap::{PriceOutlier, VwapResult};
