//! # Pricegrid Adapters - Exchange Data Collection Layer
//!
//! ## Purpose
//!
//! Stateless adapters that fetch per-symbol ticker snapshots from
//! heterogeneous exchange REST endpoints and normalize vendor JSON into
//! [`types::CanonicalTicker`] records with parsed `(base, quote)` legs.
//!
//! ## Integration Points
//!
//! - **Input sources**: venue REST endpoints (`GET`, JSON), one request per
//!   poll cycle per venue
//! - **Output**: canonical tickers consumed by the resolver and the sinks
//! - **Monitoring**: per-adapter health counters read by the poller
//! - **Rate limiting**: per-venue minimum inter-call interval enforced by
//!   the poller through [`RateLimiter`]
//!
//! ## Stateless Transformation Principles
//!
//! Adapters ARE format converters, validators and health recorders. They are
//! NOT retry loops (the poller owns the retry cadence), aggregators, or
//! storage: a failed fetch returns a typed error with no partial output.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapter;
pub mod error;
pub mod health;
pub mod parsers;
pub mod rate_limit;
pub mod rest;
pub mod symbol;

pub use adapter::ExchangeAdapter;
pub use error::{AdapterError, Result};
pub use health::HealthTracker;
pub use parsers::{parser_for, ResponseParser};
pub use rate_limit::RateLimiter;
pub use rest::RestExchangeAdapter;
pub use symbol::{format_join, normalization_candidates, parse_symbol_pair};
