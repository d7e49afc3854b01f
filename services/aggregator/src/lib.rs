//! # Pricegrid Aggregator Service
//!
//! The long-running core of the platform: polls every configured exchange
//! adapter on a fixed cadence, resolves venue symbols to stable token ids,
//! computes cross-exchange VWAP per pair, flags suspected mis-mappings, and
//! batches everything into the time-series store.
//!
//! ## Data Flow
//!
//! ```text
//! [ExchangeAdapter]* -> [Poller] -> [SymbolResolver] -> [TickerSink]
//!                                         |                  |
//!                                         v                  v
//!                                    [VwapEngine] ----> [VwapSink]
//!                                         |
//!                                         v
//!                                  [OutlierDetector]
//! ```
//!
//! Errors never cross the poller boundary as panics: every subsystem
//! returns a typed outcome and the cycle carries on with what it has.

pub mod outlier;
pub mod poller;
pub mod resolver;
pub mod sink;
pub mod storage;
pub mod vwap;

pub use outlier::{OutlierCandidate, OutlierConfig, OutlierDetector};
pub use poller::{Poller, PollerConfig};
pub use resolver::SymbolResolver;
pub use sink::SinkQueue;
pub use storage::{
    HealthRow, PairPriceSample, SeriesStore, StoreError, TickerRow, TokenStore, VwapRow,
};
pub use vwap::{VwapConfig, VwapEngine};
