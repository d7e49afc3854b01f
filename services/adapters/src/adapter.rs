//! Core trait for exchange adapters.

use std::time::Duration;

use async_trait::async_trait;
use types::{CanonicalTicker, ExchangeDescriptor, ExchangeHealth, ExchangeSymbol};

use crate::error::Result;

/// One venue's data-collection surface, as seen by the poller.
///
/// Implementations are stateless apart from their health counters: a fetch
/// either yields the full parsed batch or a typed error with no partial
/// output, and never retries internally; the poller owns the retry cadence.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// Static configuration for this venue.
    fn descriptor(&self) -> &ExchangeDescriptor;

    /// Fetch and normalize the venue's full ticker snapshot.
    async fn fetch_all_tickers(&self, deadline: Duration) -> Result<Vec<CanonicalTicker>>;

    /// Fetch the venue's tradable-symbol list (initial discovery).
    async fn fetch_symbols(&self, deadline: Duration) -> Result<Vec<ExchangeSymbol>>;

    /// Snapshot of the adapter's health counters.
    fn health(&self) -> ExchangeHealth;
}
