//! Exchange registry loading and validation.
//!
//! The registry is a JSON document listing every venue the poller may hit:
//!
//! ```json
//! { "exchanges": [
//!     { "id": "binance", "name": "Binance", "base_url": "https://api.binance.com",
//!       "ticker_endpoint": "/api/v3/ticker/24hr", "symbols_endpoint": "/api/v3/exchangeInfo",
//!       "rate_limit_per_minute": 1200, "weight": 0.15, "request_timeout": 5000,
//!       "retry_attempts": 3, "symbol_format": "BTCUSDT",
//!       "quote_currencies": ["USDT", "USDC", "USD"], "disabled": false }
//! ] }
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info};

use types::{ExchangeDescriptor, ExchangeId, SymbolFormat};

/// Raw registry document as it appears on disk.
#[derive(Debug, Deserialize)]
pub struct ExchangeRegistry {
    pub exchanges: Vec<ExchangeEntry>,
}

/// One venue entry, pre-validation.
#[derive(Debug, Deserialize)]
pub struct ExchangeEntry {
    pub id: String,
    pub name: String,
    pub base_url: String,
    pub ticker_endpoint: String,
    pub symbols_endpoint: String,
    pub rate_limit_per_minute: u32,
    pub weight: Decimal,
    /// Milliseconds.
    pub request_timeout: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    pub symbol_format: SymbolFormat,
    pub quote_currencies: Vec<String>,
    #[serde(default)]
    pub disabled: bool,
}

fn default_retry_attempts() -> u32 {
    3
}

impl ExchangeEntry {
    fn into_descriptor(self) -> Result<ExchangeDescriptor> {
        if self.id.trim().is_empty() {
            bail!("exchange entry with empty id");
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            bail!("exchange {}: base_url must be http(s): {}", self.id, self.base_url);
        }
        if self.rate_limit_per_minute == 0 {
            bail!("exchange {}: rate_limit_per_minute must be positive", self.id);
        }
        if self.weight <= Decimal::ZERO || self.weight > Decimal::ONE {
            bail!("exchange {}: weight must be in (0, 1], got {}", self.id, self.weight);
        }
        if self.request_timeout == 0 {
            bail!("exchange {}: request_timeout must be positive", self.id);
        }
        if self.quote_currencies.is_empty() {
            bail!("exchange {}: quote_currencies must not be empty", self.id);
        }

        Ok(ExchangeDescriptor {
            id: ExchangeId::new(&self.id),
            display_name: self.name,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            ticker_path: self.ticker_endpoint,
            symbols_path: self.symbols_endpoint,
            rate_limit_per_minute: self.rate_limit_per_minute,
            request_timeout: Duration::from_millis(self.request_timeout),
            retry_attempts: self.retry_attempts,
            weight: self.weight,
            symbol_format: self.symbol_format,
            quote_currencies: self
                .quote_currencies
                .into_iter()
                .map(|q| q.to_uppercase())
                .collect(),
        })
    }
}

/// Load and validate the registry, returning descriptors for enabled venues.
///
/// Any structural or semantic problem is fatal: the registry is startup-only
/// configuration and a half-loaded venue set would silently skew VWAP.
pub fn load_registry(path: &Path) -> Result<Vec<ExchangeDescriptor>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading exchange registry {}", path.display()))?;
    let registry: ExchangeRegistry = serde_json::from_str(&raw)
        .with_context(|| format!("parsing exchange registry {}", path.display()))?;

    let mut seen = HashSet::new();
    let mut descriptors = Vec::new();
    for entry in registry.exchanges {
        let id = entry.id.to_lowercase();
        if !seen.insert(id.clone()) {
            bail!("duplicate exchange id in registry: {id}");
        }
        if entry.disabled {
            debug!(exchange = %id, "skipping disabled exchange");
            continue;
        }
        descriptors.push(entry.into_descriptor()?);
    }

    if descriptors.is_empty() {
        bail!("exchange registry {} has no enabled exchanges", path.display());
    }
    info!(count = descriptors.len(), "loaded exchange registry");
    Ok(descriptors)
}
