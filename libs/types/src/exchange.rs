//! Exchange identity, static configuration and runtime health.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Stable exchange slug (`binance`, `kraken`, ...). Lowercase by construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeId(String);

impl ExchangeId {
    /// Build an id from any casing; slugs are normalized to lowercase.
    pub fn new(slug: impl AsRef<str>) -> Self {
        Self(slug.as_ref().to_lowercase())
    }

    /// The slug as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExchangeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// How a venue spells its pair symbols.
///
/// The variant names follow the canonical example in each venue's docs;
/// lowercase wire forms (`btcusdt`) parse to the same variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolFormat {
    /// `BTCUSDT`: no separator, quote appended.
    Concatenated,
    /// `BTC-USDT`
    DashSeparated,
    /// `BTC_USDT`
    UnderscoreSeparated,
    /// `BTC/USDT`
    SlashSeparated,
    /// `tBTCUSD`: Bitfinex trading-pair prefix.
    BitfinexPrefixed,
    /// `XXBTZUSD`: Kraken legacy asset codes.
    KrakenLegacy,
}

/// Error returned when a config string is not a recognized symbol format.
#[derive(Debug, thiserror::Error)]
#[error("unrecognized symbol format: {0}")]
pub struct SymbolFormatError(pub String);

impl FromStr for SymbolFormat {
    type Err = SymbolFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BTCUSDT" => Ok(Self::Concatenated),
            "BTC-USDT" => Ok(Self::DashSeparated),
            "BTC_USDT" => Ok(Self::UnderscoreSeparated),
            "BTC/USDT" => Ok(Self::SlashSeparated),
            "TBTCUSD" => Ok(Self::BitfinexPrefixed),
            "XXBTZUSD" => Ok(Self::KrakenLegacy),
            other => Err(SymbolFormatError(other.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for SymbolFormat {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl Serialize for SymbolFormat {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let s = match self {
            Self::Concatenated => "BTCUSDT",
            Self::DashSeparated => "BTC-USDT",
            Self::UnderscoreSeparated => "BTC_USDT",
            Self::SlashSeparated => "BTC/USDT",
            Self::BitfinexPrefixed => "tBTCUSD",
            Self::KrakenLegacy => "XXBTZUSD",
        };
        serializer.serialize_str(s)
    }
}

impl SymbolFormat {
    /// Separator character, if this format uses one.
    pub fn separator(&self) -> Option<char> {
        match self {
            Self::DashSeparated => Some('-'),
            Self::UnderscoreSeparated => Some('_'),
            Self::SlashSeparated => Some('/'),
            _ => None,
        }
    }
}

/// Immutable per-run description of one exchange endpoint.
///
/// Loaded from the exchange registry at startup; never mutated afterwards.
/// Weights are independent per exchange and are not required to sum to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeDescriptor {
    /// Stable slug, unique across the registry.
    pub id: ExchangeId,
    /// Human-readable name for logs and operator tooling.
    pub display_name: String,
    /// Scheme + host, no trailing slash.
    pub base_url: String,
    /// Path of the all-tickers endpoint, appended to `base_url`.
    pub ticker_path: String,
    /// Path of the symbol-discovery endpoint.
    pub symbols_path: String,
    /// Venue-documented request budget, enforced by the poller.
    pub rate_limit_per_minute: u32,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Retained from the registry; retries are a poller concern, the adapter
    /// itself never retries within a tick.
    pub retry_attempts: u32,
    /// VWAP contribution weight, in (0, 1].
    pub weight: Decimal,
    /// Pair spelling used by this venue.
    pub symbol_format: SymbolFormat,
    /// Ordered quote-currency list, fiat and stablecoins first.
    pub quote_currencies: Vec<String>,
}

impl ExchangeDescriptor {
    /// Full URL of the all-tickers endpoint.
    pub fn ticker_url(&self) -> String {
        format!("{}{}", self.base_url, self.ticker_path)
    }

    /// Full URL of the symbol-discovery endpoint.
    pub fn symbols_url(&self) -> String {
        format!("{}{}", self.base_url, self.symbols_path)
    }
}

/// Consecutive failures before an adapter is considered unhealthy.
pub const UNHEALTHY_ERROR_THRESHOLD: u32 = 3;

/// Smoothing factor for the response-time running average.
const RESPONSE_TIME_ALPHA: f64 = 0.2;

/// Mutable per-adapter health, guarded by a single mutex in the adapter.
///
/// Transition rule: three consecutive errors flip `is_healthy` to false; the
/// next success flips it back and resets the error counter.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeHealth {
    pub is_healthy: bool,
    pub last_successful_poll: Option<DateTime<Utc>>,
    pub consecutive_errors: u32,
    pub average_response_ms: f64,
}

impl Default for ExchangeHealth {
    fn default() -> Self {
        Self {
            is_healthy: true,
            last_successful_poll: None,
            consecutive_errors: 0,
            average_response_ms: 0.0,
        }
    }
}

impl ExchangeHealth {
    /// Record a successful poll with its observed latency.
    pub fn record_success(&mut self, response_time: Duration, at: DateTime<Utc>) {
        let sample = response_time.as_secs_f64() * 1000.0;
        self.average_response_ms = if self.last_successful_poll.is_none() {
            sample
        } else {
            RESPONSE_TIME_ALPHA * sample + (1.0 - RESPONSE_TIME_ALPHA) * self.average_response_ms
        };
        self.last_successful_poll = Some(at);
        self.consecutive_errors = 0;
        self.is_healthy = true;
    }

    /// Record a failed poll; flips to unhealthy at the threshold.
    pub fn record_failure(&mut self) {
        self.consecutive_errors += 1;
        if self.consecutive_errors >= UNHEALTHY_ERROR_THRESHOLD {
            self.is_healthy = false;
        }
    }
}

/// One adapter call observed by the poller, persisted to the health series.
#[derive(Debug, Clone)]
pub struct HealthEvent {
    pub timestamp: DateTime<Utc>,
    pub exchange_id: ExchangeId,
    pub response_time_ms: u64,
    pub success: bool,
    pub error_message: Option<String>,
    pub http_status_code: Option<u16>,
    pub symbols_fetched: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_format_parses_lowercase_variants() {
        assert_eq!(
            "btcusdt".parse::<SymbolFormat>().unwrap(),
            SymbolFormat::Concatenated
        );
        assert_eq!(
            "btc-usdt".parse::<SymbolFormat>().unwrap(),
            SymbolFormat::DashSeparated
        );
        assert_eq!(
            "tbtcusd".parse::<SymbolFormat>().unwrap(),
            SymbolFormat::BitfinexPrefixed
        );
        assert!("BTC:USDT".parse::<SymbolFormat>().is_err());
    }

    #[test]
    fn health_flips_after_three_consecutive_errors() {
        let mut health = ExchangeHealth::default();
        health.record_failure();
        health.record_failure();
        assert!(health.is_healthy);
        health.record_failure();
        assert!(!health.is_healthy);
        assert_eq!(health.consecutive_errors, 3);

        health.record_success(Duration::from_millis(120), Utc::now());
        assert!(health.is_healthy);
        assert_eq!(health.consecutive_errors, 0);
    }

    #[test]
    fn response_time_average_is_exponentially_weighted() {
        let mut health = ExchangeHealth::default();
        let now = Utc::now();
        health.record_success(Duration::from_millis(100), now);
        assert!((health.average_response_ms - 100.0).abs() < f64::EPSILON);

        health.record_success(Duration::from_millis(200), now);
        // 0.2 * 200 + 0.8 * 100
        assert!((health.average_response_ms - 120.0).abs() < 1e-9);
    }

    #[test]
    fn exchange_id_normalizes_case() {
        assert_eq!(ExchangeId::new("Binance"), ExchangeId::new("binance"));
        assert_eq!(ExchangeId::new("KRAKEN").as_str(), "kraken");
    }
}
