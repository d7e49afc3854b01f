//! Error types for the adapter layer.

use thiserror::Error;
use types::ExchangeId;

/// Result type alias for adapter operations.
pub type Result<T> = std::result::Result<T, AdapterError>;

/// Main error type for adapter operations.
///
/// Every variant is tagged with the venue it came from so poll-cycle logs
/// stay attributable without extra context plumbing.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Transport-level failure: refused, reset, DNS, TLS.
    #[error("connection failed for exchange {exchange}: {reason}")]
    ConnectionFailed {
        /// The venue that failed to connect.
        exchange: ExchangeId,
        /// Reason for the failure.
        reason: String,
    },

    /// The per-call deadline elapsed before a response arrived.
    #[error("request to exchange {exchange} timed out after {timeout_ms}ms")]
    Timeout {
        /// The venue that timed out.
        exchange: ExchangeId,
        /// Deadline in milliseconds.
        timeout_ms: u64,
    },

    /// The venue answered with a non-success status.
    #[error("exchange {exchange} returned HTTP {status}")]
    HttpStatus {
        /// The venue that rejected the request.
        exchange: ExchangeId,
        /// The HTTP status code.
        status: u16,
    },

    /// The response body was not the JSON shape the parser expects.
    #[error("failed to decode response from exchange {exchange}: {error}")]
    Decode {
        /// The venue that produced the unparseable body.
        exchange: ExchangeId,
        /// Underlying decode failure.
        error: String,
    },

    /// The poller skipped this venue to honor its rate budget.
    #[error("rate limit would be exceeded for exchange {exchange}")]
    RateLimited {
        /// The venue whose budget would be exceeded.
        exchange: ExchangeId,
    },

    /// Invalid adapter construction or client setup.
    #[error("adapter configuration error: {0}")]
    Configuration(String),
}

impl AdapterError {
    /// Whether this failure counts toward the adapter's health counter.
    ///
    /// Transport failures, timeouts, bad statuses and decode errors all do;
    /// a rate-limit skip is scheduling, not venue failure.
    pub fn counts_toward_health(&self) -> bool {
        !matches!(self, AdapterError::RateLimited { .. } | AdapterError::Configuration(_))
    }

    /// Whether the next cadence tick can plausibly succeed unchanged.
    pub fn is_transient(&self) -> bool {
        match self {
            AdapterError::ConnectionFailed { .. } | AdapterError::Timeout { .. } => true,
            AdapterError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            AdapterError::RateLimited { .. } => true,
            AdapterError::Decode { .. } | AdapterError::Configuration(_) => false,
        }
    }

    /// HTTP status carried by this error, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            AdapterError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}
