//! Per-adapter health tracking.
//!
//! One mutex guards the handful of health fields; the adapter mutates them
//! on every fetch outcome and the poller reads a snapshot when deciding
//! whether to schedule the venue this tick.

use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use types::ExchangeHealth;

/// Thread-safe wrapper around one adapter's [`ExchangeHealth`].
#[derive(Debug, Default)]
pub struct HealthTracker {
    inner: Mutex<ExchangeHealth>,
}

impl HealthTracker {
    /// Fresh tracker: healthy, no samples.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful fetch and its latency.
    pub fn record_success(&self, response_time: Duration) {
        self.inner.lock().record_success(response_time, Utc::now());
    }

    /// Record a failed fetch.
    pub fn record_failure(&self) {
        self.inner.lock().record_failure();
    }

    /// Copy of the current health state.
    pub fn snapshot(&self) -> ExchangeHealth {
        self.inner.lock().clone()
    }

    /// Convenience accessor for the scheduling decision.
    pub fn is_healthy(&self) -> bool {
        self.inner.lock().is_healthy
    }
}
