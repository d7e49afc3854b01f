//! Per-exchange rate limiting.
//!
//! Each venue advertises a request budget per minute; the poller must keep a
//! minimum inter-call interval of `60s / rate_limit_per_minute` per venue.
//! A cell-style limiter with burst 1 encodes exactly that: `check` fails
//! when the interval has not yet elapsed and the tick is skipped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter as GovernorLimiter};
use types::ExchangeId;

/// Rate limiter for venue REST requests.
#[derive(Clone, Default)]
pub struct RateLimiter {
    limiters: HashMap<ExchangeId, Arc<DefaultDirectRateLimiter>>,
}

impl RateLimiter {
    /// Create an empty limiter; venues without configuration are unlimited.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the budget for a venue.
    pub fn configure_exchange(&mut self, exchange: ExchangeId, requests_per_minute: u32) {
        if requests_per_minute == 0 {
            tracing::warn!(exchange = %exchange, "ignoring zero rate limit");
            return;
        }
        let interval = Duration::from_secs_f64(60.0 / f64::from(requests_per_minute));
        match Quota::with_period(interval) {
            Some(quota) => {
                self.limiters
                    .insert(exchange, Arc::new(GovernorLimiter::direct(quota)));
            }
            None => {
                tracing::warn!(
                    exchange = %exchange,
                    requests_per_minute,
                    "rate limit interval too small, leaving venue unlimited"
                );
            }
        }
    }

    /// Whether a request is allowed right now (non-blocking); consumes the
    /// cell on success.
    pub fn check(&self, exchange: &ExchangeId) -> bool {
        self.limiters
            .get(exchange)
            .map(|limiter| limiter.check().is_ok())
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_exchange_is_unlimited() {
        let limiter = RateLimiter::new();
        let id = ExchangeId::new("somedex");
        assert!(limiter.check(&id));
        assert!(limiter.check(&id));
    }

    #[test]
    fn back_to_back_calls_within_interval_are_rejected() {
        let mut limiter = RateLimiter::new();
        let id = ExchangeId::new("slowdex");
        // One request per minute: the second immediate check must fail.
        limiter.configure_exchange(id.clone(), 1);
        assert!(limiter.check(&id));
        assert!(!limiter.check(&id));
    }

    #[test]
    fn generous_budget_admits_successive_ticks() {
        let mut limiter = RateLimiter::new();
        let id = ExchangeId::new("binance");
        // 1200/min -> 50ms interval; two checks 60ms apart must both pass.
        limiter.configure_exchange(id.clone(), 1200);
        assert!(limiter.check(&id));
        std::thread::sleep(Duration::from_millis(60));
        assert!(limiter.check(&id));
    }
}
