//! REST adapter implementation.
//!
//! One `GET` per fetch against the venue's ticker or symbols endpoint, with
//! the poller-supplied deadline layered over the descriptor's own request
//! timeout. A non-success status or undecodable body is an error with no
//! partial output; health counters are updated on every outcome.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use tracing::debug;

use types::{CanonicalTicker, ExchangeDescriptor, ExchangeHealth, ExchangeSymbol};

use crate::adapter::ExchangeAdapter;
use crate::error::{AdapterError, Result};
use crate::health::HealthTracker;
use crate::parsers::{parser_for, ResponseParser};

/// User agent sent with every exchange request.
pub const USER_AGENT_VALUE: &str = "CryptoPlatform/1.0";

/// [`ExchangeAdapter`] backed by a venue REST endpoint.
pub struct RestExchangeAdapter {
    descriptor: ExchangeDescriptor,
    client: reqwest::Client,
    parser: &'static dyn ResponseParser,
    health: HealthTracker,
}

impl RestExchangeAdapter {
    /// Build an adapter for one registry entry. The parser is chosen by
    /// venue slug; unknown venues get the unified parser.
    pub fn new(descriptor: ExchangeDescriptor) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(descriptor.request_timeout)
            .build()
            .map_err(|e| AdapterError::Configuration(e.to_string()))?;

        let parser = parser_for(&descriptor.id);
        Ok(Self {
            descriptor,
            client,
            parser,
            health: HealthTracker::new(),
        })
    }

    async fn get_body(&self, url: &str, deadline: Duration) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .timeout(deadline)
            .send()
            .await
            .map_err(|e| self.classify_transport_error(e, deadline))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::HttpStatus {
                exchange: self.descriptor.id.clone(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.classify_transport_error(e, deadline))?;
        Ok(body.to_vec())
    }

    fn classify_transport_error(&self, error: reqwest::Error, deadline: Duration) -> AdapterError {
        if error.is_timeout() {
            AdapterError::Timeout {
                exchange: self.descriptor.id.clone(),
                timeout_ms: deadline.as_millis() as u64,
            }
        } else {
            AdapterError::ConnectionFailed {
                exchange: self.descriptor.id.clone(),
                reason: error.to_string(),
            }
        }
    }

    fn record_outcome<T>(&self, started: Instant, result: &Result<T>) {
        match result {
            Ok(_) => self.health.record_success(started.elapsed()),
            Err(e) if e.counts_toward_health() => self.health.record_failure(),
            Err(_) => {}
        }
    }
}

#[async_trait]
impl ExchangeAdapter for RestExchangeAdapter {
    fn descriptor(&self) -> &ExchangeDescriptor {
        &self.descriptor
    }

    async fn fetch_all_tickers(&self, deadline: Duration) -> Result<Vec<CanonicalTicker>> {
        let started = Instant::now();
        let result = async {
            let body = self.get_body(&self.descriptor.ticker_url(), deadline).await?;
            self.parser.parse_tickers(&body, &self.descriptor)
        }
        .await;
        self.record_outcome(started, &result);

        if let Ok(tickers) = &result {
            debug!(
                exchange = %self.descriptor.id,
                count = tickers.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "fetched tickers"
            );
        }
        result
    }

    async fn fetch_symbols(&self, deadline: Duration) -> Result<Vec<ExchangeSymbol>> {
        let started = Instant::now();
        let result = async {
            let body = self.get_body(&self.descriptor.symbols_url(), deadline).await?;
            self.parser.parse_symbols(&body, &self.descriptor)
        }
        .await;
        self.record_outcome(started, &result);
        result
    }

    fn health(&self) -> ExchangeHealth {
        self.health.snapshot()
    }
}
