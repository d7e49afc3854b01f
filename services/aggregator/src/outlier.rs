//! Cross-exchange price deviation analysis.
//!
//! The detector is pure math over the latest per-exchange prices in the
//! look-back window; the poller handles the persistence gate (only
//! `symbol`-method mappings are written out) and the store round-trips.
//! Statistics run in floating point; relative magnitudes matter here, not
//! exact values.

use types::{ExchangeId, TokenId};

use crate::storage::PairPriceSample;

/// Detection thresholds.
#[derive(Debug, Clone)]
pub struct OutlierConfig {
    /// Relative deviation from the pair mean that flags an entry (fraction).
    pub deviation_threshold: f64,
    /// Standard-deviation multiple that flags an entry.
    pub std_dev_multiplier: f64,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            deviation_threshold: 0.05,
            std_dev_multiplier: 2.0,
        }
    }
}

/// A flagged `(exchange, pair)` price, before the mapping-method gate.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlierCandidate {
    pub exchange_id: ExchangeId,
    pub base_token_id: TokenId,
    pub quote_token_id: TokenId,
    pub exchange_price: f64,
    pub average_price: f64,
    /// `|price - mean| / mean`, as a percentage.
    pub deviation_percent: f64,
    /// `|price - mean| / sigma`; 0 when the window had no spread.
    pub std_deviations: f64,
}

/// Statistical outlier detector over windowed pair prices.
pub struct OutlierDetector {
    config: OutlierConfig,
}

impl OutlierDetector {
    /// Detector with the given thresholds.
    pub fn new(config: OutlierConfig) -> Self {
        Self { config }
    }

    /// Flag entries deviating from their pair's cross-exchange mean, either
    /// relatively (`> deviation_threshold`) or statistically
    /// (`> std_dev_multiplier` sigmas, population variance).
    pub fn detect(&self, samples: &[PairPriceSample]) -> Vec<OutlierCandidate> {
        use std::collections::BTreeMap;

        let mut groups: BTreeMap<(TokenId, TokenId), Vec<&PairPriceSample>> = BTreeMap::new();
        for sample in samples {
            if sample.price.is_finite() && sample.price > 0.0 {
                groups
                    .entry((sample.base_token_id, sample.quote_token_id))
                    .or_default()
                    .push(sample);
            }
        }

        let mut candidates = Vec::new();
        for ((base, quote), members) in groups {
            if members.len() < 2 {
                continue;
            }

            let n = members.len() as f64;
            let mean = members.iter().map(|s| s.price).sum::<f64>() / n;
            if mean <= 0.0 {
                continue;
            }
            // Population variance: E[X^2] - mean^2.
            let mean_sq = members.iter().map(|s| s.price * s.price).sum::<f64>() / n;
            let sigma = (mean_sq - mean * mean).max(0.0).sqrt();

            for sample in members {
                let distance = (sample.price - mean).abs();
                let relative = distance / mean;
                let sigmas = if sigma > 0.0 { distance / sigma } else { 0.0 };

                if relative > self.config.deviation_threshold
                    || sigmas > self.config.std_dev_multiplier
                {
                    candidates.push(OutlierCandidate {
                        exchange_id: ExchangeId::new(&sample.exchange_id),
                        base_token_id: base,
                        quote_token_id: quote,
                        exchange_price: sample.price,
                        average_price: mean,
                        deviation_percent: relative * 100.0,
                        std_deviations: sigmas,
                    });
                }
            }
        }
        candidates
    }
}
