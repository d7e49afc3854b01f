//! Kraken parser: `result` map keyed by vendor-internal pair codes, values
//! holding positional stat arrays (`c` close, `v` volume, `h` high, `l` low).
//!
//! Index 0 of each array is the value for "today", index 1 the rolling 24h
//! window; the 24h slot is used where present.

use serde_json::Value;

use types::{CanonicalTicker, ExchangeDescriptor, ExchangeSymbol};

use super::{decode_json, finish_record, string_field, value_to_decimal, RawRecord, ResponseParser};
use crate::error::{AdapterError, Result};
use crate::symbol::kraken_canonical_asset;
use rust_decimal::Decimal;

/// Parser for Kraken's public ticker and asset-pair endpoints.
pub struct KrakenParser;

impl KrakenParser {
    fn array_stat(record: &Value, key: &str, index: usize) -> Option<Decimal> {
        record
            .get(key)
            .and_then(Value::as_array)
            .and_then(|arr| arr.get(index).or_else(|| arr.first()))
            .and_then(value_to_decimal)
    }

    fn result_map<'v>(
        value: &'v Value,
        exchange: &ExchangeDescriptor,
    ) -> Result<&'v serde_json::Map<String, Value>> {
        if let Some(errors) = value.get("error").and_then(Value::as_array) {
            if !errors.is_empty() {
                return Err(AdapterError::Decode {
                    exchange: exchange.id.clone(),
                    error: format!("venue error: {errors:?}"),
                });
            }
        }
        value
            .get("result")
            .and_then(Value::as_object)
            .ok_or_else(|| AdapterError::Decode {
                exchange: exchange.id.clone(),
                error: "expected object with result map".into(),
            })
    }
}

impl ResponseParser for KrakenParser {
    fn parse_tickers(
        &self,
        body: &[u8],
        exchange: &ExchangeDescriptor,
    ) -> Result<Vec<CanonicalTicker>> {
        let value = decode_json(body, exchange)?;
        let result = Self::result_map(&value, exchange)?;

        let mut tickers = Vec::with_capacity(result.len());
        for (pair_code, record) in result {
            let Some(price) =
                Self::array_stat(record, "c", 0).filter(|p| *p > Decimal::ZERO)
            else {
                continue;
            };

            let raw = RawRecord {
                symbol: pair_code.clone(),
                price,
                volume: Self::array_stat(record, "v", 1).unwrap_or(Decimal::ZERO),
                quote_volume: None,
                high: Self::array_stat(record, "h", 1),
                low: Self::array_stat(record, "l", 1),
                change: record.get("o").and_then(value_to_decimal).map(|open| price - open),
                base: None,
                quote: None,
            };
            tickers.push(finish_record(raw, exchange));
        }
        Ok(tickers)
    }

    fn parse_symbols(
        &self,
        body: &[u8],
        exchange: &ExchangeDescriptor,
    ) -> Result<Vec<ExchangeSymbol>> {
        let value = decode_json(body, exchange)?;
        let result = Self::result_map(&value, exchange)?;

        let mut symbols = Vec::with_capacity(result.len());
        for (pair_code, record) in result {
            let (Some(base), Some(quote)) = (
                string_field(record, &["base"]),
                string_field(record, &["quote"]),
            ) else {
                continue;
            };
            symbols.push(ExchangeSymbol {
                symbol: pair_code.clone(),
                base_asset: kraken_canonical_asset(&base),
                quote_asset: kraken_canonical_asset(&quote),
                is_active: record
                    .get("status")
                    .and_then(Value::as_str)
                    .map(|s| s == "online")
                    .unwrap_or(true),
            });
        }
        Ok(symbols)
    }
}
