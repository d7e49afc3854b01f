//! Bybit parser: `result.list` array of ticker objects.

use serde_json::Value;

use types::{CanonicalTicker, ExchangeDescriptor, ExchangeSymbol};

use super::{decode_json, extract_record, finish_record, string_field, ResponseParser};
use crate::error::{AdapterError, Result};
use crate::symbol::parse_symbol_pair;

/// Parser for Bybit's v5 market endpoints.
pub struct BybitParser;

impl BybitParser {
    fn result_list<'v>(value: &'v Value, exchange: &ExchangeDescriptor) -> Result<&'v Vec<Value>> {
        value
            .get("result")
            .and_then(|r| r.get("list"))
            .and_then(Value::as_array)
            .ok_or_else(|| AdapterError::Decode {
                exchange: exchange.id.clone(),
                error: "expected result.list array".into(),
            })
    }
}

impl ResponseParser for BybitParser {
    fn parse_tickers(
        &self,
        body: &[u8],
        exchange: &ExchangeDescriptor,
    ) -> Result<Vec<CanonicalTicker>> {
        let value = decode_json(body, exchange)?;
        let list = Self::result_list(&value, exchange)?;

        let mut tickers = Vec::with_capacity(list.len());
        for record in list {
            // Bybit spells fields camelCase with a 24h suffix; the candidate
            // lists cover lastPrice, and the 24h stats are probed here.
            let Some(mut raw) = extract_record(record, None) else {
                continue;
            };
            if raw.volume.is_zero() {
                if let Some(v) = super::decimal_field(record, &["volume24h"]) {
                    raw.volume = v;
                }
            }
            if raw.quote_volume.is_none() {
                raw.quote_volume = super::decimal_field(record, &["turnover24h"]);
            }
            if raw.high.is_none() {
                raw.high = super::decimal_field(record, &["highPrice24h"]);
            }
            if raw.low.is_none() {
                raw.low = super::decimal_field(record, &["lowPrice24h"]);
            }
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
        let list = Self::result_list(&value, exchange)?;

        let mut symbols = Vec::with_capacity(list.len());
        for record in list {
            let Some(symbol) = string_field(record, &["symbol"]) else {
                continue;
            };
            let (base, quote) = match (
                string_field(record, &["baseCoin"]),
                string_field(record, &["quoteCoin"]),
            ) {
                (Some(b), Some(q)) => (b.to_uppercase(), q.to_uppercase()),
                _ => parse_symbol_pair(&symbol, exchange.symbol_format, &exchange.quote_currencies),
            };
            symbols.push(ExchangeSymbol {
                symbol,
                base_asset: base,
                quote_asset: quote,
                is_active: record
                    .get("status")
                    .and_then(Value::as_str)
                    .map(|s| s == "Trading")
                    .unwrap_or(true),
            });
        }
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::testutil::descriptor;
    use rust_decimal_macros::dec;
    use types::SymbolFormat;

    const TICKER: &str = r#"{
        "retCode": 0,
        "result": {
            "category": "spot",
            "list": [
                {"symbol": "BTCUSDT", "lastPrice": "50250.1", "volume24h": "8120.7",
                 "turnover24h": "408031455.2", "highPrice24h": "51000", "lowPrice24h": "49500"},
                {"symbol": "ZEROUSDT", "lastPrice": "0", "volume24h": "1"}
            ]
        }
    }"#;

    #[test]
    fn parses_result_list_with_24h_fields() {
        let ex = descriptor("bybit", SymbolFormat::Concatenated);
        let tickers = BybitParser.parse_tickers(TICKER.as_bytes(), &ex).unwrap();
        assert_eq!(tickers.len(), 1);

        let btc = &tickers[0];
        assert_eq!(btc.base_symbol, "BTC");
        assert_eq!(btc.quote_symbol, "USDT");
        assert_eq!(btc.price, dec!(50250.1));
        assert_eq!(btc.volume_24h, dec!(8120.7));
        assert_eq!(btc.quote_volume_24h, Some(dec!(408031455.2)));
        assert_eq!(btc.high_24h, Some(dec!(51000)));
    }

    #[test]
    fn missing_result_list_is_a_decode_error() {
        let ex = descriptor("bybit", SymbolFormat::Concatenated);
        assert!(BybitParser.parse_tickers(b"{\"retCode\": 0}", &ex).is_err());
    }

    #[test]
    fn symbols_prefer_stated_coins() {
        let ex = descriptor("bybit", SymbolFormat::Concatenated);
        let body = r#"{"result": {"list": [
            {"symbol": "BTCUSDT", "baseCoin": "BTC", "quoteCoin": "USDT", "status": "Trading"}
        ]}}"#;
        let symbols = BybitParser.parse_symbols(body.as_bytes(), &ex).unwrap();
        assert_eq!(symbols[0].base_asset, "BTC");
        assert!(symbols[0].is_active);
    }
}
