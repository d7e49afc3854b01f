//! Parser for venues that answer with an object keyed by pair symbol
//! (WhiteBIT, CoinW): `{"BTC_USDT": {"last_price": ...}, ...}`.

use serde_json::Value;

use types::{CanonicalTicker, ExchangeDescriptor, ExchangeSymbol};

use super::{decode_json, extract_record, finish_record, ResponseParser};
use crate::error::{AdapterError, Result};
use crate::symbol::parse_symbol_pair;

/// Parser for object-map ticker payloads keyed by symbol.
pub struct SymbolMapParser;

impl ResponseParser for SymbolMapParser {
    fn parse_tickers(
        &self,
        body: &[u8],
        exchange: &ExchangeDescriptor,
    ) -> Result<Vec<CanonicalTicker>> {
        let value = decode_json(body, exchange)?;
        // Some of these venues wrap the map in a "result" or "data" envelope.
        let map = value
            .as_object()
            .map(|obj| {
                obj.get("result")
                    .or_else(|| obj.get("data"))
                    .and_then(Value::as_object)
                    .unwrap_or(obj)
            })
            .ok_or_else(|| AdapterError::Decode {
                exchange: exchange.id.clone(),
                error: "expected object keyed by symbol".into(),
            })?;

        let mut tickers = Vec::with_capacity(map.len());
        for (symbol, record) in map {
            if !record.is_object() {
                // Envelope fields like "success" or "code".
                continue;
            }
            let Some(raw) = extract_record(record, Some(symbol.as_str())) else {
                continue;
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
        // Discovery reuses the ticker map: the key set is the market list.
        let tickers = self.parse_tickers(body, exchange)?;
        Ok(tickers
            .into_iter()
            .map(|t| {
                let (base, quote) = parse_symbol_pair(
                    &t.raw_symbol,
                    exchange.symbol_format,
                    &exchange.quote_currencies,
                );
                ExchangeSymbol {
                    symbol: t.raw_symbol,
                    base_asset: base,
                    quote_asset: quote,
                    is_active: true,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::testutil::descriptor;
    use rust_decimal_macros::dec;
    use types::SymbolFormat;

    const TICKER: &str = r#"{
        "BTC_USDT": {"last_price": "50100.3", "base_volume": "920.5", "quote_volume": "46117176"},
        "ETH_USDT": {"last_price": "3010.2", "base_volume": "15000"},
        "success": true
    }"#;

    #[test]
    fn parses_object_keyed_by_symbol() {
        let ex = descriptor("whitebit", SymbolFormat::UnderscoreSeparated);
        let mut tickers = SymbolMapParser.parse_tickers(TICKER.as_bytes(), &ex).unwrap();
        tickers.sort_by(|a, b| a.raw_symbol.cmp(&b.raw_symbol));

        assert_eq!(tickers.len(), 2);
        assert_eq!(tickers[0].raw_symbol, "BTC_USDT");
        assert_eq!(tickers[0].base_symbol, "BTC");
        assert_eq!(tickers[0].quote_symbol, "USDT");
        assert_eq!(tickers[0].price, dec!(50100.3));
        assert_eq!(tickers[0].volume_24h, dec!(920.5));
        assert_eq!(tickers[0].quote_volume_24h, Some(dec!(46117176)));
    }

    #[test]
    fn unwraps_result_envelope() {
        let ex = descriptor("coinw", SymbolFormat::UnderscoreSeparated);
        let body = r#"{"code": "200", "data": {
            "BTC_USDT": {"last": "49999", "vol": "12"}
        }}"#;
        let tickers = SymbolMapParser.parse_tickers(body.as_bytes(), &ex).unwrap();
        assert_eq!(tickers.len(), 1);
        assert_eq!(tickers[0].price, dec!(49999));
    }

    #[test]
    fn symbols_derive_from_keys() {
        let ex = descriptor("whitebit", SymbolFormat::UnderscoreSeparated);
        let symbols = SymbolMapParser.parse_symbols(TICKER.as_bytes(), &ex).unwrap();
        assert_eq!(symbols.len(), 2);
        assert!(symbols.iter().all(|s| s.is_active));
    }
}
