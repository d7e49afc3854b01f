//! Long-tail parser: probes common payload shapes, then scans the ordered
//! field-candidate lists for every record. New venues should be tried
//! against this parser before anyone writes a dedicated one.

use serde_json::Value;

use types::{CanonicalTicker, ExchangeDescriptor, ExchangeSymbol};

use super::{decode_json, extract_record, finish_record, RawRecord, ResponseParser};
use crate::error::{AdapterError, Result};
use crate::symbol::parse_symbol_pair;

/// Envelope fields probed, in order, for a ticker array.
const ARRAY_FIELDS: [&str; 4] = ["data", "result", "tickers", "ticker"];

/// Shape-probing parser for venues without a dedicated implementation.
pub struct UnifiedParser;

impl UnifiedParser {
    /// Reduce the payload to raw records, whatever the envelope looks like:
    /// top-level array, array under a known envelope field, or an object
    /// keyed by symbol.
    fn collect_records(value: &Value) -> Option<Vec<RawRecord>> {
        if let Some(items) = value.as_array() {
            return Some(Self::from_array(items));
        }

        let obj = value.as_object()?;
        for field in ARRAY_FIELDS {
            if let Some(items) = obj.get(field).and_then(Value::as_array) {
                return Some(Self::from_array(items));
            }
        }

        // Object keyed by symbol: keep entries whose value looks like a
        // ticker record, skip envelope scalars ("code", "success", ...).
        let mut records = Vec::new();
        for (key, record) in obj {
            if !record.is_object() {
                continue;
            }
            if let Some(raw) = extract_record(record, Some(key.as_str())) {
                records.push(raw);
            }
        }
        if records.is_empty() {
            None
        } else {
            Some(records)
        }
    }

    fn from_array(items: &[Value]) -> Vec<RawRecord> {
        items
            .iter()
            .filter_map(|record| extract_record(record, None))
            .collect()
    }
}

impl ResponseParser for UnifiedParser {
    fn parse_tickers(
        &self,
        body: &[u8],
        exchange: &ExchangeDescriptor,
    ) -> Result<Vec<CanonicalTicker>> {
        let value = decode_json(body, exchange)?;
        let records = Self::collect_records(&value).ok_or_else(|| AdapterError::Decode {
            exchange: exchange.id.clone(),
            error: "no recognizable ticker shape in payload".into(),
        })?;
        Ok(records
            .into_iter()
            .map(|raw| finish_record(raw, exchange))
            .collect())
    }

    fn parse_symbols(
        &self,
        body: &[u8],
        exchange: &ExchangeDescriptor,
    ) -> Result<Vec<ExchangeSymbol>> {
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

    fn ex() -> types::ExchangeDescriptor {
        descriptor("somedex", SymbolFormat::Concatenated)
    }

    #[test]
    fn probes_top_level_array() {
        let body = r#"[{"ticker_id": "BTCUSDT", "last": "50000", "vol24h": "10"}]"#;
        let tickers = UnifiedParser.parse_tickers(body.as_bytes(), &ex()).unwrap();
        assert_eq!(tickers.len(), 1);
        assert_eq!(tickers[0].raw_symbol, "BTCUSDT");
        assert_eq!(tickers[0].volume_24h, dec!(10));
    }

    #[test]
    fn probes_envelope_fields_in_order() {
        for field in ["data", "result", "tickers", "ticker"] {
            let body = format!(
                r#"{{"{field}": [{{"pair": "ETHUSDT", "close": "3000", "baseVolume": "5"}}]}}"#
            );
            let tickers = UnifiedParser.parse_tickers(body.as_bytes(), &ex()).unwrap();
            assert_eq!(tickers.len(), 1, "envelope field {field}");
            assert_eq!(tickers[0].base_symbol, "ETH");
        }
    }

    #[test]
    fn falls_back_to_object_keyed_by_symbol() {
        let body = r#"{
            "code": 0,
            "BTCUSDT": {"price": "50000", "volume": "3"},
            "ETHUSDT": {"price": "3000", "volume": "4"}
        }"#;
        let mut tickers = UnifiedParser.parse_tickers(body.as_bytes(), &ex()).unwrap();
        tickers.sort_by(|a, b| a.raw_symbol.cmp(&b.raw_symbol));
        assert_eq!(tickers.len(), 2);
        assert_eq!(tickers[0].raw_symbol, "BTCUSDT");
    }

    #[test]
    fn candidate_scan_uses_first_positive_price() {
        // "last" is zero and must be passed over for "price".
        let body = r#"[{"symbol": "SOLUSDT", "last": "0", "price": "150.5", "volume": "42"}]"#;
        let tickers = UnifiedParser.parse_tickers(body.as_bytes(), &ex()).unwrap();
        assert_eq!(tickers[0].price, dec!(150.5));
    }

    #[test]
    fn instid_and_alternate_symbol_spellings_work() {
        let body = r#"[{"instId": "BTC-USDT", "last": "50000", "volCcy": "100000"}]"#;
        let ex = descriptor("somedex", SymbolFormat::DashSeparated);
        let tickers = UnifiedParser.parse_tickers(body.as_bytes(), &ex).unwrap();
        assert_eq!(tickers[0].base_symbol, "BTC");
        assert_eq!(tickers[0].quote_volume_24h, Some(dec!(100000)));
    }

    #[test]
    fn unrecognizable_shape_is_a_decode_error() {
        let body = r#"{"status": "maintenance"}"#;
        assert!(UnifiedParser.parse_tickers(body.as_bytes(), &ex()).is_err());
    }
}
