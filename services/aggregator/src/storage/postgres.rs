//! Postgres-backed token store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPool;
use sqlx::Row;

use types::{
    ExchangeId, MappingMethod, PriceOutlier, SymbolMapping, Token, TradingPairMapping,
};

use super::{StoreError, TokenStore};

/// [`TokenStore`] over the relational schema in `sql/postgres_schema.sql`.
pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    /// Wrap an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_method(raw: &str) -> Result<MappingMethod, StoreError> {
    raw.parse()
        .map_err(|_| StoreError::Corrupt(format!("mapping_method: {raw}")))
}

fn metadata_map(value: Option<serde_json::Value>) -> HashMap<String, String> {
    value
        .and_then(|v| v.as_object().cloned())
        .map(|obj| {
            obj.into_iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn load_tokens(&self) -> Result<Vec<Token>, StoreError> {
        let rows = sqlx::query(
            "SELECT token_id, symbol, name, categories, metadata, is_active
             FROM tokens WHERE is_active",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(Token {
                    token_id: row.try_get::<i32, _>("token_id")? as u32,
                    symbol: row.try_get("symbol")?,
                    name: row.try_get("name")?,
                    categories: row
                        .try_get::<Option<Vec<String>>, _>("categories")?
                        .unwrap_or_default(),
                    metadata: metadata_map(row.try_get("metadata")?),
                    is_active: row.try_get("is_active")?,
                })
            })
            .collect()
    }

    async fn load_symbol_mappings(&self) -> Result<Vec<SymbolMapping>, StoreError> {
        let rows = sqlx::query(
            "SELECT token_id, exchange_id, exchange_symbol, normalized_symbol,
                    mapping_method, confidence_score, needs_verification,
                    verified_by, verified_at
             FROM token_exchange_symbols",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let method: String = row.try_get("mapping_method")?;
                Ok(SymbolMapping {
                    token_id: row.try_get::<i32, _>("token_id")? as u32,
                    exchange_id: ExchangeId::new(row.try_get::<String, _>("exchange_id")?),
                    exchange_symbol: row.try_get("exchange_symbol")?,
                    normalized_symbol: row.try_get("normalized_symbol")?,
                    mapping_method: parse_method(&method)?,
                    confidence_score: row.try_get::<Decimal, _>("confidence_score")?,
                    needs_verification: row.try_get("needs_verification")?,
                    verified_by: row.try_get("verified_by")?,
                    verified_at: row.try_get::<Option<DateTime<Utc>>, _>("verified_at")?,
                })
            })
            .collect()
    }

    async fn load_pair_mappings(&self) -> Result<Vec<TradingPairMapping>, StoreError> {
        let rows = sqlx::query(
            "SELECT base_token_id, quote_token_id, exchange_id, exchange_pair_symbol,
                    mapping_method, confidence_score, needs_verification, last_volume_24h
             FROM trading_pairs",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let method: String = row.try_get("mapping_method")?;
                Ok(TradingPairMapping {
                    base_token_id: row.try_get::<i32, _>("base_token_id")? as u32,
                    quote_token_id: row.try_get::<i32, _>("quote_token_id")? as u32,
                    exchange_id: ExchangeId::new(row.try_get::<String, _>("exchange_id")?),
                    exchange_pair_symbol: row.try_get("exchange_pair_symbol")?,
                    mapping_method: parse_method(&method)?,
                    confidence_score: row.try_get::<Decimal, _>("confidence_score")?,
                    needs_verification: row.try_get("needs_verification")?,
                    last_volume_24h: row.try_get::<Option<Decimal>, _>("last_volume_24h")?,
                })
            })
            .collect()
    }

    async fn upsert_symbol_mapping(&self, mapping: &SymbolMapping) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO token_exchange_symbols
                 (token_id, exchange_id, exchange_symbol, normalized_symbol,
                  mapping_method, confidence_score, needs_verification)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (exchange_id, exchange_symbol) DO UPDATE SET
                 token_id = EXCLUDED.token_id,
                 normalized_symbol = EXCLUDED.normalized_symbol,
                 mapping_method = EXCLUDED.mapping_method,
                 confidence_score = EXCLUDED.confidence_score,
                 needs_verification = EXCLUDED.needs_verification",
        )
        .bind(mapping.token_id as i32)
        .bind(mapping.exchange_id.as_str())
        .bind(&mapping.exchange_symbol)
        .bind(&mapping.normalized_symbol)
        .bind(mapping.mapping_method.as_str())
        .bind(mapping.confidence_score)
        .bind(mapping.needs_verification)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_pair_mapping(&self, mapping: &TradingPairMapping) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO trading_pairs
                 (base_token_id, quote_token_id, exchange_id, exchange_pair_symbol,
                  mapping_method, confidence_score, needs_verification, last_volume_24h)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (exchange_id, exchange_pair_symbol) DO UPDATE SET
                 base_token_id = EXCLUDED.base_token_id,
                 quote_token_id = EXCLUDED.quote_token_id,
                 mapping_method = EXCLUDED.mapping_method,
                 confidence_score = EXCLUDED.confidence_score,
                 needs_verification = EXCLUDED.needs_verification,
                 last_volume_24h = COALESCE(EXCLUDED.last_volume_24h, trading_pairs.last_volume_24h)",
        )
        .bind(mapping.base_token_id as i32)
        .bind(mapping.quote_token_id as i32)
        .bind(mapping.exchange_id.as_str())
        .bind(&mapping.exchange_pair_symbol)
        .bind(mapping.mapping_method.as_str())
        .bind(mapping.confidence_score)
        .bind(mapping.needs_verification)
        .bind(mapping.last_volume_24h)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_outlier(&self, outlier: &PriceOutlier) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO price_outliers
                 (exchange_id, base_token_id, quote_token_id, exchange_price,
                  average_price, deviation_percent, standard_deviations,
                  mapping_method, is_resolved, detected_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(outlier.exchange_id.as_str())
        .bind(outlier.base_token_id as i32)
        .bind(outlier.quote_token_id as i32)
        .bind(outlier.exchange_price)
        .bind(outlier.average_price)
        .bind(outlier.deviation_percent)
        .bind(outlier.std_deviations)
        .bind(outlier.mapping_method.as_str())
        .bind(outlier.is_resolved)
        .bind(outlier.detected_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
