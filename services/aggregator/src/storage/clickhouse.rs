//! ClickHouse-backed time-series store.

use std::time::Duration;

use async_trait::async_trait;
use clickhouse::Client;

use super::{HealthRow, PairPriceSample, SeriesStore, StoreError, TickerRow, VwapRow};

/// [`SeriesStore`] over the columnar schema in `sql/clickhouse_schema.sql`.
pub struct ClickHouseSeriesStore {
    client: Client,
}

impl ClickHouseSeriesStore {
    /// Build a store from connection settings.
    pub fn new(url: &str, database: &str, user: &str, password: &str) -> Self {
        let client = Client::default()
            .with_url(url)
            .with_database(database)
            .with_user(user)
            .with_password(password);
        Self { client }
    }

    async fn write_rows<T>(&self, table: &str, rows: &[T]) -> Result<(), StoreError>
    where
        T: for<'a> clickhouse::Row<Value<'a> = T> + serde::Serialize,
    {
        if rows.is_empty() {
            return Ok(());
        }
        let mut insert: clickhouse::insert::Insert<T> = self.client.insert(table).await?;
        for row in rows {
            insert.write(row).await?;
        }
        insert.end().await?;
        Ok(())
    }
}

#[async_trait]
impl SeriesStore for ClickHouseSeriesStore {
    async fn write_tickers(&self, rows: &[TickerRow]) -> Result<(), StoreError> {
        self.write_rows("price_tickers", rows).await
    }

    async fn write_vwap(&self, rows: &[VwapRow]) -> Result<(), StoreError> {
        self.write_rows("vwap_prices", rows).await
    }

    async fn write_health(&self, rows: &[HealthRow]) -> Result<(), StoreError> {
        self.write_rows("exchange_health", rows).await
    }

    async fn latest_pair_prices(
        &self,
        window: Duration,
    ) -> Result<Vec<PairPriceSample>, StoreError> {
        let samples = self
            .client
            .query(
                "SELECT exchange_id, base_token_id, quote_token_id,
                        argMax(price, timestamp) AS price
                 FROM price_tickers
                 WHERE timestamp >= subtractSeconds(now(), ?)
                   AND base_token_id > 0 AND quote_token_id > 0
                 GROUP BY exchange_id, base_token_id, quote_token_id",
            )
            .bind(window.as_secs())
            .fetch_all::<PairPriceSample>()
            .await?;
        Ok(samples)
    }
}
