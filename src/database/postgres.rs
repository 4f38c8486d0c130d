use crate::config::DatabaseConfig;
use crate::database::models::{Bar, JoinPair, JoinedRow};
use crate::database::schema::{self, series_collection, JOINED_COLLECTION};
use crate::database::store::SeriesStore;
use crate::error::StoreError;
use crate::utils::timestamp::{format_timestamp, parse_timestamp};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use tracing::{debug, info, instrument, warn};

pub struct PostgresManager {
    pool: PgPool,
}

impl PostgresManager {
    pub async fn new(
        host: &str,
        port: u16,
        user: &str,
        password: &str,
        dbname: &str,
        max_connections: usize,
    ) -> Result<Self> {
        let connection_string = format!(
            "postgres://{}:{}@{}:{}/{}",
            user, password, host, port, dbname
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections as u32)
            .connect(&connection_string)
            .await
            .context("Failed to create database connection pool")?;

        info!("Connected to PostgreSQL at {}:{}/{}", host, port, dbname);
        Ok(Self { pool })
    }

    pub async fn from_config(cfg: &DatabaseConfig) -> Result<Self> {
        Self::new(
            &cfg.host,
            cfg.port,
            &cfg.user,
            &cfg.password,
            &cfg.name,
            cfg.max_connections,
        )
        .await
    }

    async fn table_exists(&self, table: &str) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(schema::table_exists_sql())
            .bind(table)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    // Create the per-symbol table on first ingestion
    async fn ensure_series_table(&self, table: &str) -> Result<(), StoreError> {
        sqlx::query(&schema::create_series_table_sql(table))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn decode_timestamp(collection: &str, value: String) -> Result<NaiveDateTime, StoreError> {
    parse_timestamp(&value).map_err(|_| StoreError::MalformedTimestamp {
        collection: collection.to_string(),
        value,
    })
}

#[async_trait]
impl SeriesStore for PostgresManager {
    #[instrument(skip(self, bars), fields(count = bars.len()))]
    async fn upsert_bars(&self, symbol: &str, bars: &[Bar]) -> Result<usize, StoreError> {
        let table = series_collection(symbol)?;
        if bars.is_empty() {
            return Ok(0);
        }

        self.ensure_series_table(&table).await?;
        let sql = schema::upsert_bar_sql(&table);

        // One transaction per batch
        let mut tx = self.pool.begin().await?;
        for bar in bars {
            sqlx::query(&sql)
                .bind(format_timestamp(&bar.timestamp))
                .bind(bar.open)
                .bind(bar.high)
                .bind(bar.low)
                .bind(bar.close)
                .bind(bar.volume)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        debug!("Upserted {} bars into {}", bars.len(), table);
        Ok(bars.len())
    }

    async fn load_series(&self, symbol: &str) -> Result<Vec<Bar>, StoreError> {
        let table = series_collection(symbol)?;
        if !self.table_exists(&table).await? {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&schema::select_series_sql(&table))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| -> Result<Bar, StoreError> {
                Ok(Bar {
                    timestamp: decode_timestamp(&table, row.try_get("timestamp")?)?,
                    open: row.try_get("open")?,
                    high: row.try_get("high")?,
                    low: row.try_get("low")?,
                    close: row.try_get("close")?,
                    volume: row.try_get("volume")?,
                })
            })
            .collect()
    }

    async fn count_bars(&self, symbol: &str) -> Result<u64, StoreError> {
        let table = series_collection(symbol)?;
        if !self.table_exists(&table).await? {
            return Ok(0);
        }

        let count: i64 = sqlx::query_scalar(&schema::count_sql(&table))
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    #[instrument(skip(self, rows), fields(count = rows.len()))]
    async fn replace_joined(&self, pair: &JoinPair, rows: &[JoinedRow]) -> Result<usize, StoreError> {
        let insert = schema::insert_joined_sql(pair);

        // Readers see either the previous collection or the complete new one
        let mut tx = self.pool.begin().await?;
        sqlx::query(&schema::drop_joined_table_sql())
            .execute(&mut *tx)
            .await?;
        sqlx::query(&schema::create_joined_table_sql(pair))
            .execute(&mut *tx)
            .await?;

        for row in rows {
            sqlx::query(&insert)
                .bind(format_timestamp(&row.timestamp))
                .bind(row.left_close)
                .bind(row.right_close)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        info!("Rebuilt {} with {} rows", JOINED_COLLECTION, rows.len());
        Ok(rows.len())
    }

    async fn load_joined(&self, pair: &JoinPair) -> Result<Vec<JoinedRow>, StoreError> {
        let columns: Vec<String> = sqlx::query_scalar(schema::table_columns_sql())
            .bind(JOINED_COLLECTION)
            .fetch_all(&self.pool)
            .await?;
        if columns.is_empty() {
            return Ok(Vec::new());
        }

        // A collection built for another pair has different close columns
        let has = |name: &str| columns.iter().any(|c| c == name);
        if !has(pair.left_column()) || !has(pair.right_column()) {
            warn!(
                "{} was built for another pair, expected columns {} and {}",
                JOINED_COLLECTION,
                pair.left_column(),
                pair.right_column()
            );
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&schema::select_joined_sql(pair))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| -> Result<JoinedRow, StoreError> {
                Ok(JoinedRow {
                    timestamp: decode_timestamp(JOINED_COLLECTION, row.try_get("timestamp")?)?,
                    left_close: row.try_get(pair.left_column())?,
                    right_close: row.try_get(pair.right_column())?,
                })
            })
            .collect()
    }
}
