// src/context.rs
use crate::chart::ChartRenderer;
use crate::config::AppConfig;
use crate::database::models::JoinPair;
use crate::database::postgres::PostgresManager;
use crate::database::store::SeriesStore;
use crate::error::StoreError;
use crate::provider::yahoo::YahooClient;
use crate::provider::MarketDataProvider;
use anyhow::{Context, Result};
use std::sync::Arc;

/// Everything an ingestion, join or HTTP request needs, passed explicitly
pub struct AppContext {
    pub config: AppConfig,
    pub store: Arc<dyn SeriesStore>,
    pub provider: Arc<dyn MarketDataProvider>,
    pub chart: ChartRenderer,
}

impl AppContext {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn SeriesStore>,
        provider: Arc<dyn MarketDataProvider>,
    ) -> Self {
        let chart = ChartRenderer::new(&config.chart);
        Self {
            config,
            store,
            provider,
            chart,
        }
    }

    /// Connect to PostgreSQL and build the Yahoo client from `config`
    pub async fn connect(config: AppConfig) -> Result<Self> {
        let store = PostgresManager::from_config(&config.database).await?;
        let provider = YahooClient::new(&config.provider).context("Failed to build market data client")?;

        Ok(Self::new(config, Arc::new(store), Arc::new(provider)))
    }

    /// The configured pair feeding the joined collection
    pub fn join_pair(&self) -> Result<JoinPair, StoreError> {
        JoinPair::new(&self.config.join.left, &self.config.join.right)
    }
}
