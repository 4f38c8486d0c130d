#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use stock_data_viz::config::AppConfig;
use stock_data_viz::context::AppContext;
use stock_data_viz::database::memory::MemoryStore;
use stock_data_viz::error::ProviderError;
use stock_data_viz::provider::{DailyRecord, MarketDataProvider};

/// Provider double serving canned histories; unknown symbols fail like an
/// upstream "not found".
#[derive(Default)]
pub struct StubProvider {
    histories: Mutex<HashMap<String, Vec<DailyRecord>>>,
}

impl StubProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, symbol: &str, records: Vec<DailyRecord>) {
        self.histories.lock().insert(symbol.to_string(), records);
    }
}

#[async_trait]
impl MarketDataProvider for StubProvider {
    async fn fetch_daily_history(&self, symbol: &str) -> Result<Vec<DailyRecord>, ProviderError> {
        self.histories
            .lock()
            .get(symbol)
            .cloned()
            .ok_or_else(|| ProviderError::Api {
                symbol: symbol.to_string(),
                code: "Not Found".to_string(),
                description: "No data found, symbol may be delisted".to_string(),
            })
    }
}

pub struct Harness {
    pub ctx: Arc<AppContext>,
    pub store: Arc<MemoryStore>,
    pub provider: Arc<StubProvider>,
}

pub fn harness(left: &str, right: &str) -> Harness {
    let mut config = AppConfig::default();
    config.join.left = left.to_string();
    config.join.right = right.to_string();
    config.ingest.symbols = vec![left.to_string(), right.to_string()];
    config.ingest.batch_size = 2;
    config.chart.width = 160;
    config.chart.height = 120;
    config.chart.font_path = None;

    let store = Arc::new(MemoryStore::new());
    let provider = Arc::new(StubProvider::new());
    let ctx = Arc::new(AppContext::new(config, store.clone(), provider.clone()));

    Harness { ctx, store, provider }
}

pub fn record(y: i32, m: u32, d: u32, close: f64) -> DailyRecord {
    DailyRecord {
        date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
        open: close - 0.5,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume: 1_000,
    }
}
