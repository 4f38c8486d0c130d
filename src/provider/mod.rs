pub mod yahoo;

use crate::error::ProviderError;
use async_trait::async_trait;
use chrono::NaiveDate;

/// One raw daily record as delivered by the provider, prices unrounded
#[derive(Debug, Clone, PartialEq)]
pub struct DailyRecord {
    /// Exchange-local trading date
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

/// Source of daily price history
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Full available daily history for `symbol`, oldest first
    async fn fetch_daily_history(&self, symbol: &str) -> Result<Vec<DailyRecord>, ProviderError>;
}
