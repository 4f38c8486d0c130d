use crate::database::models::{Bar, JoinPair, JoinedRow};
use crate::database::schema::series_collection;
use crate::database::store::SeriesStore;
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Process-local store with the same upsert and rebuild semantics as the
/// PostgreSQL backend. Used for dry runs and as a test double.
#[derive(Default)]
pub struct MemoryStore {
    series: RwLock<HashMap<String, BTreeMap<NaiveDateTime, Bar>>>,
    joined: RwLock<Option<(JoinPair, Vec<JoinedRow>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all collections created so far, sorted
    pub fn collections(&self) -> Vec<String> {
        let series = self.series.read();
        let mut names: Vec<String> = series.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl SeriesStore for MemoryStore {
    async fn upsert_bars(&self, symbol: &str, bars: &[Bar]) -> Result<usize, StoreError> {
        let collection = series_collection(symbol)?;
        let mut series = self.series.write();
        let rows = series.entry(collection).or_default();

        for bar in bars {
            rows.insert(bar.timestamp, bar.clone());
        }

        debug!("Upserted {} bars for {} ({} stored)", bars.len(), symbol, rows.len());
        Ok(bars.len())
    }

    async fn load_series(&self, symbol: &str) -> Result<Vec<Bar>, StoreError> {
        let collection = series_collection(symbol)?;
        let series = self.series.read();
        Ok(series
            .get(&collection)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn count_bars(&self, symbol: &str) -> Result<u64, StoreError> {
        let collection = series_collection(symbol)?;
        let series = self.series.read();
        Ok(series.get(&collection).map_or(0, |rows| rows.len() as u64))
    }

    async fn replace_joined(&self, pair: &JoinPair, rows: &[JoinedRow]) -> Result<usize, StoreError> {
        *self.joined.write() = Some((pair.clone(), rows.to_vec()));
        Ok(rows.len())
    }

    async fn load_joined(&self, pair: &JoinPair) -> Result<Vec<JoinedRow>, StoreError> {
        let joined = self.joined.read();
        match joined.as_ref() {
            // A collection built for another pair has different columns
            Some((stored, rows)) if stored == pair => Ok(rows.clone()),
            _ => Ok(Vec::new()),
        }
    }
}
