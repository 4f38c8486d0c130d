use crate::database::models::{Bar, JoinPair, JoinedRow};
use crate::error::StoreError;
use async_trait::async_trait;

/// Persistence seam for per-symbol series and the joined collection.
///
/// Series are upsert-only: writing a bar whose timestamp already exists in
/// the symbol's collection overwrites it in place. Bars are never deleted.
/// The joined collection is only ever replaced wholesale.
#[async_trait]
pub trait SeriesStore: Send + Sync {
    /// Insert or overwrite `bars` in the symbol's collection, creating it on
    /// first use. Returns the number of bars written.
    async fn upsert_bars(&self, symbol: &str, bars: &[Bar]) -> Result<usize, StoreError>;

    /// All bars for `symbol` ordered by timestamp; empty if never ingested.
    async fn load_series(&self, symbol: &str) -> Result<Vec<Bar>, StoreError>;

    /// Number of stored bars for `symbol`; zero if never ingested.
    async fn count_bars(&self, symbol: &str) -> Result<u64, StoreError>;

    /// Drop whatever the joined collection held and store `rows` instead.
    async fn replace_joined(&self, pair: &JoinPair, rows: &[JoinedRow]) -> Result<usize, StoreError>;

    /// The joined collection ordered by timestamp; empty if it was never
    /// built or was last built for a different pair.
    async fn load_joined(&self, pair: &JoinPair) -> Result<Vec<JoinedRow>, StoreError>;
}
