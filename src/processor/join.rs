use crate::context::AppContext;
use crate::database::models::{Bar, JoinPair, JoinedRow};
use crate::error::JoinError;
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, HashMap};
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinReport {
    pub left_rows: usize,
    pub right_rows: usize,
    pub joined_rows: usize,
}

/// Inner join of two series on timestamp, keeping only the close prices.
///
/// Output is ordered by timestamp. A timestamp repeated within one side
/// resolves to its last occurrence, mirroring upsert semantics.
pub fn inner_join(left: &[Bar], right: &[Bar]) -> Vec<JoinedRow> {
    if left.is_empty() || right.is_empty() {
        return Vec::new();
    }

    let right_close: HashMap<NaiveDateTime, f64> =
        right.iter().map(|bar| (bar.timestamp, bar.close)).collect();
    let left_close: BTreeMap<NaiveDateTime, f64> =
        left.iter().map(|bar| (bar.timestamp, bar.close)).collect();

    left_close
        .into_iter()
        .filter_map(|(timestamp, left_close)| {
            right_close.get(&timestamp).map(|&right_close| JoinedRow {
                timestamp,
                left_close,
                right_close,
            })
        })
        .collect()
}

async fn load_side(ctx: &AppContext, symbol: &str) -> Result<Vec<Bar>, JoinError> {
    ctx.store
        .load_series(symbol)
        .await
        .map_err(|source| JoinError::Load {
            symbol: symbol.to_string(),
            source,
        })
}

/// Rebuild the joined collection from the current contents of both series
#[instrument(skip(ctx))]
pub async fn rebuild_joined(ctx: &AppContext, pair: &JoinPair) -> Result<JoinReport, JoinError> {
    let left = load_side(ctx, pair.left()).await?;
    let right = load_side(ctx, pair.right()).await?;

    let rows = inner_join(&left, &right);
    ctx.store
        .replace_joined(pair, &rows)
        .await
        .map_err(JoinError::Write)?;

    let report = JoinReport {
        left_rows: left.len(),
        right_rows: right.len(),
        joined_rows: rows.len(),
    };

    info!(
        "Joined {} ({} rows) with {} ({} rows): {} aligned days",
        pair.left(),
        report.left_rows,
        pair.right(),
        report.right_rows,
        report.joined_rows
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::timestamp::parse_timestamp;

    fn bar(ts: &str, close: f64) -> Bar {
        Bar {
            timestamp: parse_timestamp(ts).unwrap(),
            open: 0.0,
            high: 0.0,
            low: 0.0,
            close,
            volume: 1,
        }
    }

    #[test]
    fn keeps_only_shared_timestamps() {
        let aaa = vec![bar("2024-01-01 00:00:00", 10.0), bar("2024-01-02 00:00:00", 11.0)];
        let bbb = vec![bar("2024-01-01 00:00:00", 20.0)];

        let rows = inner_join(&aaa, &bbb);
        assert_eq!(
            rows,
            vec![JoinedRow {
                timestamp: parse_timestamp("2024-01-01 00:00:00").unwrap(),
                left_close: 10.0,
                right_close: 20.0,
            }]
        );
    }

    #[test]
    fn empty_side_yields_empty_join() {
        let aaa = vec![bar("2024-01-01 00:00:00", 10.0)];
        assert!(inner_join(&aaa, &[]).is_empty());
        assert!(inner_join(&[], &aaa).is_empty());
    }

    #[test]
    fn output_is_ordered_regardless_of_input_order() {
        let left = vec![
            bar("2024-01-03 00:00:00", 3.0),
            bar("2024-01-01 00:00:00", 1.0),
            bar("2024-01-02 00:00:00", 2.0),
        ];
        let right = vec![
            bar("2024-01-02 00:00:00", 20.0),
            bar("2024-01-03 00:00:00", 30.0),
            bar("2024-01-01 00:00:00", 10.0),
        ];

        let closes: Vec<(f64, f64)> = inner_join(&left, &right)
            .into_iter()
            .map(|r| (r.left_close, r.right_close))
            .collect();
        assert_eq!(closes, vec![(1.0, 10.0), (2.0, 20.0), (3.0, 30.0)]);
    }

    #[test]
    fn repeated_timestamp_uses_last_value() {
        let left = vec![bar("2024-01-01 00:00:00", 1.0), bar("2024-01-01 00:00:00", 2.0)];
        let right = vec![bar("2024-01-01 00:00:00", 5.0)];

        let rows = inner_join(&left, &right);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].left_close, 2.0);
    }
}
