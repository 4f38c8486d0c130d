use crate::database::schema::{close_column, validate_symbol};
use crate::error::StoreError;
use crate::utils::timestamp::serde_timestamp;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One instrument, one calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Midnight of the trading date, the upsert key within a series
    #[serde(with = "serde_timestamp")]
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

/// Closing prices of two series aligned on one timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRow {
    pub timestamp: NaiveDateTime,
    pub left_close: f64,
    pub right_close: f64,
}

/// The ordered pair of symbols feeding the joined collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinPair {
    left: String,
    right: String,
    left_column: String,
    right_column: String,
}

impl JoinPair {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Result<Self, StoreError> {
        let left = left.into();
        let right = right.into();
        validate_symbol(&left)?;
        validate_symbol(&right)?;

        let left_column = close_column(&left)?;
        let right_column = close_column(&right)?;
        if left_column == right_column {
            return Err(StoreError::ColumnClash {
                left,
                right,
                column: left_column,
            });
        }

        Ok(Self {
            left,
            right,
            left_column,
            right_column,
        })
    }

    pub fn left(&self) -> &str {
        &self.left
    }

    pub fn right(&self) -> &str {
        &self.right
    }

    /// Side-qualified close column for the left symbol, e.g. `close_xom`
    pub fn left_column(&self) -> &str {
        &self.left_column
    }

    pub fn right_column(&self) -> &str {
        &self.right_column
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_pair_derives_side_qualified_columns() {
        let pair = JoinPair::new("XOM", "CL=F").unwrap();
        assert_eq!(pair.left_column(), "close_xom");
        assert_eq!(pair.right_column(), "close_clf");
    }

    #[test]
    fn join_pair_rejects_symbols_sharing_a_column() {
        let err = JoinPair::new("BRK.B", "brkb").unwrap_err();
        assert!(matches!(err, StoreError::ColumnClash { ref column, .. } if column == "close_brkb"));
    }

    #[test]
    fn bar_serializes_timestamp_as_fixed_string() {
        let bar = Bar {
            timestamp: crate::utils::timestamp::parse_timestamp("2024-01-01 00:00:00").unwrap(),
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
            volume: 42,
        };
        let json = serde_json::to_value(&bar).unwrap();
        assert_eq!(json["timestamp"], "2024-01-01 00:00:00");
        assert_eq!(json["volume"], 42);

        let back: Bar = serde_json::from_value(json).unwrap();
        assert_eq!(back, bar);
    }
}
