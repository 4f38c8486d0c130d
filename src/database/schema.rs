// Collection naming and SQL generation for the per-symbol and joined tables.
// Table and column names are derived from ticker symbols (e.g. "CL=F"), so
// every identifier is quoted.

use crate::database::models::JoinPair;
use crate::error::StoreError;

pub const SERIES_PREFIX: &str = "stock_data_";
pub const JOINED_COLLECTION: &str = "viz_query_for_stock_data";

// PostgreSQL NAMEDATALEN - 1
const MAX_IDENTIFIER_LEN: usize = 63;

pub fn validate_symbol(symbol: &str) -> Result<(), StoreError> {
    let invalid = |reason| StoreError::InvalidSymbol {
        symbol: symbol.to_string(),
        reason,
    };

    if symbol.is_empty() {
        return Err(invalid("empty"));
    }
    if symbol.trim() != symbol {
        return Err(invalid("surrounding whitespace"));
    }
    if symbol.chars().any(|c| c.is_control() || c == '"') {
        return Err(invalid("control character or double quote"));
    }
    if !symbol.chars().any(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid("no alphanumeric character"));
    }
    if SERIES_PREFIX.len() + symbol.len() > MAX_IDENTIFIER_LEN {
        return Err(invalid("too long for a table name"));
    }
    Ok(())
}

/// `stock_data_<SYMBOL>`
pub fn series_collection(symbol: &str) -> Result<String, StoreError> {
    validate_symbol(symbol)?;
    Ok(format!("{}{}", SERIES_PREFIX, symbol))
}

/// `close_<symbol>` lower-cased with non-alphanumerics dropped
pub fn close_column(symbol: &str) -> Result<String, StoreError> {
    validate_symbol(symbol)?;
    let suffix: String = symbol
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    Ok(format!("close_{}", suffix))
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn table_exists_sql() -> &'static str {
    "SELECT EXISTS (
        SELECT 1 FROM information_schema.tables
        WHERE table_schema = current_schema() AND table_name = $1
    )"
}

/// Column names of table `$1`; no rows when the table does not exist
pub fn table_columns_sql() -> &'static str {
    "SELECT column_name::TEXT FROM information_schema.columns
     WHERE table_schema = current_schema() AND table_name = $1"
}

pub fn create_series_table_sql(table: &str) -> String {
    format!(
        r#"CREATE TABLE IF NOT EXISTS {} (
    "timestamp" TEXT PRIMARY KEY,
    open DOUBLE PRECISION NOT NULL,
    high DOUBLE PRECISION NOT NULL,
    low DOUBLE PRECISION NOT NULL,
    close DOUBLE PRECISION NOT NULL,
    volume BIGINT NOT NULL
)"#,
        quote_ident(table)
    )
}

pub fn upsert_bar_sql(table: &str) -> String {
    format!(
        r#"INSERT INTO {} ("timestamp", open, high, low, close, volume)
VALUES ($1, $2, $3, $4, $5, $6)
ON CONFLICT ("timestamp") DO UPDATE SET
    open = EXCLUDED.open,
    high = EXCLUDED.high,
    low = EXCLUDED.low,
    close = EXCLUDED.close,
    volume = EXCLUDED.volume"#,
        quote_ident(table)
    )
}

pub fn select_series_sql(table: &str) -> String {
    format!(
        r#"SELECT "timestamp", open, high, low, close, volume FROM {} ORDER BY "timestamp" ASC"#,
        quote_ident(table)
    )
}

pub fn count_sql(table: &str) -> String {
    format!("SELECT COUNT(*) FROM {}", quote_ident(table))
}

pub fn drop_joined_table_sql() -> String {
    format!("DROP TABLE IF EXISTS {}", quote_ident(JOINED_COLLECTION))
}

pub fn create_joined_table_sql(pair: &JoinPair) -> String {
    format!(
        r#"CREATE TABLE {} (
    "timestamp" TEXT PRIMARY KEY,
    {} DOUBLE PRECISION NOT NULL,
    {} DOUBLE PRECISION NOT NULL
)"#,
        quote_ident(JOINED_COLLECTION),
        quote_ident(pair.left_column()),
        quote_ident(pair.right_column())
    )
}

pub fn insert_joined_sql(pair: &JoinPair) -> String {
    format!(
        r#"INSERT INTO {} ("timestamp", {}, {}) VALUES ($1, $2, $3)"#,
        quote_ident(JOINED_COLLECTION),
        quote_ident(pair.left_column()),
        quote_ident(pair.right_column())
    )
}

pub fn select_joined_sql(pair: &JoinPair) -> String {
    format!(
        r#"SELECT "timestamp", {}, {} FROM {} ORDER BY "timestamp" ASC"#,
        quote_ident(pair.left_column()),
        quote_ident(pair.right_column()),
        quote_ident(JOINED_COLLECTION)
    )
}
