// src/error.rs
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Failures talking to the market data provider
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider rejected request for {symbol}: {code}: {description}")]
    Api {
        symbol: String,
        code: String,
        description: String,
    },

    #[error("no data returned for {0}")]
    NoData(String),

    #[error("malformed response for {symbol}: {reason}")]
    Malformed { symbol: String, reason: String },

    #[error("invalid provider URL: {0}")]
    Url(String),
}

/// Failures reading or writing persisted collections
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid symbol {symbol:?}: {reason}")]
    InvalidSymbol { symbol: String, reason: &'static str },

    #[error("symbols {left:?} and {right:?} both map to column {column:?}")]
    ColumnClash {
        left: String,
        right: String,
        column: String,
    },

    #[error("malformed timestamp {value:?} in {collection}")]
    MalformedTimestamp { collection: String, value: String },
}

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("no rows to plot")]
    EmptySeries,

    #[error("drawing failed: {0}")]
    Drawing(String),

    #[error("invalid raster size {width}x{height}")]
    Buffer { width: u32, height: u32 },

    #[error("PNG encoding failed: {0}")]
    Encoding(#[from] image::ImageError),
}

/// Per-symbol ingestion failure, split by the stage that failed
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("fetching {symbol} failed: {source}")]
    Fetch {
        symbol: String,
        #[source]
        source: ProviderError,
    },

    #[error("storing {symbol} failed: {source}")]
    Store {
        symbol: String,
        #[source]
        source: StoreError,
    },
}

impl IngestError {
    pub fn symbol(&self) -> &str {
        match self {
            IngestError::Fetch { symbol, .. } | IngestError::Store { symbol, .. } => symbol,
        }
    }

    pub fn stage(&self) -> &'static str {
        match self {
            IngestError::Fetch { .. } => "fetch",
            IngestError::Store { .. } => "store",
        }
    }
}

#[derive(Debug, Error)]
pub enum JoinError {
    #[error("loading series {symbol} failed: {source}")]
    Load {
        symbol: String,
        #[source]
        source: StoreError,
    },

    #[error("replacing joined collection failed: {0}")]
    Write(#[source] StoreError),
}

/// Error surfaced by HTTP handlers
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Chart(#[from] ChartError),

    #[error("render task failed: {0}")]
    Task(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_str) = match &self {
            AppError::Chart(ChartError::EmptySeries) => (
                StatusCode::NOT_FOUND,
                "joined collection is empty; run the join step first".to_string(),
            ),
            AppError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("db_error: {e}")),
            AppError::Chart(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("chart_error: {e}")),
            AppError::Task(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = json!({ "error": error_str });
        (status, axum::Json(body)).into_response()
    }
}
