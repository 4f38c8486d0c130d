use crate::context::AppContext;
use crate::database::models::Bar;
use crate::database::schema::validate_symbol;
use crate::error::IngestError;
use crate::provider::DailyRecord;
use crate::utils::timestamp::{measure_time, midnight};
use chrono::NaiveDateTime;
use tracing::{error, info, instrument, warn};

/// Summary of one successful symbol ingestion
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub symbol: String,
    /// Records returned by the provider
    pub fetched: usize,
    /// Bars upserted into the symbol's collection
    pub written: usize,
    pub first: Option<NaiveDateTime>,
    pub last: Option<NaiveDateTime>,
}

/// Result of ingesting one symbol within a multi-symbol run
#[derive(Debug)]
pub struct IngestOutcome {
    pub symbol: String,
    pub result: Result<IngestReport, IngestError>,
}

impl IngestOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Round a price to 3 decimal places, halves away from zero
pub fn round_price(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

pub fn to_bar(record: &DailyRecord) -> Bar {
    Bar {
        timestamp: midnight(record.date),
        open: round_price(record.open),
        high: round_price(record.high),
        low: round_price(record.low),
        close: round_price(record.close),
        volume: record.volume,
    }
}

/// Fetch the full daily history for `symbol` and upsert it bar by bar.
///
/// Bars are written in batches of `ingest.batch_size`; each batch commits on
/// its own, so a run that fails part-way keeps the batches already written.
#[instrument(skip(ctx))]
pub async fn ingest_symbol(ctx: &AppContext, symbol: &str) -> Result<IngestReport, IngestError> {
    validate_symbol(symbol).map_err(|source| IngestError::Store {
        symbol: symbol.to_string(),
        source,
    })?;

    let records = measure_time(
        &format!("fetch {}", symbol),
        ctx.provider.fetch_daily_history(symbol),
    )
    .await
    .map_err(|source| IngestError::Fetch {
        symbol: symbol.to_string(),
        source,
    })?;

    if records.is_empty() {
        warn!("Provider returned no daily records for {}", symbol);
    }

    let bars: Vec<Bar> = records.iter().map(to_bar).collect();
    let batch_size = ctx.config.ingest.batch_size.max(1);
    let mut written = 0;

    for batch in bars.chunks(batch_size) {
        written += ctx
            .store
            .upsert_bars(symbol, batch)
            .await
            .map_err(|source| IngestError::Store {
                symbol: symbol.to_string(),
                source,
            })?;
    }

    let report = IngestReport {
        symbol: symbol.to_string(),
        fetched: records.len(),
        written,
        first: bars.iter().map(|b| b.timestamp).min(),
        last: bars.iter().map(|b| b.timestamp).max(),
    };

    info!(
        "Ingested {}: {} bars written ({:?} .. {:?})",
        symbol, report.written, report.first, report.last
    );
    Ok(report)
}

/// Ingest each symbol in turn. A failing symbol is logged and recorded in
/// its outcome; the remaining symbols are still processed.
pub async fn ingest_symbols(ctx: &AppContext, symbols: &[String]) -> Vec<IngestOutcome> {
    let mut outcomes = Vec::with_capacity(symbols.len());

    for symbol in symbols {
        let result = ingest_symbol(ctx, symbol).await;
        if let Err(e) = &result {
            error!("Ingestion failed at {} stage: {}", e.stage(), e);
        }
        outcomes.push(IngestOutcome {
            symbol: symbol.clone(),
            result,
        });
    }

    outcomes
}
