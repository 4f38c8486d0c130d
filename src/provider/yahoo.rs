//! Daily history from the Yahoo Finance chart API.

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::provider::{DailyRecord, MarketDataProvider};
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

/// HTTP client for the chart endpoint
#[derive(Debug, Clone)]
pub struct YahooClient {
    http: Client,
    base_url: Url,
    auto_adjust: bool,
}

impl YahooClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(config.timeout())
            .user_agent(&config.user_agent)
            .build()?;

        let base_url = Url::parse(&config.base_url).map_err(|e| ProviderError::Url(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ProviderError::Url(format!("{} cannot be a base URL", config.base_url)));
        }

        Ok(Self {
            http,
            base_url,
            auto_adjust: config.auto_adjust,
        })
    }

    /// `<base>/v8/finance/chart/<symbol>?range=max&interval=1d...`
    fn chart_url(&self, symbol: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["v8", "finance", "chart", symbol]);
        }
        url.query_pairs_mut()
            .append_pair("range", "max")
            .append_pair("interval", "1d")
            .append_pair("events", "div,splits")
            .append_pair("includeAdjustedClose", "true");
        url
    }
}

#[async_trait]
impl MarketDataProvider for YahooClient {
    #[instrument(skip(self))]
    async fn fetch_daily_history(&self, symbol: &str) -> Result<Vec<DailyRecord>, ProviderError> {
        let url = self.chart_url(symbol);
        debug!("GET {}", url);

        let response = self.http.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        // Error responses (e.g. unknown symbol) still carry a chart envelope
        let envelope: ChartEnvelope = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => {
                return Err(ProviderError::Malformed {
                    symbol: symbol.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(ProviderError::Api {
                    symbol: symbol.to_string(),
                    code: status.as_u16().to_string(),
                    description: body.chars().take(200).collect(),
                })
            }
        };

        records_from_chart(symbol, envelope, self.auto_adjust)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartApiError>,
}

#[derive(Debug, Deserialize)]
struct ChartApiError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    /// Seconds east of UTC for the listing exchange
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteColumns>,
    #[serde(default)]
    adjclose: Vec<AdjCloseColumn>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QuoteColumns {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseColumn {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

fn at(column: &[Option<f64>], i: usize) -> Option<f64> {
    column.get(i).copied().flatten().filter(|v| v.is_finite())
}

/// Turn the columnar chart payload into daily records.
///
/// Rows lacking any of open/high/low/close are dropped, a missing volume is
/// recorded as zero. With `auto_adjust` the adjusted-close ratio is applied
/// to all four prices.
pub(crate) fn records_from_chart(
    symbol: &str,
    envelope: ChartEnvelope,
    auto_adjust: bool,
) -> Result<Vec<DailyRecord>, ProviderError> {
    if let Some(err) = envelope.chart.error {
        return Err(ProviderError::Api {
            symbol: symbol.to_string(),
            code: err.code,
            description: err.description,
        });
    }

    let result = envelope
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| ProviderError::NoData(symbol.to_string()))?;

    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let adjclose = result
        .indicators
        .adjclose
        .into_iter()
        .next()
        .map(|column| column.adjclose)
        .unwrap_or_default();

    let gmtoffset = result.meta.gmtoffset;
    let mut records = Vec::with_capacity(result.timestamp.len());
    let mut skipped = 0usize;

    for (i, &ts) in result.timestamp.iter().enumerate() {
        let (Some(open), Some(high), Some(low), Some(close)) = (
            at(&quote.open, i),
            at(&quote.high, i),
            at(&quote.low, i),
            at(&quote.close, i),
        ) else {
            skipped += 1;
            continue;
        };

        let date = DateTime::from_timestamp(ts + gmtoffset, 0)
            .ok_or_else(|| ProviderError::Malformed {
                symbol: symbol.to_string(),
                reason: format!("timestamp {} out of range", ts),
            })?
            .date_naive();

        let ratio = match at(&adjclose, i) {
            Some(adj) if auto_adjust && close != 0.0 => adj / close,
            _ => 1.0,
        };

        let volume = at(&quote.volume, i).map_or(0, |v| v.round() as i64);

        records.push(DailyRecord {
            date,
            open: open * ratio,
            high: high * ratio,
            low: low * ratio,
            close: close * ratio,
            volume,
        });
    }

    if skipped > 0 {
        warn!("Dropped {} incomplete rows for {}", skipped, symbol);
    }

    Ok(records)
}
