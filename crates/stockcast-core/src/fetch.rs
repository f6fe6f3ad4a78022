//! # Upstream Fetcher
//!
//! Retrieves raw rows for one [`HistoryRequest`] from the Yahoo Finance v8
//! chart endpoint and returns them as a [`RawTable`] with composite
//! `(symbol, field)` labels, the shape the normalizer expects.
//!
//! Empty outcomes are not errors: an inverted range, an unknown symbol
//! (`Not Found`) and a result without timestamps all produce an empty table.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::Instrument;

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::error::FetchError;
use crate::http_client::{HttpClient, HttpErrorKind, HttpRequest, HttpResponse};
use crate::normalize::{Cell, ColumnLabel, RawTable, ADJ_CLOSE, CLOSE, DATE, HIGH, LOW, OPEN, VOLUME};
use crate::retry::RetryPolicy;
use crate::{HistoryRequest, Interval, UtcDateTime};

pub const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com";

const NOT_FOUND_CODE: &str = "Not Found";

/// Boxed future returned by [`UpstreamFetcher::fetch`].
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<RawTable, FetchError>> + Send + 'a>>;

/// Source of raw historical rows.
pub trait UpstreamFetcher: Send + Sync {
    fn fetch<'a>(&'a self, request: &'a HistoryRequest) -> FetchFuture<'a>;
}

/// Connection settings for [`YahooChartFetcher`].
#[derive(Debug, Clone, PartialEq)]
pub struct YahooSettings {
    pub base_url: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for YahooSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// Fetcher for `GET /v8/finance/chart/{symbol}`.
pub struct YahooChartFetcher {
    http_client: Arc<dyn HttpClient>,
    settings: YahooSettings,
    circuit_breaker: CircuitBreaker,
}

impl YahooChartFetcher {
    pub fn new(http_client: Arc<dyn HttpClient>, settings: YahooSettings) -> Self {
        let circuit_breaker = CircuitBreaker::new(settings.circuit_breaker);
        Self {
            http_client,
            settings,
            circuit_breaker,
        }
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    /// Builds the chart request, or `None` when the date window is empty.
    ///
    /// Bounds are converted to calendar dates (UTC) and the provider is asked
    /// for `[midnight(start_date), midnight(end_date))`.
    pub fn chart_request(&self, request: &HistoryRequest) -> Result<Option<HttpRequest>, FetchError> {
        let period1 = UtcDateTime::from_unix(request.start)?.start_of_day();
        let period2 = UtcDateTime::from_unix(request.end)?.start_of_day();
        if period1 >= period2 {
            return Ok(None);
        }

        let url = format!(
            "{}/v8/finance/chart/{}",
            self.settings.base_url.trim_end_matches('/'),
            urlencoding::encode(request.symbol.as_str())
        );

        Ok(Some(
            HttpRequest::get(url)
                .with_query("period1", period1.unix_timestamp().to_string())
                .with_query("period2", period2.unix_timestamp().to_string())
                .with_query("interval", request.interval.as_str())
                .with_query("includePrePost", "false")
                .with_query("events", "div,splits")
                .with_header("accept", "application/json")
                .with_header("referer", "https://finance.yahoo.com/")
                .with_timeout(self.settings.timeout),
        ))
    }

    async fn fetch_table(&self, request: &HistoryRequest) -> Result<RawTable, FetchError> {
        if request.is_empty_range() {
            tracing::debug!("empty date range, skipping upstream call");
            return Ok(RawTable::default());
        }

        let Some(http_request) = self.chart_request(request)? else {
            tracing::debug!("date range collapses to less than one day, skipping upstream call");
            return Ok(RawTable::default());
        };

        let chart = self.fetch_chart_with_retry(http_request).await?;

        if let Some(error) = chart.chart.error {
            if error.code == NOT_FOUND_CODE {
                tracing::info!(description = %error.description, "symbol not found upstream");
                return Ok(RawTable::default());
            }
            return Err(FetchError::Upstream {
                code: error.code,
                description: error.description,
            });
        }

        let Some(result) = chart.chart.result.and_then(|results| results.into_iter().next()) else {
            return Ok(RawTable::default());
        };

        let table = build_table(request.symbol.as_str(), request.interval, result);
        tracing::info!(rows = table.rows.len(), "fetched upstream rows");
        Ok(table)
    }

    async fn fetch_chart_with_retry(
        &self,
        request: HttpRequest,
    ) -> Result<YahooChartResponse, FetchError> {
        let mut attempt = 0;
        loop {
            if !self.circuit_breaker.allow_request() {
                let retry_in = self.circuit_breaker.retry_in().unwrap_or_default();
                tracing::debug!(retry_in_ms = u64::try_from(retry_in.as_millis()).unwrap_or(u64::MAX), "upstream circuit open");
                return Err(FetchError::CircuitOpen);
            }

            let error = match self.fetch_chart_once(request.clone()).await {
                Ok(chart) => {
                    self.circuit_breaker.record_success();
                    return Ok(chart);
                }
                Err(error) => error,
            };

            if counts_against_breaker(&error) {
                self.circuit_breaker.record_failure();
            }

            if !self.settings.retry.should_retry(&error, attempt) {
                return Err(error);
            }

            let delay = self.settings.retry.delay_for_attempt(attempt);
            tracing::warn!(
                attempt = attempt + 1,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "upstream request failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn fetch_chart_once(&self, request: HttpRequest) -> Result<YahooChartResponse, FetchError> {
        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|error| match error.kind() {
                HttpErrorKind::Timeout => FetchError::Timeout {
                    message: error.message().to_owned(),
                },
                HttpErrorKind::Connect => FetchError::Transport {
                    message: error.message().to_owned(),
                    retryable: true,
                },
                HttpErrorKind::Other => FetchError::Transport {
                    message: error.message().to_owned(),
                    retryable: false,
                },
            })?;

        decode_chart(response)
    }
}

impl UpstreamFetcher for YahooChartFetcher {
    fn fetch<'a>(&'a self, request: &'a HistoryRequest) -> FetchFuture<'a> {
        let span = tracing::info_span!(
            "upstream_fetch",
            symbol = %request.symbol,
            interval = %request.interval,
            start = request.start,
            end = request.end,
        );
        Box::pin(self.fetch_table(request).instrument(span))
    }
}

/// Non-2xx responses still carry a chart error body (e.g. 404 `Not Found`).
fn decode_chart(response: HttpResponse) -> Result<YahooChartResponse, FetchError> {
    if response.is_success() {
        return serde_json::from_str(&response.body).map_err(|error| FetchError::Decode {
            message: error.to_string(),
        });
    }

    match serde_json::from_str::<YahooChartResponse>(&response.body) {
        Ok(chart) if chart.chart.error.is_some() => Ok(chart),
        _ => Err(FetchError::Status {
            status: response.status,
        }),
    }
}

fn counts_against_breaker(error: &FetchError) -> bool {
    match error {
        FetchError::Timeout { .. } | FetchError::Transport { .. } => true,
        FetchError::Status { status } => *status >= 500 || *status == 429,
        _ => false,
    }
}

fn build_table(symbol: &str, interval: Interval, result: YahooChartResult) -> RawTable {
    let timestamps = result.timestamp.unwrap_or_default();
    if timestamps.is_empty() {
        return RawTable::default();
    }

    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let adjclose = result
        .indicators
        .adjclose
        .and_then(|series| series.into_iter().next())
        .map(|series| series.adjclose);
    let offset = result.meta.and_then(|meta| meta.gmtoffset).unwrap_or(0);

    let mut columns = vec![
        ColumnLabel::composite([DATE, ""]),
        ColumnLabel::composite([symbol, OPEN]),
        ColumnLabel::composite([symbol, HIGH]),
        ColumnLabel::composite([symbol, LOW]),
        ColumnLabel::composite([symbol, CLOSE]),
    ];
    if adjclose.is_some() {
        columns.push(ColumnLabel::composite([symbol, ADJ_CLOSE]));
    }
    columns.push(ColumnLabel::composite([symbol, VOLUME]));

    let price = |values: &[Option<f64>], index: usize| {
        values
            .get(index)
            .copied()
            .flatten()
            .map_or(Cell::Missing, Cell::Float)
    };

    let rows = timestamps
        .iter()
        .enumerate()
        .map(|(index, &seconds)| {
            let mut row = vec![
                row_date(seconds, offset, interval),
                price(&quote.open, index),
                price(&quote.high, index),
                price(&quote.low, index),
                price(&quote.close, index),
            ];
            if let Some(adjclose) = &adjclose {
                row.push(price(adjclose, index));
            }
            row.push(
                quote
                    .volume
                    .get(index)
                    .copied()
                    .flatten()
                    .map_or(Cell::Missing, Cell::Int),
            );
            row
        })
        .collect();

    RawTable::new(columns, rows)
}

/// Daily-or-coarser bars are stamped with UTC midnight of the exchange-local
/// trading date.
fn row_date(seconds: i64, gmtoffset: i64, interval: Interval) -> Cell {
    let stamp = if interval.is_daily_or_coarser() {
        UtcDateTime::from_unix(seconds.saturating_add(gmtoffset)).map(UtcDateTime::start_of_day)
    } else {
        UtcDateTime::from_unix(seconds)
    };
    stamp.map_or(Cell::Missing, Cell::Time)
}

#[derive(Debug, Deserialize)]
struct YahooChartResponse {
    chart: YahooChart,
}

#[derive(Debug, Deserialize)]
struct YahooChart {
    #[serde(default)]
    result: Option<Vec<YahooChartResult>>,
    #[serde(default)]
    error: Option<YahooChartError>,
}

#[derive(Debug, Deserialize)]
struct YahooChartError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct YahooChartResult {
    #[serde(default)]
    meta: Option<YahooChartMeta>,
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    indicators: YahooIndicators,
}

#[derive(Debug, Deserialize)]
struct YahooChartMeta {
    #[serde(default)]
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct YahooIndicators {
    #[serde(default)]
    quote: Vec<YahooQuote>,
    #[serde(default)]
    adjclose: Option<Vec<YahooAdjClose>>,
}

#[derive(Debug, Default, Deserialize)]
struct YahooQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<i64>>,
}

#[derive(Debug, Deserialize)]
struct YahooAdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}
