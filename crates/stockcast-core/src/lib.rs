//! # Stockcast Core
//!
//! Cache-aside pipeline for historical daily prices, plus the forecasting
//! contract used by the HTTP API.
//!
//! ## Overview
//!
//! Given a symbol, a `[start, end)` range in UNIX seconds and an interval,
//! [`HistoryService`] returns a validated `Vec<StockRecord>`:
//!
//! - **Cache key derivation** from `(symbol, start, end, interval)`
//! - **Cache store adapter** that degrades to "miss" when the cache is down
//! - **Upstream fetcher** for the Yahoo Finance chart endpoint
//! - **Schema normalizer** that repairs and validates raw rows
//! - **Forecasting** behind a replaceable fit/predict trait
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Cache capability, Redis and in-memory backends |
//! | [`cache_key`] | Stable key derivation |
//! | [`circuit_breaker`] | Circuit breaker for upstream calls |
//! | [`config`] | Environment-driven configuration |
//! | [`domain`] | `StockRecord`, `HistoryRequest`, `Symbol`, `Interval` |
//! | [`error`] | Error types for every layer |
//! | [`export`] | CSV export |
//! | [`fetch`] | Upstream fetcher trait and Yahoo implementation |
//! | [`forecast`] | Forecaster trait and default linear-trend model |
//! | [`history`] | Ingestion orchestrator |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`normalize`] | Tabular intermediate and normalization steps |
//! | [`retry`] | Retry policy with backoff |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stockcast_core::{AppConfig, HistoryRequest, Interval};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::from_env();
//!     let service = config.history_service();
//!
//!     let request = HistoryRequest::from_dates("AAPL", "2024-01-01", "2024-01-31", Interval::OneDay)?;
//!     let records = service.get_historical_data(&request).await?;
//!     println!("{} rows", records.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  HTTP API / CLI  │
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │  HistoryService  │────▶│  CacheStore      │
//! │  (orchestrator)  │     │  (Redis/memory)  │
//! └────────┬─────────┘     └──────────────────┘
//!          │ miss
//!          ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │ UpstreamFetcher  │────▶│ Circuit Breaker  │
//! │ (Yahoo chart)    │     │ + Retry Policy   │
//! └────────┬─────────┘     └──────────────────┘
//!          │ RawTable
//!          ▼
//! ┌──────────────────┐
//! │ Schema Normalizer│
//! └──────────────────┘
//! ```

pub mod cache;
pub mod cache_key;
pub mod circuit_breaker;
pub mod config;
pub mod domain;
pub mod error;
pub mod export;
pub mod fetch;
pub mod forecast;
pub mod history;
pub mod http_client;
pub mod normalize;
pub mod retry;

pub use cache::{
    CacheClient, CacheConnection, CacheHandle, CacheStore, CacheTimeouts, MemoryCacheClient,
    RedisCacheClient, RedisSettings,
};
pub use cache_key::{derive_key, key_for};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use config::{AppConfig, CacheBackend, CorsConfig};
pub use domain::{HistoryRequest, Interval, StockRecord, Symbol, UtcDateTime};
pub use error::{
    ConfigError, ExportError, FetchError, ForecastError, HistoryError, NormalizationError,
    NormalizationRowError, ValidationError,
};
pub use export::{export_csv, export_csv_string, write_csv};
pub use fetch::{UpstreamFetcher, YahooChartFetcher, YahooSettings};
pub use forecast::{
    run_forecast, ForecastModel, ForecastRecord, Forecaster, LinearTrendForecaster,
    DEFAULT_HORIZON_DAYS,
};
pub use history::{HistoryResponse, HistoryService, ServedFrom, DEFAULT_CACHE_TTL};
pub use http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};
pub use normalize::{normalize, normalize_with_report, Cell, ColumnLabel, NormalizationReport, RawTable};
pub use retry::{Backoff, RetryPolicy};
