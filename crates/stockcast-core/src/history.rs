//! # Ingestion Orchestrator
//!
//! Cache-aside read path for historical prices:
//!
//! ```text
//! derive key -> try_connect --Some--> get --hit--> deserialize --ok--> return
//!                   |                   |                |
//!                  None               miss        corrupt payload
//!                   \___________________|________________/
//!                                       v
//!                          fetch -> normalize -> write back -> return
//! ```
//!
//! Every stage runs at most once per call. Only fetch and normalization
//! failures reach the caller; cache trouble only costs latency.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheHandle, CacheStore};
use crate::cache_key::key_for;
use crate::error::HistoryError;
use crate::fetch::UpstreamFetcher;
use crate::normalize::normalize;
use crate::{HistoryRequest, StockRecord};

/// Lifetime of a cached history entry.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Where a [`HistoryResponse`] was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    Cache,
    Upstream,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryResponse {
    pub records: Vec<StockRecord>,
    pub served_from: ServedFrom,
}

/// Composes key derivation, the cache store, the fetcher and the normalizer.
#[derive(Clone)]
pub struct HistoryService {
    fetcher: Arc<dyn UpstreamFetcher>,
    cache: CacheStore,
    ttl: Duration,
}

impl HistoryService {
    pub fn new(fetcher: Arc<dyn UpstreamFetcher>, cache: CacheStore) -> Self {
        Self {
            fetcher,
            cache,
            ttl: DEFAULT_CACHE_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns normalized records for `request`, possibly empty.
    ///
    /// # Errors
    ///
    /// - [`HistoryError::Fetch`] when the upstream call fails.
    /// - [`HistoryError::Normalization`] when upstream data has no close column.
    pub async fn get_historical_data(
        &self,
        request: &HistoryRequest,
    ) -> Result<Vec<StockRecord>, HistoryError> {
        self.lookup(request).await.map(|response| response.records)
    }

    /// Same as [`get_historical_data`](Self::get_historical_data) but also
    /// reports whether the records came from the cache.
    #[tracing::instrument(
        name = "history_lookup",
        skip(self, request),
        fields(symbol = %request.symbol, interval = %request.interval, start = request.start, end = request.end)
    )]
    pub async fn lookup(&self, request: &HistoryRequest) -> Result<HistoryResponse, HistoryError> {
        let key = key_for(request);
        let handle = self.cache.try_connect().await;

        if let Some(handle) = &handle {
            if let Some(records) = read_cached(handle, &key).await {
                tracing::debug!(key = %key, rows = records.len(), "cache hit");
                return Ok(HistoryResponse {
                    records,
                    served_from: ServedFrom::Cache,
                });
            }
            tracing::debug!(key = %key, "cache miss");
        }

        let table = self.fetcher.fetch(request).await?;
        let records = normalize(table)?;

        if let Some(handle) = &handle {
            self.write_back(handle, &key, &records).await;
        }

        Ok(HistoryResponse {
            records,
            served_from: ServedFrom::Upstream,
        })
    }

    async fn write_back(&self, handle: &CacheHandle, key: &str, records: &[StockRecord]) {
        if records.is_empty() {
            return;
        }

        match serde_json::to_vec(records) {
            Ok(payload) => {
                if handle.set_with_ttl(key, payload, self.ttl).await {
                    tracing::debug!(key, rows = records.len(), ttl_secs = self.ttl.as_secs(), "cached history");
                }
            }
            Err(error) => tracing::warn!(key, error = %error, "failed to serialize history for cache"),
        }
    }
}

impl std::fmt::Debug for HistoryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryService")
            .field("cache", &self.cache)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// A payload that fails to deserialize counts as a miss.
async fn read_cached(handle: &CacheHandle, key: &str) -> Option<Vec<StockRecord>> {
    let payload = handle.get(key).await?;
    match serde_json::from_slice::<Vec<StockRecord>>(&payload) {
        Ok(records) => Some(records),
        Err(error) => {
            tracing::warn!(key, error = %error, "discarding malformed cache entry");
            None
        }
    }
}
