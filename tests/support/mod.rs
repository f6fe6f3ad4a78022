//! Fakes shared by the behavior suites.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use stockcast_core::cache::CacheFuture;
use stockcast_core::error::CacheError;
use stockcast_core::fetch::FetchFuture;
use stockcast_core::{
    CacheClient, CacheConnection, CacheStore, CacheTimeouts, Cell, ColumnLabel, FetchError,
    HistoryRequest, HistoryService, Interval, MemoryCacheClient, RawTable, Symbol,
    UpstreamFetcher, UtcDateTime,
};

/// Fetcher returning a fixed outcome and counting calls.
pub struct RecordingFetcher {
    outcome: Result<RawTable, FetchError>,
    requests: Mutex<Vec<HistoryRequest>>,
}

impl RecordingFetcher {
    pub fn returning(table: RawTable) -> Arc<Self> {
        Arc::new(Self {
            outcome: Ok(table),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(error: FetchError) -> Arc<Self> {
        Arc::new(Self {
            outcome: Err(error),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().expect("request log poisoned").len()
    }

    pub fn requests(&self) -> Vec<HistoryRequest> {
        self.requests.lock().expect("request log poisoned").clone()
    }
}

impl UpstreamFetcher for RecordingFetcher {
    fn fetch<'a>(&'a self, request: &'a HistoryRequest) -> FetchFuture<'a> {
        self.requests
            .lock()
            .expect("request log poisoned")
            .push(request.clone());
        let outcome = self.outcome.clone();
        Box::pin(async move { outcome })
    }
}

/// Per-operation counters for a cache backend.
#[derive(Debug, Default)]
pub struct CacheCounters {
    pub connects: AtomicUsize,
    pub gets: AtomicUsize,
    pub sets: AtomicUsize,
}

impl CacheCounters {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }
}

/// How a [`FakeCache`] misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheFault {
    None,
    RefuseConnect,
    StallConnect,
    FailGet,
    FailSet,
}

/// Memory-backed cache client with counters and fault injection.
#[derive(Clone)]
pub struct FakeCache {
    pub memory: MemoryCacheClient,
    pub counters: Arc<CacheCounters>,
    fault: CacheFault,
}

impl FakeCache {
    pub fn new(fault: CacheFault) -> Self {
        Self {
            memory: MemoryCacheClient::new(),
            counters: Arc::new(CacheCounters::default()),
            fault,
        }
    }

    pub fn store(&self) -> CacheStore {
        CacheStore::new(
            Arc::new(self.clone()),
            CacheTimeouts {
                connect: Duration::from_millis(50),
                read: Duration::from_millis(50),
            },
        )
    }
}

impl CacheClient for FakeCache {
    fn connect<'a>(&'a self) -> CacheFuture<'a, Arc<dyn CacheConnection>> {
        self.counters.connects.fetch_add(1, Ordering::SeqCst);
        let fault = self.fault;
        let connection = Arc::new(self.clone()) as Arc<dyn CacheConnection>;
        Box::pin(async move {
            match fault {
                CacheFault::RefuseConnect => {
                    Err(CacheError::Connect(String::from("connection refused")))
                }
                CacheFault::StallConnect => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(connection)
                }
                _ => Ok(connection),
            }
        })
    }
}

impl CacheConnection for FakeCache {
    fn ping<'a>(&'a self) -> CacheFuture<'a, ()> {
        Box::pin(async { Ok(()) })
    }

    fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<Vec<u8>>> {
        self.counters.gets.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            if self.fault == CacheFault::FailGet {
                return Err(CacheError::Command(String::from("READONLY")));
            }
            self.memory.get(key).await
        })
    }

    fn set_ex<'a>(&'a self, key: &'a str, value: Vec<u8>, ttl: Duration) -> CacheFuture<'a, ()> {
        self.counters.sets.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            if self.fault == CacheFault::FailSet {
                return Err(CacheError::Command(String::from("OOM")));
            }
            self.memory.set_ex(key, value, ttl).await
        })
    }
}

pub fn service(fetcher: Arc<RecordingFetcher>, cache: &FakeCache) -> HistoryService {
    HistoryService::new(fetcher, cache.store())
}

pub fn request(symbol: &str, start: &str, end: &str, interval: Interval) -> HistoryRequest {
    HistoryRequest::from_dates(symbol, start, end, interval).expect("valid request")
}

pub fn aapl_january() -> HistoryRequest {
    request("AAPL", "2024-01-01", "2024-01-31", Interval::OneDay)
}

pub fn midnight(date: &str) -> UtcDateTime {
    UtcDateTime::parse_date(date).expect("valid date")
}

/// Table shaped like the chart fetcher output: composite `(symbol, field)`
/// labels, `("Date", "")` for the date and no `Adj Close`.
pub fn chart_table(symbol: &str, rows: &[(&str, f64, Option<i64>)]) -> RawTable {
    let symbol = Symbol::parse(symbol).expect("valid symbol");
    let columns = vec![
        ColumnLabel::composite(["Date", ""]),
        ColumnLabel::composite([symbol.as_str(), "Open"]),
        ColumnLabel::composite([symbol.as_str(), "High"]),
        ColumnLabel::composite([symbol.as_str(), "Low"]),
        ColumnLabel::composite([symbol.as_str(), "Close"]),
        ColumnLabel::composite([symbol.as_str(), "Volume"]),
    ];
    let rows = rows
        .iter()
        .map(|(date, close, volume)| {
            vec![
                Cell::Time(midnight(date)),
                Cell::Float(close - 1.0),
                Cell::Float(close + 1.0),
                Cell::Float(close - 2.0),
                Cell::Float(*close),
                volume.map_or(Cell::Missing, Cell::Int),
            ]
        })
        .collect();
    RawTable::new(columns, rows)
}

pub fn january_rows() -> RawTable {
    chart_table(
        "AAPL",
        &[
            ("2024-01-02", 185.64, Some(82_488_700)),
            ("2024-01-03", 184.25, Some(58_414_500)),
            ("2024-01-04", 181.91, Some(71_983_600)),
            ("2024-01-05", 181.18, None),
        ],
    )
}
