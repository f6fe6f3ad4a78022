//! # Cache Store Adapter
//!
//! Best-effort access to an external key-value cache.
//!
//! The cache is a capability: [`CacheStore::try_connect`] yields
//! `Some(CacheHandle)` only when the backend answered a PING within the
//! connect timeout. Every handle operation is bounded by the read timeout
//! and absorbs its own failures, so callers only ever see "hit" or "miss".
//!
//! | Backend | Type |
//! |---------|------|
//! | Redis | [`RedisCacheClient`] |
//! | Process-local TTL map | [`MemoryCacheClient`] |
//! | None | [`CacheStore::disabled`] |

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use redis::AsyncCommands;

use crate::error::CacheError;

/// Boxed future returned by cache backends.
pub type CacheFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CacheError>> + Send + 'a>>;

/// Backend able to open connections to a key-value cache.
pub trait CacheClient: Send + Sync {
    fn connect<'a>(&'a self) -> CacheFuture<'a, Arc<dyn CacheConnection>>;

    /// Drops any pooled connection after it failed a health check.
    fn invalidate(&self) {}
}

/// Open connection to a key-value cache.
pub trait CacheConnection: Send + Sync {
    fn ping<'a>(&'a self) -> CacheFuture<'a, ()>;

    fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<Vec<u8>>>;

    fn set_ex<'a>(&'a self, key: &'a str, value: Vec<u8>, ttl: Duration) -> CacheFuture<'a, ()>;
}

/// Timeouts applied around every backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTimeouts {
    pub connect: Duration,
    pub read: Duration,
}

impl Default for CacheTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            read: Duration::from_secs(5),
        }
    }
}

/// Entry point for obtaining a [`CacheHandle`].
#[derive(Clone)]
pub struct CacheStore {
    client: Option<Arc<dyn CacheClient>>,
    timeouts: CacheTimeouts,
}

impl CacheStore {
    pub fn new(client: Arc<dyn CacheClient>, timeouts: CacheTimeouts) -> Self {
        Self {
            client: Some(client),
            timeouts,
        }
    }

    /// Store that never connects.
    pub fn disabled() -> Self {
        Self {
            client: None,
            timeouts: CacheTimeouts::default(),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.client.is_none()
    }

    pub fn timeouts(&self) -> CacheTimeouts {
        self.timeouts
    }

    /// Connects and verifies the backend with a PING.
    ///
    /// Returns `None` when the cache is disabled, unreachable, or slower than
    /// the connect timeout. Failures are logged, never returned.
    pub async fn try_connect(&self) -> Option<CacheHandle> {
        let client = self.client.as_ref()?;
        let limit = self.timeouts.connect;

        let attempt = async {
            let connection = client.connect().await?;
            connection.ping().await?;
            Ok::<_, CacheError>(connection)
        };

        let outcome = match tokio::time::timeout(limit, attempt).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout {
                operation: "connect",
                timeout_ms: duration_ms(limit),
            }),
        };

        match outcome {
            Ok(connection) => Some(CacheHandle {
                connection,
                read_timeout: self.timeouts.read,
            }),
            Err(error) => {
                client.invalidate();
                tracing::warn!(error = %error, "cache unavailable, continuing without cache");
                None
            }
        }
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("enabled", &self.client.is_some())
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

/// Live, verified cache connection.
#[derive(Clone)]
pub struct CacheHandle {
    connection: Arc<dyn CacheConnection>,
    read_timeout: Duration,
}

impl CacheHandle {
    /// Looks up `key`. Errors and timeouts are logged and read as a miss.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        match self.bounded("get", self.connection.get(key)).await {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(key, error = %error, "cache read failed, treating as miss");
                None
            }
        }
    }

    /// Stores `value` under `key` with an expiry. Returns `false` when the
    /// write failed; the failure has already been logged.
    pub async fn set_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> bool {
        match self.bounded("set", self.connection.set_ex(key, value, ttl)).await {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(key, error = %error, "cache write failed");
                false
            }
        }
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: CacheFuture<'_, T>,
    ) -> Result<T, CacheError> {
        tokio::time::timeout(self.read_timeout, call)
            .await
            .unwrap_or_else(|_| {
                Err(CacheError::Timeout {
                    operation,
                    timeout_ms: duration_ms(self.read_timeout),
                })
            })
    }
}

impl std::fmt::Debug for CacheHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheHandle")
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Redis backend
// ============================================================================

/// Redis location and database index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub db: i64,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            host: String::from("localhost"),
            port: 6379,
            db: 0,
        }
    }
}

impl RedisSettings {
    pub fn url(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db)
    }
}

/// Redis-backed cache client sharing one multiplexed connection.
pub struct RedisCacheClient {
    client: redis::Client,
    pooled: Mutex<Option<redis::aio::MultiplexedConnection>>,
}

impl RedisCacheClient {
    /// Validates the connection URL; no network traffic happens here.
    pub fn new(settings: &RedisSettings) -> Result<Self, CacheError> {
        let client = redis::Client::open(settings.url())
            .map_err(|error| CacheError::Connect(error.to_string()))?;
        Ok(Self {
            client,
            pooled: Mutex::new(None),
        })
    }

    fn pooled(&self) -> Option<redis::aio::MultiplexedConnection> {
        self.pooled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CacheClient for RedisCacheClient {
    fn connect<'a>(&'a self) -> CacheFuture<'a, Arc<dyn CacheConnection>> {
        Box::pin(async move {
            let connection = match self.pooled() {
                Some(connection) => connection,
                None => {
                    let connection = self.client.get_multiplexed_async_connection().await?;
                    *self.pooled.lock().unwrap_or_else(PoisonError::into_inner) =
                        Some(connection.clone());
                    connection
                }
            };
            Ok(Arc::new(RedisConnection { connection }) as Arc<dyn CacheConnection>)
        })
    }

    fn invalidate(&self) {
        self.pooled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

struct RedisConnection {
    connection: redis::aio::MultiplexedConnection,
}

impl CacheConnection for RedisConnection {
    fn ping<'a>(&'a self) -> CacheFuture<'a, ()> {
        Box::pin(async move {
            let mut connection = self.connection.clone();
            let reply: String = redis::cmd("PING").query_async(&mut connection).await?;
            if reply.eq_ignore_ascii_case("PONG") {
                Ok(())
            } else {
                Err(CacheError::UnexpectedPing(reply))
            }
        })
    }

    fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<Vec<u8>>> {
        Box::pin(async move {
            let mut connection = self.connection.clone();
            let value: Option<Vec<u8>> = connection.get(key).await?;
            Ok(value)
        })
    }

    fn set_ex<'a>(&'a self, key: &'a str, value: Vec<u8>, ttl: Duration) -> CacheFuture<'a, ()> {
        Box::pin(async move {
            let mut connection = self.connection.clone();
            let seconds = ttl.as_secs().max(1);
            let _: () = connection.set_ex(key, value, seconds).await?;
            Ok(())
        })
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

#[derive(Debug, Clone)]
struct MemoryEntry {
    body: Vec<u8>,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct MemoryInner {
    map: HashMap<String, MemoryEntry>,
}

impl MemoryInner {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.map.get(key).and_then(|entry| {
            if Instant::now() < entry.expires_at {
                Some(entry.body.clone())
            } else {
                None
            }
        })
    }

    /// Inserts `key` and drops every entry that has already expired.
    fn put(&mut self, key: String, body: Vec<u8>, ttl: Duration) {
        let now = Instant::now();
        self.map.retain(|_, entry| entry.expires_at > now);
        self.map.insert(
            key,
            MemoryEntry {
                body,
                expires_at: now + ttl,
            },
        );
    }
}

/// Thread-safe, process-local TTL cache.
///
/// Clones share storage, so one instance can back a [`CacheStore`] while a
/// test keeps another to inspect what was written.
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheClient {
    inner: Arc<tokio::sync::RwLock<MemoryInner>>,
}

impl MemoryCacheClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `key` directly, bypassing connection handling.
    pub async fn peek(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.read().await.get(key)
    }

    /// Writes `key` directly, bypassing connection handling.
    pub async fn insert(&self, key: impl Into<String>, body: Vec<u8>, ttl: Duration) {
        self.inner.write().await.put(key.into(), body, ttl);
    }

    /// Remaining lifetime of `key`, if present and not expired.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let store = self.inner.read().await;
        store
            .map
            .get(key)
            .and_then(|entry| entry.expires_at.checked_duration_since(Instant::now()))
            .filter(|remaining| !remaining.is_zero())
    }

    /// Remove expired entries.
    pub async fn clear_expired(&self) {
        let now = Instant::now();
        self.inner
            .write()
            .await
            .map
            .retain(|_, entry| entry.expires_at > now);
    }

    /// Number of entries, including expired ones not yet evicted by a write.
    pub async fn len(&self) -> usize {
        self.inner.read().await.map.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl CacheClient for MemoryCacheClient {
    fn connect<'a>(&'a self) -> CacheFuture<'a, Arc<dyn CacheConnection>> {
        let connection = Arc::new(self.clone()) as Arc<dyn CacheConnection>;
        Box::pin(async move { Ok(connection) })
    }
}

impl CacheConnection for MemoryCacheClient {
    fn ping<'a>(&'a self) -> CacheFuture<'a, ()> {
        Box::pin(async { Ok(()) })
    }

    fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<Vec<u8>>> {
        Box::pin(async move { Ok(self.peek(key).await) })
    }

    fn set_ex<'a>(&'a self, key: &'a str, value: Vec<u8>, ttl: Duration) -> CacheFuture<'a, ()> {
        Box::pin(async move {
            self.insert(key, value, ttl).await;
            Ok(())
        })
    }
}
