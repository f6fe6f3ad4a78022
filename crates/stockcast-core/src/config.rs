//! Process configuration read from environment variables.
//!
//! [`AppConfig::from_env`] is called once at startup; the resulting struct is
//! threaded through constructors. Blank or unparseable values fall back to
//! their defaults.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheStore, CacheTimeouts, MemoryCacheClient, RedisCacheClient, RedisSettings};
use crate::error::ConfigError;
use crate::fetch::{YahooChartFetcher, YahooSettings, DEFAULT_BASE_URL};
use crate::history::{HistoryService, DEFAULT_CACHE_TTL};
use crate::http_client::ReqwestHttpClient;
use crate::retry::RetryPolicy;

/// Which cache backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Redis,
    Memory,
    Disabled,
}

impl FromStr for CacheBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" | "mem" => Ok(Self::Memory),
            "none" | "off" | "disabled" => Ok(Self::Disabled),
            other => Err(format!("unknown cache backend '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let value = format!("{}:{}", self.bind, self.port);
        value
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress { value })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub redis: RedisSettings,
    pub timeouts: CacheTimeouts,
    pub ttl: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub user_agent: String,
}

/// CORS policy for the HTTP API. `*` entries mean "any".
#[derive(Debug, Clone, PartialEq)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
    pub allow_credentials: bool,
    pub max_age: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub upstream: UpstreamConfig,
    pub cors: CorsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };

        Self {
            server: ServerConfig {
                bind: vars.string("STOCKCAST_BIND", "0.0.0.0"),
                port: vars.parsed("STOCKCAST_PORT", 8000),
            },
            cache: CacheConfig {
                backend: vars.parsed("CACHE_BACKEND", CacheBackend::Redis),
                redis: RedisSettings {
                    host: vars.string("REDIS_HOST", "localhost"),
                    port: vars.parsed("REDIS_PORT", 6379),
                    db: vars.parsed("REDIS_DB", 0),
                },
                timeouts: CacheTimeouts {
                    connect: Duration::from_millis(vars.parsed("REDIS_CONNECT_TIMEOUT_MS", 5_000)),
                    read: Duration::from_millis(vars.parsed("REDIS_READ_TIMEOUT_MS", 5_000)),
                },
                ttl: Duration::from_secs(
                    vars.parsed("CACHE_TTL_SECS", DEFAULT_CACHE_TTL.as_secs()),
                ),
            },
            upstream: UpstreamConfig {
                base_url: vars.string("UPSTREAM_BASE_URL", DEFAULT_BASE_URL),
                timeout: Duration::from_millis(vars.parsed("UPSTREAM_TIMEOUT_MS", 10_000)),
                max_retries: vars.parsed("UPSTREAM_MAX_RETRIES", 2),
                user_agent: vars.string(
                    "UPSTREAM_USER_AGENT",
                    concat!("stockcast/", env!("CARGO_PKG_VERSION")),
                ),
            },
            cors: CorsConfig {
                allow_origins: vars.list("CORS_ALLOW_ORIGINS", "http://localhost:3000"),
                allow_methods: vars.list("CORS_ALLOW_METHODS", "*"),
                allow_headers: vars.list("CORS_ALLOW_HEADERS", "*"),
                allow_credentials: vars.flag("CORS_ALLOW_CREDENTIALS", false),
                max_age: Duration::from_secs(vars.parsed("CORS_MAX_AGE", 3_600)),
            },
        }
    }

    /// Cache store for the configured backend.
    ///
    /// An unusable Redis URL is logged and degrades to a disabled cache.
    pub fn cache_store(&self) -> CacheStore {
        match self.cache.backend {
            CacheBackend::Disabled => CacheStore::disabled(),
            CacheBackend::Memory => {
                CacheStore::new(Arc::new(MemoryCacheClient::new()), self.cache.timeouts)
            }
            CacheBackend::Redis => match RedisCacheClient::new(&self.cache.redis) {
                Ok(client) => CacheStore::new(Arc::new(client), self.cache.timeouts),
                Err(error) => {
                    tracing::warn!(error = %error, url = %self.cache.redis.url(), "invalid redis settings, cache disabled");
                    CacheStore::disabled()
                }
            },
        }
    }

    pub fn yahoo_settings(&self) -> YahooSettings {
        YahooSettings {
            base_url: self.upstream.base_url.clone(),
            timeout: self.upstream.timeout,
            retry: RetryPolicy::exponential(self.upstream.max_retries),
            ..YahooSettings::default()
        }
    }

    /// Wires the production history service.
    pub fn history_service(&self) -> HistoryService {
        let http_client = Arc::new(ReqwestHttpClient::new(&self.upstream.user_agent));
        let fetcher = Arc::new(YahooChartFetcher::new(http_client, self.yahoo_settings()));
        HistoryService::new(fetcher, self.cache_store()).with_ttl(self.cache.ttl)
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
    }

    fn string(&self, name: &str, default: &str) -> String {
        self.raw(name).unwrap_or_else(|| default.to_owned())
    }

    fn parsed<T: FromStr>(&self, name: &str, default: T) -> T {
        match self.raw(name) {
            Some(value) => value.parse().unwrap_or_else(|_| {
                tracing::warn!(variable = name, value = %value, "ignoring unparseable setting");
                default
            }),
            None => default,
        }
    }

    fn flag(&self, name: &str, default: bool) -> bool {
        self.raw(name)
            .map(|value| {
                matches!(
                    value.to_ascii_lowercase().as_str(),
                    "1" | "true" | "yes" | "y" | "on"
                )
            })
            .unwrap_or(default)
    }

    fn list(&self, name: &str, default: &str) -> Vec<String> {
        self.string(name, default)
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_owned)
            .collect()
    }
}
