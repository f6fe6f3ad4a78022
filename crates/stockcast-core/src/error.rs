use thiserror::Error;

/// Validation errors raised while constructing domain values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error(
        "invalid interval '{value}', expected one of 1m, 2m, 5m, 15m, 30m, 60m, 90m, 1h, 1d, 5d, 1wk, 1mo, 3mo"
    )]
    InvalidInterval { value: String },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },
    #[error("date must be formatted YYYY-MM-DD: '{value}'")]
    InvalidDate { value: String },
    #[error("unix timestamp {value} is out of range")]
    TimestampOutOfRange { value: i64 },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },
}

/// Fatal failure of the schema normalizer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("required column '{0}' is missing from upstream data")]
    MissingColumn(String),
}

/// Reason a single upstream row was dropped during normalization.
///
/// Row rejections never abort a normalization run. They are logged and
/// collected into a [`NormalizationReport`](crate::NormalizationReport).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NormalizationRowError {
    #[error("row {row}: date is missing")]
    MissingDate { row: usize },
    #[error("row {row}: date '{value}' could not be parsed")]
    InvalidDate { row: usize, value: String },
    #[error("row {row}: duplicate date {date}")]
    DuplicateDate { row: usize, date: String },
    #[error("row {row}: column '{field}' is missing")]
    MissingPrice { row: usize, field: &'static str },
    #[error("row {row}: column '{field}' has non-numeric value '{value}'")]
    UnparseablePrice {
        row: usize,
        field: &'static str,
        value: String,
    },
    #[error("row {row}: {source}")]
    InvalidPrice {
        row: usize,
        #[source]
        source: ValidationError,
    },
}

impl NormalizationRowError {
    pub fn row(&self) -> usize {
        match self {
            Self::MissingDate { row }
            | Self::InvalidDate { row, .. }
            | Self::DuplicateDate { row, .. }
            | Self::MissingPrice { row, .. }
            | Self::UnparseablePrice { row, .. }
            | Self::InvalidPrice { row, .. } => *row,
        }
    }
}

/// Failures talking to the external key-value cache.
///
/// These never leave the cache adapter; every call site degrades to a miss.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection failed: {0}")]
    Connect(String),
    #[error("cache {operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },
    #[error("cache command failed: {0}")]
    Command(String),
    #[error("unexpected ping reply '{0}'")]
    UnexpectedPing(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(value: redis::RedisError) -> Self {
        if value.is_connection_refusal() || value.is_connection_dropped() {
            Self::Connect(value.to_string())
        } else {
            Self::Command(value.to_string())
        }
    }
}

/// Failure retrieving raw rows from the upstream market-data provider.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("upstream request timed out: {message}")]
    Timeout { message: String },
    #[error("upstream transport error: {message}")]
    Transport { message: String, retryable: bool },
    #[error("upstream returned status {status}")]
    Status { status: u16 },
    #[error("upstream reported error {code}: {description}")]
    Upstream { code: String, description: String },
    #[error("failed to decode upstream payload: {message}")]
    Decode { message: String },
    #[error("upstream circuit breaker is open")]
    CircuitOpen,
    #[error("invalid upstream request: {0}")]
    InvalidRequest(#[from] ValidationError),
}

impl FetchError {
    pub const fn retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Transport { retryable, .. } => *retryable,
            Self::Status { status } => matches!(status, 408 | 429 | 500 | 502 | 503 | 504),
            Self::Upstream { .. } | Self::Decode { .. } | Self::CircuitOpen => false,
            Self::InvalidRequest(_) => false,
        }
    }
}

/// Error surfaced by [`HistoryService`](crate::HistoryService).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HistoryError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Normalization(#[from] NormalizationError),
}

/// Error surfaced by a [`Forecaster`](crate::Forecaster).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ForecastError {
    #[error("Stock data cannot be empty")]
    EmptyInput,
    #[error("forecast horizon of {requested} days exceeds the maximum of {max}")]
    HorizonTooLong { requested: u32, max: u32 },
    #[error("model fit failed: {0}")]
    Model(String),
}

/// Error writing records to CSV.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("i/o error while exporting: {0}")]
    Io(#[from] std::io::Error),
}

/// Invalid process configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid bind address '{value}'")]
    InvalidBindAddress { value: String },
}
