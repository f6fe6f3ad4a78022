//! # Domain Models
//!
//! Canonical value types shared by the pipeline, the HTTP layer and the CLI.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`StockRecord`] | One validated OHLC + adjusted close + volume observation |
//! | [`HistoryRequest`] | Symbol, `[start, end)` UNIX range and interval |
//! | [`Symbol`] | Validated ticker, casing preserved |
//! | [`Interval`] | Upstream sampling interval token (`1d`, `1wk`, ...) |
//! | [`UtcDateTime`] | UTC timestamp serialized as RFC3339 |
//!
//! Construction validates invariants; deserialization goes through the same
//! constructors so a cached payload can never produce a record that the
//! normalizer would have rejected.

mod interval;
mod record;
mod request;
mod symbol;
mod timestamp;

pub use interval::Interval;
pub(crate) use record::validate_price;
pub use record::StockRecord;
pub use request::HistoryRequest;
pub use symbol::Symbol;
pub use timestamp::UtcDateTime;
