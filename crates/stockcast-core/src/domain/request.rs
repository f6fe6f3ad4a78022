use serde::{Deserialize, Serialize};

use crate::{Interval, Symbol, UtcDateTime, ValidationError};

/// Historical range request: `[start, end)` in UNIX seconds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HistoryRequest {
    pub symbol: Symbol,
    pub start: i64,
    pub end: i64,
    pub interval: Interval,
}

impl HistoryRequest {
    pub fn new(symbol: Symbol, start: i64, end: i64, interval: Interval) -> Self {
        Self {
            symbol,
            start,
            end,
            interval,
        }
    }

    /// Builds a request from calendar dates (`YYYY-MM-DD`, read as UTC midnight).
    pub fn from_dates(
        symbol: &str,
        start_date: &str,
        end_date: &str,
        interval: Interval,
    ) -> Result<Self, ValidationError> {
        let symbol = Symbol::parse(symbol)?;
        let start = UtcDateTime::parse_date(start_date)?;
        let end = UtcDateTime::parse_date(end_date)?;
        Ok(Self::new(
            symbol,
            start.unix_timestamp(),
            end.unix_timestamp(),
            interval,
        ))
    }

    pub const fn is_empty_range(&self) -> bool {
        self.start >= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_dates_uses_utc_midnight() {
        let request = HistoryRequest::from_dates("AAPL", "2022-01-01", "2023-01-01", Interval::OneDay)
            .expect("valid request");
        assert_eq!(request.start, 1_640_995_200);
        assert_eq!(request.end, 1_672_531_200);
        assert!(!request.is_empty_range());
    }

    #[test]
    fn inverted_range_is_empty() {
        let symbol = Symbol::parse("AAPL").expect("valid symbol");
        let request = HistoryRequest::new(symbol, 200, 100, Interval::OneDay);
        assert!(request.is_empty_range());
    }
}
