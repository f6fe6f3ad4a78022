use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Sampling intervals accepted by the upstream chart endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "2m")]
    TwoMinutes,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "60m")]
    SixtyMinutes,
    #[serde(rename = "90m")]
    NinetyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "5d")]
    FiveDays,
    #[serde(rename = "1wk")]
    OneWeek,
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
}

impl Interval {
    pub const ALL: [Self; 13] = [
        Self::OneMinute,
        Self::TwoMinutes,
        Self::FiveMinutes,
        Self::FifteenMinutes,
        Self::ThirtyMinutes,
        Self::SixtyMinutes,
        Self::NinetyMinutes,
        Self::OneHour,
        Self::OneDay,
        Self::FiveDays,
        Self::OneWeek,
        Self::OneMonth,
        Self::ThreeMonths,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::TwoMinutes => "2m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::ThirtyMinutes => "30m",
            Self::SixtyMinutes => "60m",
            Self::NinetyMinutes => "90m",
            Self::OneHour => "1h",
            Self::OneDay => "1d",
            Self::FiveDays => "5d",
            Self::OneWeek => "1wk",
            Self::OneMonth => "1mo",
            Self::ThreeMonths => "3mo",
        }
    }

    /// Daily-or-coarser intervals produce midnight-aligned records.
    pub const fn is_daily_or_coarser(self) -> bool {
        matches!(
            self,
            Self::OneDay | Self::FiveDays | Self::OneWeek | Self::OneMonth | Self::ThreeMonths
        )
    }
}

impl Default for Interval {
    fn default() -> Self {
        Self::OneDay
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Self::ALL
            .into_iter()
            .find(|interval| interval.as_str() == trimmed)
            .ok_or_else(|| ValidationError::InvalidInterval {
                value: trimmed.to_owned(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_interval() {
        let interval = Interval::from_str("1wk").expect("must parse");
        assert_eq!(interval, Interval::OneWeek);
    }

    #[test]
    fn rejects_invalid_interval() {
        let err = Interval::from_str("2h").expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidInterval { .. }));
    }

    #[test]
    fn every_token_round_trips_through_from_str() {
        for interval in Interval::ALL {
            assert_eq!(Interval::from_str(interval.as_str()), Ok(interval));
        }
    }

    #[test]
    fn intraday_intervals_are_not_daily() {
        assert!(Interval::OneDay.is_daily_or_coarser());
        assert!(Interval::ThreeMonths.is_daily_or_coarser());
        assert!(!Interval::NinetyMinutes.is_daily_or_coarser());
    }
}
