use std::fmt::{Display, Formatter};

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, Time, UtcOffset};

use crate::ValidationError;

/// RFC3339 timestamp guaranteed to be UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtcDateTime(OffsetDateTime);

impl UtcDateTime {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let parsed = OffsetDateTime::parse(input, &Rfc3339).map_err(|_| {
            ValidationError::TimestampNotUtc {
                value: input.to_owned(),
            }
        })?;

        Self::from_offset_datetime(parsed).map_err(|_| ValidationError::TimestampNotUtc {
            value: input.to_owned(),
        })
    }

    /// Parses a calendar date (`YYYY-MM-DD`) as midnight UTC.
    pub fn parse_date(input: &str) -> Result<Self, ValidationError> {
        let date = Date::parse(input.trim(), format_description!("[year]-[month]-[day]"))
            .map_err(|_| ValidationError::InvalidDate {
                value: input.to_owned(),
            })?;
        Ok(Self::from_date(date))
    }

    pub fn from_date(date: Date) -> Self {
        Self(date.with_time(Time::MIDNIGHT).assume_utc())
    }

    pub fn from_unix(seconds: i64) -> Result<Self, ValidationError> {
        OffsetDateTime::from_unix_timestamp(seconds)
            .map(Self)
            .map_err(|_| ValidationError::TimestampOutOfRange { value: seconds })
    }

    pub fn from_offset_datetime(value: OffsetDateTime) -> Result<Self, ValidationError> {
        if value.offset() != UtcOffset::UTC {
            return Err(ValidationError::TimestampNotUtc {
                value: value
                    .format(&Rfc3339)
                    .unwrap_or_else(|_| String::from("<unformattable>")),
            });
        }

        Ok(Self(value))
    }

    pub fn into_inner(self) -> OffsetDateTime {
        self.0
    }

    pub fn unix_timestamp(self) -> i64 {
        self.0.unix_timestamp()
    }

    pub fn date(self) -> Date {
        self.0.date()
    }

    pub fn checked_add_days(self, days: i64) -> Option<Self> {
        self.0.checked_add(time::Duration::days(days)).map(Self)
    }

    /// Truncates to midnight UTC of the same calendar day.
    pub fn start_of_day(self) -> Self {
        Self::from_date(self.0.date())
    }

    pub fn format_rfc3339(self) -> String {
        self.0
            .format(&Rfc3339)
            .unwrap_or_else(|_| String::from("<unformattable>"))
    }

    pub fn format_date(self) -> String {
        self.0
            .format(format_description!("[year]-[month]-[day]"))
            .unwrap_or_else(|_| String::from("<unformattable>"))
    }
}

impl Display for UtcDateTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_rfc3339())
    }
}

impl Serialize for UtcDateTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.format_rfc3339())
    }
}

impl<'de> Deserialize<'de> for UtcDateTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        // Bare calendar dates are accepted as UTC midnight.
        Self::parse(&value)
            .or_else(|error| Self::parse_date(&value).map_err(|_| error))
            .map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_utc_timestamp() {
        let parsed = UtcDateTime::parse("2024-01-01T00:00:00Z").expect("must parse");
        assert_eq!(parsed.format_rfc3339(), "2024-01-01T00:00:00Z");
    }

    #[test]
    fn rejects_non_utc_timestamp() {
        let err = UtcDateTime::parse("2024-01-01T01:00:00+01:00").expect_err("must fail");
        assert!(matches!(err, ValidationError::TimestampNotUtc { .. }));
    }

    #[test]
    fn calendar_dates_land_on_utc_midnight() {
        let parsed = UtcDateTime::parse_date("2024-01-31").expect("must parse");
        assert_eq!(parsed.unix_timestamp(), 1_706_659_200);
        assert_eq!(parsed.format_date(), "2024-01-31");
    }

    #[test]
    fn rejects_malformed_calendar_date() {
        let err = UtcDateTime::parse_date("01/31/2024").expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidDate { .. }));
    }

    #[test]
    fn deserializes_bare_dates_as_midnight() {
        let parsed: UtcDateTime = serde_json::from_str("\"2024-01-02\"").expect("must parse");
        assert_eq!(parsed.format_rfc3339(), "2024-01-02T00:00:00Z");
        assert!(serde_json::from_str::<UtcDateTime>("\"yesterday\"").is_err());
    }

    #[test]
    fn start_of_day_drops_the_time_component() {
        let parsed = UtcDateTime::from_unix(1_704_119_400).expect("in range");
        assert_eq!(parsed.start_of_day().format_rfc3339(), "2024-01-01T00:00:00Z");
    }
}
