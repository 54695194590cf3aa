use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::errors::{DomainError, DomainResult};

/// Calendar layouts tried in order after RFC 3339 and the datetime layouts.
const DATE_LAYOUTS: [&str; 5] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y", "%Y%m%d"];
const DATETIME_LAYOUTS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"];

/// A calendar date, always interpreted as midnight UTC.
///
/// Stored as a Postgres `DATE` through the transparent sqlx mapping.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(try_from = "String", into = "String")]
#[sqlx(transparent)]
pub struct Date(NaiveDate);

impl Date {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(DomainError::validation("date", "date is required"));
        }

        if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
            return Ok(Self::from_datetime(datetime.with_timezone(&Utc)));
        }
        for layout in DATETIME_LAYOUTS {
            if let Ok(datetime) = NaiveDateTime::parse_from_str(value, layout) {
                return Ok(Self(datetime.date()));
            }
        }
        for layout in DATE_LAYOUTS {
            if let Ok(date) = NaiveDate::parse_from_str(value, layout) {
                return Ok(Self(date));
            }
        }

        Err(DomainError::validation(
            "date",
            format!("'{}' is not a recognised date", value),
        ))
    }

    /// Truncates a wall-clock instant to its UTC calendar day.
    pub fn from_datetime(datetime: DateTime<Utc>) -> Self {
        Self(datetime.date_naive())
    }

    pub fn from_naive(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn today() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn as_naive(&self) -> NaiveDate {
        self.0
    }

    pub fn midnight_utc(&self) -> DateTime<Utc> {
        self.0.and_time(chrono::NaiveTime::MIN).and_utc()
    }

    pub fn is_future(&self) -> bool {
        *self > Self::today()
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl TryFrom<String> for Date {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Date> for String {
    fn from(date: Date) -> Self {
        date.to_string()
    }
}

impl From<Date> for NaiveDate {
    fn from(date: Date) -> Self {
        date.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parses_supported_layouts() {
        let expected = NaiveDate::from_ymd_opt(1990, 5, 17).unwrap();
        for raw in [
            "1990-05-17",
            "17/05/1990",
            "1990/05/17",
            "17-05-1990",
            "19900517",
            "1990-05-17T13:45:00",
            "1990-05-17 08:00:00",
            "1990-05-17T23:30:00Z",
        ] {
            assert_eq!(Date::parse(raw).unwrap().as_naive(), expected, "{}", raw);
        }
    }

    #[test]
    fn test_rfc3339_is_converted_to_utc_before_truncating() {
        // 01:30 at +03:00 is still the previous day in UTC.
        let date = Date::parse("1990-05-18T01:30:00+03:00").unwrap();
        assert_eq!(date.to_string(), "1990-05-17");
    }

    #[test]
    fn test_rejects_empty_and_garbage() {
        assert!(Date::parse("").is_err());
        assert!(Date::parse("yesterday").is_err());
        assert!(Date::parse("2023-02-30").is_err());
    }

    #[test]
    fn test_midnight_utc() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 9, 17, 12, 5).unwrap();
        let date = Date::from_datetime(instant);
        assert_eq!(
            date.midnight_utc(),
            Utc.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap()
        );
    }
}
