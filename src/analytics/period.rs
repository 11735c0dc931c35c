//! Dashboard period granularity and time bucketing
//!
//! All bucketing is done in UTC.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bucket granularity for trend and impression series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Period {
    pub fn as_str(self) -> &'static str {
        match self {
            Period::Daily => "daily",
            Period::Weekly => "weekly",
            Period::Monthly => "monthly",
        }
    }

    /// Number of days of raw data a query at this granularity looks at
    pub fn lookback_days(self) -> u32 {
        match self {
            Period::Daily => 30,
            Period::Weekly => 90,
            Period::Monthly => 365,
        }
    }

    /// Bucket key of a calendar date
    ///
    /// # Returns
    /// - daily: "YYYY-MM-DD"
    /// - weekly: Monday of the ISO week, "YYYY-MM-DD"
    /// - monthly: "YYYY-MM"
    pub fn bucket_date(self, date: NaiveDate) -> String {
        match self {
            Period::Daily => date.format("%Y-%m-%d").to_string(),
            Period::Weekly => {
                let offset = date.weekday().num_days_from_monday();
                let monday = date - Duration::days(i64::from(offset));
                monday.format("%Y-%m-%d").to_string()
            }
            Period::Monthly => date.format("%Y-%m").to_string(),
        }
    }

    /// Bucket key of a timestamp, taken in UTC
    pub fn bucket_key(self, timestamp: DateTime<Utc>) -> String {
        self.bucket_date(timestamp.date_naive())
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Period::Daily),
            "weekly" => Ok(Period::Weekly),
            "monthly" => Ok(Period::Monthly),
            other => Err(format!(
                "period must be one of daily, weekly, monthly (got {other:?})"
            )),
        }
    }
}

/// Parse the date of an analytics data point
///
/// Providers send either a plain date or a full RFC 3339 timestamp.
pub fn parse_point_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }

    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|ts| ts.with_timezone(&Utc).date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn daily_and_monthly_keys() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 7, 23, 59, 0).unwrap();
        assert_eq!(Period::Daily.bucket_key(ts), "2024-03-07");
        assert_eq!(Period::Monthly.bucket_key(ts), "2024-03");
    }

    #[test]
    fn weekly_key_is_always_monday() {
        // 2024-03-04 is a Monday
        for day in 4..=10 {
            let date = NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
            assert_eq!(Period::Weekly.bucket_date(date), "2024-03-04", "day {day}");
        }
    }

    #[test]
    fn weekly_key_crosses_year_boundary() {
        // Wednesday 2025-01-01 belongs to the ISO week starting Monday 2024-12-30
        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert_eq!(Period::Weekly.bucket_date(date), "2024-12-30");
    }

    #[test]
    fn lookback_windows() {
        assert_eq!(Period::Daily.lookback_days(), 30);
        assert_eq!(Period::Weekly.lookback_days(), 90);
        assert_eq!(Period::Monthly.lookback_days(), 365);
    }

    #[test]
    fn parses_period_names() {
        assert_eq!("weekly".parse::<Period>(), Ok(Period::Weekly));
        assert!("yearly".parse::<Period>().is_err());
        assert!("Daily".parse::<Period>().is_err());
    }

    #[test]
    fn parses_point_dates() {
        assert_eq!(
            parse_point_date("2024-05-01"),
            NaiveDate::from_ymd_opt(2024, 5, 1)
        );
        assert_eq!(
            parse_point_date("2024-05-01T22:30:00-05:00"),
            NaiveDate::from_ymd_opt(2024, 5, 2)
        );
        assert_eq!(parse_point_date("yesterday"), None);
    }
}
