//! Date and time text formats used in storage and on the wire.
//!
//! Timestamps are UTC `YYYY-MM-DD HH:MM:SS`, dates `YYYY-MM-DD`,
//! reading-room times `HH:MM`.

use chrono::{NaiveDate, NaiveTime, Timelike, Utc};
use rusqlite::types::Type;

use crate::error::{ResearchError, Result};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

pub fn now_timestamp() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn format_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| ResearchError::invalid(format!("invalid date '{raw}', expected YYYY-MM-DD")))
}

/// Accepts `HH:MM` and `HH:MM:SS`; seconds are dropped.
pub fn parse_time(raw: &str) -> Result<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map(|t| t.with_second(0).unwrap_or(t))
        .map_err(|_| ResearchError::invalid(format!("invalid time '{raw}', expected HH:MM")))
}

pub(crate) fn date_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

pub(crate) fn time_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<NaiveTime> {
    let raw: String = row.get(idx)?;
    NaiveTime::parse_from_str(&raw, TIME_FORMAT)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

/// Half-open interval overlap on the same day.
pub fn overlaps(start: NaiveTime, end: NaiveTime, other_start: NaiveTime, other_end: NaiveTime) -> bool {
    start < other_end && end > other_start
}

/// Serde adapter for `NaiveTime` fields carried as `HH:MM`.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_time(*time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_time(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(raw: &str) -> NaiveTime {
        parse_time(raw).unwrap()
    }

    #[test]
    fn parse_time_accepts_seconds_and_drops_them() {
        assert_eq!(format_time(t("09:30:45")), "09:30");
        assert_eq!(format_time(t("14:05")), "14:05");
        assert!(parse_time("25:00").is_err());
    }

    #[test]
    fn parse_date_rejects_other_layouts() {
        assert!(parse_date("2026-03-01").is_ok());
        assert!(parse_date("01/03/2026").is_err());
    }

    #[test]
    fn adjacent_intervals_do_not_overlap() {
        assert!(!overlaps(t("09:00"), t("12:00"), t("12:00"), t("13:00")));
        assert!(overlaps(t("09:00"), t("12:00"), t("11:59"), t("13:00")));
        assert!(overlaps(t("10:00"), t("11:00"), t("09:00"), t("17:00")));
    }
}
