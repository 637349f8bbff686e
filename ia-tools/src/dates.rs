//! Permissive date parsing for range filters.
//!
//! An unparseable bound is dropped, not rejected: the query then runs without
//! it. Every drop is logged under `ia_tools::dates` so operators can decide
//! whether it should become a validation error.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// Storage format of every `created_at` column.
pub const SQL_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedDate {
    Day(NaiveDate),
    Instant(NaiveDateTime),
}

pub fn parse_permissive(raw: &str) -> Option<ParsedDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(ParsedDate::Instant(dt.naive_utc()));
    }
    let bare = trimmed
        .strip_suffix('Z')
        .or_else(|| trimmed.strip_suffix('z'))
        .unwrap_or(trimmed);
    if let Ok(day) = NaiveDate::parse_from_str(bare, "%Y-%m-%d") {
        return Some(ParsedDate::Day(day));
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(bare, fmt).ok())
        .map(ParsedDate::Instant)
}

/// Inclusive lower bound in storage format, or `None` when absent or unparseable.
pub fn lower_bound(field: &str, raw: Option<&str>) -> Option<String> {
    let parsed = parse_or_log(field, raw?)?;
    let start = match parsed {
        ParsedDate::Day(day) => day.and_time(NaiveTime::MIN),
        ParsedDate::Instant(at) => at,
    };
    Some(format_timestamp(start))
}

/// Exclusive upper bound in storage format.
///
/// A bare date covers that whole day; a timestamp covers up to and including
/// its second.
pub fn upper_bound_exclusive(field: &str, raw: Option<&str>) -> Option<String> {
    let parsed = parse_or_log(field, raw?)?;
    let end = match parsed {
        ParsedDate::Day(day) => day.and_time(NaiveTime::MIN) + Duration::days(1),
        ParsedDate::Instant(at) => truncate_to_second(at) + Duration::seconds(1),
    };
    Some(format_timestamp(end))
}

pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(SQL_TIMESTAMP_FORMAT).to_string()
}

fn truncate_to_second(at: NaiveDateTime) -> NaiveDateTime {
    NaiveDateTime::new(
        at.date(),
        NaiveTime::from_num_seconds_from_midnight_opt(at.time().num_seconds_from_midnight(), 0)
            .unwrap_or(NaiveTime::MIN),
    )
}

fn parse_or_log(field: &str, raw: &str) -> Option<ParsedDate> {
    let parsed = parse_permissive(raw);
    if parsed.is_none() {
        tracing::warn!(
            target: "ia_tools::dates",
            field,
            value = raw,
            date_filter_ignored = true,
            "unparseable date filter ignored"
        );
    }
    parsed
}
