//! Loose date-time parsing for the AOI time window.
//!
//! Inputs come from hand-filled job forms, so a range of common layouts is
//! accepted. Everything is re-emitted in UTC as `YYYY-MM-DDTHH:MM:SSZ`.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

use crate::error::AoiError;

pub const OUTPUT_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M%z",
    "%Y-%m-%d %H:%M %z",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %I:%M %p",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%Y%m%dT%H%M%S",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %I:%M:%S %p",
    "%B %d, %Y %H:%M:%S",
    "%B %d, %Y %H:%M",
    "%B %d %Y %H:%M:%S",
    "%B %d %Y %H:%M",
    "%d %B %Y %H:%M:%S",
    "%d %B %Y %H:%M",
    "%b %d, %Y %I:%M %p",
    "%b %d, %Y %I:%M:%S %p",
    "%b %d %Y %I:%M %p",
    "%d-%b-%Y %H:%M:%S",
    "%d-%b-%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y%m%d",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
    "%d %B, %Y",
    "%d-%b-%Y",
];

const UTC_SUFFIXES: &[&str] = &["Z", " UTC", " GMT"];

static WEEKDAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:mon|tue|wed|thu|fri|sat|sun)[a-z]*\.?,?\s+").unwrap()
});

static ORDINAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})(?:st|nd|rd|th)\b").unwrap());

// `10:00+05` -> `10:00+05:00`
static HOUR_OFFSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<time>.*\d:\d{2}(?::\d{2}(?:\.\d+)?)?)\s?(?P<sign>[+-]\d{2})$").unwrap()
});

// `2021-03-01T10` -> `2021-03-01T10:00`
static HOUR_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4}-\d{2}-\d{2}[T ]\d{1,2})$").unwrap());

/// Parses `input` and renders it as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn validate_time(input: &str) -> Result<String, AoiError> {
    parse_datetime(input)
        .map(|time| time.format(OUTPUT_FORMAT).to_string())
        .ok_or_else(|| AoiError::TimeParse(input.to_string()))
}

/// Like [`validate_time`], but an empty input means "no event time".
pub fn validate_event_time(input: &str) -> Result<Option<String>, AoiError> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    validate_time(input).map(Some)
}

pub fn parse_datetime(input: &str) -> Option<DateTime<Utc>> {
    let text = input.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(time) = DateTime::parse_from_rfc3339(text) {
        return Some(time.with_timezone(&Utc));
    }
    if let Ok(time) = DateTime::parse_from_rfc2822(text) {
        return Some(time.with_timezone(&Utc));
    }

    let text = normalize(text);
    for format in OFFSET_FORMATS {
        if let Ok(time) = DateTime::parse_from_str(&text, format) {
            return Some(time.with_timezone(&Utc));
        }
    }

    let naive = HOUR_ONLY.replace(strip_utc_suffix(&text), "${1}:00");
    let naive = naive.as_ref();
    for format in DATETIME_FORMATS {
        if let Ok(time) = NaiveDateTime::parse_from_str(naive, format) {
            return Some(time.and_utc());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(naive, format) {
            return date.and_hms_opt(0, 0, 0).map(|time| time.and_utc());
        }
    }
    None
}

/// Drops a leading weekday and ordinal suffixes, and widens hour-only offsets.
fn normalize(text: &str) -> String {
    let text = WEEKDAY.replace(text, "");
    let text = ORDINAL.replace_all(&text, "${1}");
    HOUR_OFFSET
        .replace(&text, "${time}${sign}:00")
        .into_owned()
}

fn strip_utc_suffix(text: &str) -> &str {
    for suffix in UTC_SUFFIXES {
        if text.len() > suffix.len() {
            let (head, tail) = text.split_at(text.len() - suffix.len());
            if tail.eq_ignore_ascii_case(suffix) {
                return head.trim_end();
            }
        }
    }
    text
}
