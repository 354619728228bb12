//! Timestamp normalization for feed items.
//!
//! Feeds in the wild publish dates in dozens of shapes. Parsing goes through a
//! fixed, ordered [`LAYOUTS`] table; the first layout that matches wins.
//! Every parsed instant is converted to UTC and rendered in the canonical
//! `YYYY-MM-DD HH:MM:SS` form used for storage and ordering.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Canonical storage format for entry and feed timestamps.
pub const CANONICAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// How a layout pattern is interpreted by chrono.
#[derive(Debug, Clone, Copy)]
enum Layout {
    /// RFC 3339 / ISO 8601 with `Z` or a numeric offset.
    Rfc3339,
    /// Date and time with a numeric offset (`%z` or `%:z`).
    Zoned(&'static str),
    /// Date and time without a zone, read as UTC.
    Naive(&'static str),
    /// Date only, read as midnight UTC.
    DateOnly(&'static str),
}

/// The layout list. Order matters: the first match wins.
///
/// Inputs are pre-processed by [`prepare`] first, so patterns never carry a
/// weekday and named zones have already become numeric offsets.
static LAYOUTS: &[Layout] = &[
    Layout::Rfc3339,
    Layout::DateOnly("%d.%m.%y"),
    Layout::Zoned("%d %b %Y %H:%M:%S %z"),
    Layout::DateOnly("%d %b %Y"),
    Layout::DateOnly("%d %B %Y"),
    Layout::Zoned("%Y-%m-%d %H:%M:%S %z"),
    Layout::Naive("%Y-%m-%d %H:%M:%S"),
    Layout::DateOnly("%Y-%m-%d"),
    Layout::Zoned("%Y-%m-%dT%H:%M:%S %z"),
    Layout::Naive("%Y-%m-%dT%H:%M:%S"),
    Layout::Naive("%Y-%m-%dT%H:%M:%SZ"),
    Layout::Zoned("%Y-%m-%dT%H:%M:%S%z"),
    Layout::Zoned("%Y-%m-%dT%H:%M:%S%:z"),
    Layout::Zoned("%b %d, %Y %H:%M:%S %z"),
    Layout::Zoned("%b %d, %Y %I:%M:%S %p %z"),
    Layout::Naive("%d %b %Y %H:%M:%S"),
    Layout::Zoned("%d %b %Y, %H:%M %z"),
    Layout::Zoned("%d %B %Y %H:%M:%S %z"),
    // ANSI C
    Layout::Naive("%b %e %H:%M:%S %Y"),
    // Unix date
    Layout::Zoned("%b %e %H:%M:%S %z %Y"),
    // Ruby date
    Layout::Zoned("%b %d %H:%M:%S %z %Y"),
    // RFC 822
    Layout::Zoned("%d %b %y %H:%M %z"),
    // RFC 850
    Layout::Zoned("%d-%b-%y %H:%M:%S %z"),
];

/// Zone abbreviations rewritten to numeric offsets before matching.
/// Other abbreviations after the time of day are read as `+0000`.
static ZONE_ABBREVIATIONS: &[(&str, &str)] = &[
    ("UT", "+0000"),
    ("UTC", "+0000"),
    ("GMT", "+0000"),
    ("Z", "+0000"),
    ("EST", "-0500"),
    ("EDT", "-0400"),
    ("CST", "-0600"),
    ("CDT", "-0500"),
    ("MST", "-0700"),
    ("MDT", "-0600"),
    ("PST", "-0800"),
    ("PDT", "-0700"),
    ("BST", "+0100"),
    ("CET", "+0100"),
    ("CEST", "+0200"),
];

static MONTHS: &[&str] = &[
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

static WEEKDAYS: &[&str] = &[
    "mon", "tue", "wed", "thu", "fri", "sat", "sun", "monday", "tuesday", "wednesday",
    "thursday", "friday", "saturday", "sunday",
];

/// Strips a leading weekday and rewrites zone abbreviations.
///
/// Weekdays are dropped rather than parsed because feeds frequently publish
/// a weekday that does not match the date, and chrono rejects those.
fn prepare(raw: &str) -> String {
    let mut rest = raw.trim();

    if let Some((first, tail)) = rest.split_once(char::is_whitespace) {
        let word = first.trim_end_matches(',');
        if WEEKDAYS.contains(&word.to_ascii_lowercase().as_str()) {
            rest = tail.trim_start();
        }
    }

    let mut after_time = false;
    rest.split_whitespace()
        .map(|token| {
            let known = ZONE_ABBREVIATIONS
                .iter()
                .find(|(name, _)| *name == token)
                .map(|(_, offset)| *offset);
            let prepared = match known {
                Some(offset) => offset,
                None if after_time && is_zone_name(token) => "+0000",
                None => token,
            };
            after_time |= token.contains(':');
            prepared
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// An uppercase 2-5 letter token that is not a month or a meridiem.
fn is_zone_name(token: &str) -> bool {
    (2..=5).contains(&token.len())
        && token.bytes().all(|b| b.is_ascii_uppercase())
        && !matches!(token, "AM" | "PM")
        && !MONTHS.contains(&token.to_ascii_lowercase().as_str())
        && !WEEKDAYS.contains(&token.to_ascii_lowercase().as_str())
}

fn try_layout(layout: Layout, input: &str) -> Option<DateTime<Utc>> {
    match layout {
        Layout::Rfc3339 => DateTime::parse_from_rfc3339(input)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Layout::Zoned(pattern) => DateTime::parse_from_str(input, pattern)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Layout::Naive(pattern) => NaiveDateTime::parse_from_str(input, pattern)
            .ok()
            .map(|dt| dt.and_utc()),
        Layout::DateOnly(pattern) => NaiveDate::parse_from_str(input, pattern)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc()),
    }
}

/// Parses a feed timestamp against the layout list.
///
/// Returns `None` when no layout matches. This is also installed as the
/// timestamp parser of the feed-rs parser, so every date feed-rs sees goes
/// through the same table.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let input = prepare(raw);
    if input.is_empty() {
        return None;
    }
    LAYOUTS
        .iter()
        .find_map(|layout| try_layout(*layout, &input))
}

/// Formats an instant in the canonical storage form.
pub fn format_canonical(instant: DateTime<Utc>) -> String {
    instant.format(CANONICAL_FORMAT).to_string()
}
