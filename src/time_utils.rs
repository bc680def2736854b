// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and backfill windows.

use chrono::{DateTime, Duration, SecondsFormat, Utc};

/// Days per backfill window.
pub const DAYS_IN_MONTH: i64 = 30;

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Split `[start, end)` into consecutive windows of at most `days` days.
///
/// Returns an empty list when `start >= end` or `days <= 0`.
pub fn split_date_range(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    days: i64,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    if start >= end || days <= 0 {
        return Vec::new();
    }

    let step = Duration::days(days);
    let mut windows = Vec::new();
    let mut cursor = start;
    while cursor < end {
        let next = (cursor + step).min(end);
        windows.push((cursor, next));
        cursor = next;
    }
    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_format_uses_z_suffix() {
        assert_eq!(
            format_utc_rfc3339(at("2024-03-01T12:30:45.123Z")),
            "2024-03-01T12:30:45Z"
        );
    }

    #[test]
    fn test_split_covers_range_without_gaps() {
        let start = at("2024-01-01T00:00:00Z");
        let end = at("2024-03-15T00:00:00Z");
        let windows = split_date_range(start, end, DAYS_IN_MONTH);

        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].0, start);
        assert_eq!(windows.last().unwrap().1, end);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
        }
    }

    #[test]
    fn test_split_exact_multiple() {
        let start = at("2024-01-01T00:00:00Z");
        let end = start + Duration::days(60);
        assert_eq!(split_date_range(start, end, 30).len(), 2);
    }

    #[test]
    fn test_split_empty_or_reversed_range() {
        let start = at("2024-01-01T00:00:00Z");
        assert!(split_date_range(start, start, 30).is_empty());
        assert!(split_date_range(start, start - Duration::days(1), 30).is_empty());
        assert!(split_date_range(start, start + Duration::days(1), 0).is_empty());
    }
}
