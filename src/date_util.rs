use chrono::{DateTime, FixedOffset, NaiveDate};

/// Parse a Jira timestamp. Accepts RFC 3339 (`2024-01-15T10:30:00+01:00`,
/// `...Z`), the compact-offset form Jira actually emits
/// (`2024-01-15T10:30:00.000+0000`), and bare dates (midnight UTC).
pub fn parse_datetime(s: &str) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d.and_hms_opt(0, 0, 0)?.and_utc().fixed_offset());
    }
    None
}

/// Parse the calendar-date portion of a Jira date or timestamp string.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.len() >= 10 {
        if let Ok(d) = NaiveDate::parse_from_str(&s[..10], "%Y-%m-%d") {
            return Some(d);
        }
    }
    parse_datetime(s).map(|dt| dt.date_naive())
}

/// Elapsed time between two instants in fractional calendar days.
pub fn days_between(start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> f64 {
    (end - start).num_milliseconds() as f64 / 86_400_000.0
}

/// Round to 2 decimal places.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
