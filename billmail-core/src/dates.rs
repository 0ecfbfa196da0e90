//! Date coercion: turn the date strings banks and models produce into calendar dates.
//!
//! Time of day and timezone are dropped: "Sep 4, 2025 at 4:29 PM ET" is 2025-09-04.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

fn iso_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<y>\d{4})[-/](?P<m>\d{1,2})[-/](?P<d>\d{1,2})(?:\D|$)").expect("invalid iso regex")
    })
}

fn us_numeric_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<m>\d{1,2})/(?P<d>\d{1,2})/(?P<y>\d{4})(?:\D|$)").expect("invalid mm/dd regex")
    })
}

fn month_first_re() -> &'static Regex {
    // "Sep 4, 2025", "Thu, September 4th 2025 at 4:29 PM ET"
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"^(?:[A-Za-z]{3,9},?\s+)?",
            r"(?P<mon>[A-Za-z]{3,9})\.?\s+",
            r"(?P<d>\d{1,2})(?:st|nd|rd|th)?,?\s+",
            r"(?P<y>\d{4})(?:\D|$)"
        ))
        .expect("invalid month-first regex")
    })
}

fn day_first_re() -> &'static Regex {
    // "4 Sep 2025"
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<d>\d{1,2})\s+(?P<mon>[A-Za-z]{3,9})\.?,?\s+(?P<y>\d{4})(?:\D|$)")
            .expect("invalid day-first regex")
    })
}

const MONTHS: [&str; 12] = [
    "january", "february", "march", "april", "may", "june",
    "july", "august", "september", "october", "november", "december",
];

/// Month number from an English month name or an abbreviation of at least three letters.
fn month_from_name(name: &str) -> Option<u32> {
    let name = name.to_lowercase();
    if name.len() < 3 {
        return None;
    }
    if name == "sept" {
        return Some(9);
    }
    MONTHS
        .iter()
        .position(|full| full.starts_with(&name))
        .map(|i| i as u32 + 1)
}

/// Parse a date string into a calendar date.
///
/// Accepts ISO dates and datetimes, MM/DD/YYYY, and English month-name forms
/// with optional weekday, ordinal suffix and trailing time/timezone.
/// Returns `None` for anything else; never a partial result.
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(caps) = iso_re().captures(s) {
        return NaiveDate::from_ymd_opt(
            caps["y"].parse().ok()?,
            caps["m"].parse().ok()?,
            caps["d"].parse().ok()?,
        );
    }

    if let Some(caps) = us_numeric_re().captures(s) {
        return NaiveDate::from_ymd_opt(
            caps["y"].parse().ok()?,
            caps["m"].parse().ok()?,
            caps["d"].parse().ok()?,
        );
    }

    let caps = month_first_re()
        .captures(s)
        .or_else(|| day_first_re().captures(s))?;
    let month = month_from_name(&caps["mon"])?;
    NaiveDate::from_ymd_opt(caps["y"].parse().ok()?, month, caps["d"].parse().ok()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn test_chase_sent_on_line() {
        assert_eq!(normalize_date("Sep 4, 2025 at 4:29 PM ET"), ymd(2025, 9, 4));
    }

    #[test]
    fn test_iso_forms() {
        assert_eq!(normalize_date("2025-09-04"), ymd(2025, 9, 4));
        assert_eq!(normalize_date("2025-09-04T16:29:00-04:00"), ymd(2025, 9, 4));
        assert_eq!(normalize_date(" 2025/9/4 "), ymd(2025, 9, 4));
    }

    #[test]
    fn test_month_names() {
        assert_eq!(normalize_date("September 4, 2025"), ymd(2025, 9, 4));
        assert_eq!(normalize_date("Thu, Sept 4th 2025"), ymd(2025, 9, 4));
        assert_eq!(normalize_date("4 Sep 2025"), ymd(2025, 9, 4));
        assert_eq!(normalize_date("Jan. 31, 2026"), ymd(2026, 1, 31));
    }

    #[test]
    fn test_us_numeric() {
        assert_eq!(normalize_date("09/04/2025"), ymd(2025, 9, 4));
    }

    #[test]
    fn test_rejects_garbage_and_impossible_dates() {
        assert_eq!(normalize_date(""), None);
        assert_eq!(normalize_date("yesterday"), None);
        assert_eq!(normalize_date("2025-02-30"), None);
        assert_eq!(normalize_date("Foo 4, 2025"), None);
        assert_eq!(normalize_date("Sep 4"), None);
    }

    #[test]
    fn test_output_is_always_iso() {
        let d = normalize_date("Sep 4, 2025 at 4:29 PM ET").unwrap();
        assert_eq!(d.format("%Y-%m-%d").to_string(), "2025-09-04");
    }
}
