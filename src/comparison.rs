use chrono::{DateTime, NaiveDate, Utc};
use std::cmp::Ordering;

use crate::semver::Version;

/// Lenient number parsing: whitespace is ignored and a blank string is zero.
/// `NaN` and the infinities are not numbers.
pub fn parse_number(s: &str) -> Option<f64> {
    let t = s.trim();
    if t.is_empty() {
        return Some(0.0);
    }
    t.parse::<f64>().ok().filter(|f| f.is_finite())
}

/// RFC 3339 timestamp, or a bare `YYYY-MM-DD` taken as midnight UTC.
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let t = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(t, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Compare two numeric strings; false if either side is not a number.
pub fn cmp_numbers<F>(a: &str, b: &str, pred_on_ord: F) -> bool
where
    F: Fn(Ordering) -> bool,
{
    match (parse_number(a), parse_number(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).map(pred_on_ord).unwrap_or(false),
        _ => false,
    }
}

/// Compare an instant with a date string; false if the string is not a date.
pub fn cmp_dates<F>(a: DateTime<Utc>, b: &str, pred_on_ord: F) -> bool
where
    F: Fn(Ordering) -> bool,
{
    match parse_date(b) {
        Some(other) => pred_on_ord(a.cmp(&other)),
        None => false,
    }
}

/// Compare two semantic versions; false if either side does not parse.
pub fn cmp_versions<F>(a: &str, b: &str, pred_on_ord: F) -> bool
where
    F: Fn(Ordering) -> bool,
{
    match (a.parse::<Version>(), b.parse::<Version>()) {
        (Ok(x), Ok(y)) => pred_on_ord(x.cmp(&y)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers() {
        assert!(cmp_numbers("5", "5.0", |o| o == Ordering::Equal));
        assert!(cmp_numbers(" 7 ", "3", |o| o == Ordering::Greater));
        assert!(cmp_numbers("", "0", |o| o == Ordering::Equal));
        assert!(!cmp_numbers("abc", "1", |_| true));
    }

    #[test]
    fn infinities_are_not_numbers() {
        for value in ["inf", "-inf", "Infinity", "+INFINITY", "NaN", "1e400"] {
            assert_eq!(parse_number(value), None, "{value}");
        }
        assert!(!cmp_numbers("5", "inf", |_| true));
    }

    #[test]
    fn dates() {
        let now = parse_date("2024-05-05T12:00:00Z").unwrap();
        assert!(cmp_dates(now, "2024-05-05", |o| o == Ordering::Greater));
        assert!(cmp_dates(now, "2025-01-01T00:00:00+02:00", |o| o == Ordering::Less));
        assert!(!cmp_dates(now, "not a date", |_| true));
    }

    #[test]
    fn versions() {
        assert!(cmp_versions("1.2.3", "1.2.3", |o| o == Ordering::Equal));
        assert!(cmp_versions("2.0.0-rc.1", "2.0.0", |o| o == Ordering::Less));
        assert!(!cmp_versions("1.2", "1.2.0", |_| true));
    }
}
