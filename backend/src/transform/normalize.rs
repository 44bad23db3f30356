//! Field normalizers.
//!
//! Every function here is total: bad input maps to a fixed default instead
//! of an error. Extracts spell "unknown" as `--` or `---`, so those are
//! treated like empty values.
//!
//! | Function | Unknown / invalid |
//! |----------|-------------------|
//! | [`parse_number`] | `0.0` |
//! | [`parse_percent`] | `0.0` |
//! | [`parse_strike_stat`] | `0 of 0` |
//! | [`parse_date`] | `None` |
//! | [`parse_timestamp`] | `None` |

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::StrikeStat;

/// Longest leading decimal number, the way the scraper's numbers are read
/// (`72"` is 72, `45%` is 45).
static FLOAT_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?").expect("float prefix pattern")
});

static INT_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?\d+").expect("int prefix pattern"));

/// Separator in strike ratios, e.g. `12 of 34`.
const STRIKE_SEPARATOR: &str = " of ";

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%B %d, %Y", "%b %d, %Y", "%m/%d/%Y"];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

fn leading_float(s: &str) -> Option<f64> {
    FLOAT_PREFIX
        .find(s.trim_start())
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|n| n.is_finite())
}

fn leading_int(s: &str) -> Option<i64> {
    INT_PREFIX
        .find(s.trim_start())
        .and_then(|m| m.as_str().parse::<i64>().ok())
}

/// Parse a number. Empty, `--` or non-numeric input is `0`.
pub fn parse_number(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() || s == "--" {
        return 0.0;
    }
    leading_float(s).unwrap_or(0.0)
}

/// [`parse_number`] truncated to an integer count.
pub fn parse_count(s: &str) -> i64 {
    parse_number(s) as i64
}

/// Parse a percentage in 0-100 units, with or without a trailing `%`.
pub fn parse_percent(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() || s == "---" {
        return 0.0;
    }
    let s = s.strip_suffix('%').unwrap_or(s);
    leading_float(s).unwrap_or(0.0)
}

/// Parse a `<landed> of <attempted>` ratio.
///
/// Anything without exactly one separator is `0 of 0`. Each side falls back
/// to `0` on its own.
pub fn parse_strike_stat(s: &str) -> StrikeStat {
    let s = s.trim();
    if s.is_empty() || s == "---" {
        return StrikeStat::default();
    }
    let parts: Vec<&str> = s.split(STRIKE_SEPARATOR).collect();
    match parts.as_slice() {
        [landed, attempted] => StrikeStat::new(
            leading_int(landed).unwrap_or(0),
            leading_int(attempted).unwrap_or(0),
        ),
        _ => StrikeStat::default(),
    }
}

/// Parse a calendar date. Empty, `--` or unrecognized input is `None`.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() || s == "--" {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| parse_datetime(s).map(|dt| dt.date_naive()))
}

/// Parse a timestamp, keeping the time of day when the input has one.
/// Date-only input maps to midnight UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() || s == "--" {
        return None;
    }
    parse_datetime(s).or_else(|| {
        parse_date(s)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    })
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|dt| dt.and_utc())
        })
}

/// Trimmed text, or `default` when empty.
pub fn text_or(s: &str, default: &str) -> String {
    let s = s.trim();
    if s.is_empty() {
        default.to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike};

    #[test]
    fn test_number_sentinels() {
        assert_eq!(parse_number("--"), 0.0);
        assert_eq!(parse_number(""), 0.0);
        assert_eq!(parse_number("   "), 0.0);
        assert_eq!(parse_number("abc"), 0.0);
    }

    #[test]
    fn test_number_values() {
        assert_eq!(parse_number("3.5"), 3.5);
        assert_eq!(parse_number(" 12 "), 12.0);
        assert_eq!(parse_number("-2"), -2.0);
        assert_eq!(parse_number(".75"), 0.75);
    }

    #[test]
    fn test_number_numeric_prefix() {
        assert_eq!(parse_number("72\""), 72.0);
        assert_eq!(parse_number("45%"), 45.0);
        assert_eq!(parse_number("155 lbs."), 155.0);
    }

    #[test]
    fn test_number_never_infinite() {
        assert_eq!(parse_number("1e999"), 0.0);
    }

    #[test]
    fn test_count_truncates() {
        assert_eq!(parse_count("21"), 21);
        assert_eq!(parse_count("2.9"), 2);
        assert_eq!(parse_count("--"), 0);
    }

    #[test]
    fn test_percent() {
        assert_eq!(parse_percent("45%"), 45.0);
        assert_eq!(parse_percent("45"), 45.0);
        assert_eq!(parse_percent("---"), 0.0);
        assert_eq!(parse_percent(""), 0.0);
        assert_eq!(parse_percent("n/a"), 0.0);
        assert_eq!(parse_percent("--"), 0.0);
    }

    #[test]
    fn test_strike_stat() {
        assert_eq!(parse_strike_stat("12 of 34"), StrikeStat::new(12, 34));
        assert_eq!(parse_strike_stat("0 of 0"), StrikeStat::new(0, 0));
        assert_eq!(parse_strike_stat("---"), StrikeStat::default());
        assert_eq!(parse_strike_stat(""), StrikeStat::default());
        assert_eq!(parse_strike_stat("garbage"), StrikeStat::default());
    }

    #[test]
    fn test_strike_stat_sides_independent() {
        assert_eq!(parse_strike_stat("x of 9"), StrikeStat::new(0, 9));
        assert_eq!(parse_strike_stat("4 of y"), StrikeStat::new(4, 0));
    }

    #[test]
    fn test_strike_stat_requires_single_separator() {
        assert_eq!(parse_strike_stat("1 of 2 of 3"), StrikeStat::default());
        assert_eq!(parse_strike_stat("1of2"), StrikeStat::default());
    }

    #[test]
    fn test_date_formats() {
        let expected = NaiveDate::from_ymd_opt(1978, 7, 13);
        assert_eq!(parse_date("1978-07-13"), expected);
        assert_eq!(parse_date("Jul 13, 1978"), expected);
        assert_eq!(parse_date("July 13, 1978"), expected);
        assert_eq!(parse_date("07/13/1978"), expected);
        assert_eq!(parse_date("1978-07-13T10:00:00Z"), expected);
    }

    #[test]
    fn test_date_sentinels() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("--"), None);
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date("2024-02-30"), None);
    }

    #[test]
    fn test_timestamp_keeps_time() {
        let ts = parse_timestamp("2024-11-10 14:30:00").unwrap();
        assert_eq!(ts.hour(), 14);
        assert_eq!(ts.minute(), 30);

        let ts = parse_timestamp("2024-11-10T08:00:00+02:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 11, 10, 6, 0, 0).unwrap());
    }

    #[test]
    fn test_timestamp_date_only_is_midnight() {
        let ts = parse_timestamp("Nov 10, 2024").unwrap();
        assert_eq!(ts.day(), 10);
        assert_eq!(ts.hour(), 0);
        assert_eq!(parse_timestamp("--"), None);
    }

    #[test]
    fn test_text_or() {
        assert_eq!(text_or("", "0:00"), "0:00");
        assert_eq!(text_or(" 2:15 ", "0:00"), "2:15");
    }
}
