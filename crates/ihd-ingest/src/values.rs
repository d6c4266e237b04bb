//! Typed parsing of string cells.

use chrono::{NaiveDate, NaiveDateTime};

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d-%m-%Y", // Dutch: 15-01-2024
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%Y%m%d", // Compact: 20240115
    "%d-%b-%Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
];

/// Parse a calendar date at day precision.
///
/// Timestamps are truncated to their date. Partial dates (year, year-month)
/// and anything unrecognised are `None`; callers exclude such rows.
/// Day-first formats are tried because month-first dates do not occur in
/// the Dutch extracts. Years must have four digits: chrono's `%Y` also
/// takes one or two, which would turn `15-01-24` into the year 15.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() || !has_four_digit_year(value) {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
            return Some(date);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.date());
        }
    }
    None
}

/// The date part (before any time) must lead or end with a four-digit year,
/// or be a compact eight-digit date.
fn has_four_digit_year(value: &str) -> bool {
    let date_part = value.split(' ').next().unwrap_or_default();
    // ISO `T` separator; month names such as `OCT` also contain a `T`.
    let date_part = match date_part.find('T') {
        Some(at) if date_part[..at].ends_with(|c: char| c.is_ascii_digit()) => {
            &date_part[..at]
        }
        _ => date_part,
    };
    let is_year = |part: &str| part.len() == 4 && part.bytes().all(|b| b.is_ascii_digit());
    let parts: Vec<&str> = date_part.split(['-', '/', '.']).collect();
    match parts.as_slice() {
        [compact] => compact.len() == 8 && compact.bytes().all(|b| b.is_ascii_digit()),
        [first, .., last] => is_year(*first) || is_year(*last),
        [] => false,
    }
}

/// Parse an age in whole years. Decimal ages are truncated.
pub fn parse_age(value: &str) -> Option<u32> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(age) = value.parse::<u32>() {
        return Some(age);
    }
    let age = value.replace(',', ".").parse::<f64>().ok()?;
    if age.is_finite() && (0.0..200.0).contains(&age) {
        Some(age.trunc() as u32)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_common_formats() {
        assert_eq!(parse_date("2020-03-01"), Some(date(2020, 3, 1)));
        assert_eq!(parse_date("01-03-2020"), Some(date(2020, 3, 1)));
        assert_eq!(parse_date("01/03/2020"), Some(date(2020, 3, 1)));
        assert_eq!(parse_date("20200301"), Some(date(2020, 3, 1)));
        assert_eq!(parse_date("2020-03-01 14:22:05"), Some(date(2020, 3, 1)));
        assert_eq!(parse_date("2020-03-01T14:22"), Some(date(2020, 3, 1)));
    }

    #[test]
    fn rejects_partial_and_garbage() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("2020-03"), None);
        assert_eq!(parse_date("2020"), None);
        assert_eq!(parse_date("onbekend"), None);
        assert_eq!(parse_date("2020-02-30"), None);
    }

    #[test]
    fn rejects_short_years() {
        assert_eq!(parse_date("01-03-20"), None);
        assert_eq!(parse_date("15-01-24"), None);
        assert_eq!(parse_date("15/01/24"), None);
        assert_eq!(parse_date("24-01-15 10:30"), None);
        assert_eq!(parse_date("240115"), None);
        assert_eq!(parse_date("15-01-2024"), Some(date(2024, 1, 15)));
        assert_eq!(parse_date("15-Jan-2024"), Some(date(2024, 1, 15)));
        assert_eq!(parse_date("15-OCT-2024"), Some(date(2024, 10, 15)));
    }

    #[test]
    fn ages() {
        assert_eq!(parse_age("67"), Some(67));
        assert_eq!(parse_age(" 67,8 "), Some(67));
        assert_eq!(parse_age("-3"), None);
        assert_eq!(parse_age("n/a"), None);
    }

    proptest! {
        #[test]
        fn iso_dates_round_trip(days in 0i64..60_000) {
            let d = date(1900, 1, 1) + chrono::Duration::days(days);
            prop_assert_eq!(parse_date(&d.format("%Y-%m-%d").to_string()), Some(d));
        }
    }
}
