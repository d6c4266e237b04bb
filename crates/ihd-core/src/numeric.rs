//! Strict validation of lab result values.
//!
//! Result values are free text in the source extracts. Only values that
//! are entirely a plain number in the configured format are usable;
//! qualified values (`<5`, `>2000`), ranges (`1-2`), words (`trace`) and
//! comma decimals are rejected so the row is excluded rather than
//! coerced.

use ihd_criteria::NumericFormat;

fn all_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

/// Validate and parse a result value.
///
/// Surrounding whitespace is ignored. Returns `None` for anything not in
/// the expected format.
pub fn validate_numeric(value: &str, format: NumericFormat) -> Option<f64> {
    let value = value.trim();
    let valid = match format {
        NumericFormat::Integer => all_digits(value),
        NumericFormat::Decimal => match value.split_once('.') {
            Some((whole, fraction)) => all_digits(whole) && all_digits(fraction),
            None => all_digits(value),
        },
    };
    if !valid {
        return None;
    }
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}
