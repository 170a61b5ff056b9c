//! Value conversion
//!
//! Coerces a raw cell value into the type requested by a column mapping.
//! Conversion never fails: a value that cannot be read as the requested type
//! comes back as its original text.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{DataType, Scalar};

/// Largest serial the 1900 date system can represent (9999-12-31).
const MAX_DATE_SERIAL: f64 = 2_958_465.0;

/// Serial of the fictitious 1900-02-29.
const LEAP_BUG_SERIAL: i64 = 60;

/// Leading float of a string, `parseFloat` style.
static FLOAT_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?").unwrap());

/// A string that is a decimal number and nothing else.
static DECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$").unwrap());

static YEAR_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}$").unwrap());

static YEAR_MONTH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}$").unwrap());

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%y",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%a %b %d %Y",
];

/// Convert `value` to `data_type`.
///
/// Blank text converts to `Null` for every type except `String`.
pub fn convert_value(value: &Scalar, data_type: DataType) -> Scalar {
    if value.is_null() {
        return Scalar::Null;
    }

    let text = value.to_text();
    if text.trim().is_empty() && data_type != DataType::String {
        return Scalar::Null;
    }

    match data_type {
        DataType::Number => to_number(value, &text),
        DataType::Date => to_date(value, &text),
        DataType::Boolean => to_boolean(value, &text),
        DataType::String => Scalar::Str(text.trim().to_string()),
        DataType::Auto => infer(value, &text),
    }
}

fn to_number(value: &Scalar, text: &str) -> Scalar {
    if let Scalar::Num(n) = value {
        return Scalar::Num(*n);
    }
    match parse_float_prefix(text) {
        Some(n) => Scalar::Num(n),
        None => Scalar::Str(text.to_string()),
    }
}

fn to_date(value: &Scalar, text: &str) -> Scalar {
    let date = match value {
        Scalar::Num(n) if *n > 1.0 => serial_to_date(*n),
        Scalar::Num(n) => epoch_millis_to_date(*n),
        _ => parse_date_text(text.trim()),
    };

    match date {
        Some(d) => Scalar::Str(d.format("%Y-%m-%d").to_string()),
        None => Scalar::Str(text.to_string()),
    }
}

fn to_boolean(value: &Scalar, text: &str) -> Scalar {
    match text.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Scalar::Bool(true),
        "false" | "0" | "no" => Scalar::Bool(false),
        _ => value.clone(),
    }
}

fn infer(value: &Scalar, text: &str) -> Scalar {
    match value {
        Scalar::Bool(_) | Scalar::Num(_) => return value.clone(),
        _ => {}
    }

    match text {
        "true" | "TRUE" => return Scalar::Bool(true),
        "false" | "FALSE" => return Scalar::Bool(false),
        _ => {}
    }

    let trimmed = text.trim();
    if DECIMAL.is_match(trimmed) {
        if let Ok(n) = trimmed.parse::<f64>() {
            if n.is_finite() {
                return Scalar::Num(n);
            }
        }
    }

    Scalar::Str(text.to_string())
}

/// Parse the leading number of `text`, ignoring leading whitespace and any
/// trailing garbage (`"12.5kg"` is 12.5).
pub fn parse_float_prefix(text: &str) -> Option<f64> {
    FLOAT_PREFIX
        .find(text.trim_start())
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|n| n.is_finite())
}

/// Decode a spreadsheet date serial (1900 date system).
///
/// Serial 1 is 1900-01-01. Serial 60 is the non-existent 1900-02-29, which
/// lands on 1900-03-01 like serial 61; every later serial is shifted back one
/// day to make up for it.
pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !(0.0..=MAX_DATE_SERIAL).contains(&serial) {
        return None;
    }

    let mut days = serial.trunc() as i64;
    let seconds = 86_400.0 * (serial - serial.trunc());
    let whole_seconds = seconds.floor();
    // Time of day within a ten-thousandth of a second of midnight rounds up.
    if seconds - whole_seconds > 0.9999 && whole_seconds + 1.0 >= 86_400.0 {
        days += 1;
    }

    if days == 0 {
        return NaiveDate::from_ymd_opt(1899, 12, 31);
    }
    if days == LEAP_BUG_SERIAL {
        return NaiveDate::from_ymd_opt(1900, 3, 1);
    }
    if days > LEAP_BUG_SERIAL {
        days -= 1;
    }

    NaiveDate::from_ymd_opt(1900, 1, 1)?.checked_add_signed(Duration::days(days - 1))
}

/// A small number read as milliseconds since the Unix epoch.
fn epoch_millis_to_date(millis: f64) -> Option<NaiveDate> {
    if !millis.is_finite() {
        return None;
    }
    DateTime::<Utc>::from_timestamp_millis(millis.trunc() as i64).map(|dt| dt.date_naive())
}

/// Parse calendar date text in the common spreadsheet and ISO shapes.
///
/// Timestamps with an offset are converted to UTC before taking the date.
pub fn parse_date_text(text: &str) -> Option<NaiveDate> {
    if text.is_empty() {
        return None;
    }

    if YEAR_ONLY.is_match(text) {
        return text
            .parse::<i32>()
            .ok()
            .and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1));
    }
    if YEAR_MONTH.is_match(text) {
        return NaiveDate::parse_from_str(&format!("{text}-01"), "%Y-%m-%d").ok();
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }

    DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|dt| dt.date())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Scalar {
        Scalar::from(s)
    }

    #[test]
    fn test_null_and_blank() {
        assert_eq!(convert_value(&Scalar::Null, DataType::String), Scalar::Null);
        assert_eq!(convert_value(&text("   "), DataType::Number), Scalar::Null);
        assert_eq!(convert_value(&text("   "), DataType::Auto), Scalar::Null);
        assert_eq!(convert_value(&text("   "), DataType::String), text(""));
    }

    #[test]
    fn test_number() {
        assert_eq!(convert_value(&text("42"), DataType::Number), Scalar::Num(42.0));
        assert_eq!(convert_value(&text(" 3.5kg"), DataType::Number), Scalar::Num(3.5));
        assert_eq!(convert_value(&text(".5"), DataType::Number), Scalar::Num(0.5));
        assert_eq!(convert_value(&text("1e3"), DataType::Number), Scalar::Num(1000.0));
        assert_eq!(convert_value(&Scalar::Num(7.0), DataType::Number), Scalar::Num(7.0));
        assert_eq!(convert_value(&text("abc"), DataType::Number), text("abc"));
        assert_eq!(convert_value(&text("Infinity"), DataType::Number), text("Infinity"));
    }

    #[test]
    fn test_date_serial_and_text() {
        assert_eq!(
            convert_value(&Scalar::Num(45292.0), DataType::Date),
            text("2024-01-01")
        );
        assert_eq!(
            convert_value(&text("2024-01-01"), DataType::Date),
            text("2024-01-01")
        );
        assert_eq!(
            convert_value(&Scalar::Num(45292.75), DataType::Date),
            text("2024-01-01")
        );
    }

    #[test]
    fn test_serial_leap_year_bug() {
        assert_eq!(serial_to_date(59.0), NaiveDate::from_ymd_opt(1900, 2, 28));
        assert_eq!(serial_to_date(60.0), NaiveDate::from_ymd_opt(1900, 3, 1));
        assert_eq!(serial_to_date(61.0), NaiveDate::from_ymd_opt(1900, 3, 1));
        assert_eq!(serial_to_date(62.0), NaiveDate::from_ymd_opt(1900, 3, 2));
        assert_eq!(serial_to_date(2.0), NaiveDate::from_ymd_opt(1900, 1, 2));
    }

    #[test]
    fn test_serial_rounds_into_next_day() {
        assert_eq!(
            serial_to_date(45292.0 + 0.999_999_999_9),
            NaiveDate::from_ymd_opt(2024, 1, 2)
        );
    }

    #[test]
    fn test_serial_out_of_range_keeps_text() {
        assert_eq!(
            convert_value(&Scalar::Num(3_000_000.0), DataType::Date),
            text("3000000")
        );
    }

    #[test]
    fn test_small_number_is_epoch_millis() {
        assert_eq!(
            convert_value(&Scalar::Num(1.0), DataType::Date),
            text("1970-01-01")
        );
    }

    #[test]
    fn test_date_text_shapes() {
        let cases = [
            ("2024-03-05T23:30:00Z", "2024-03-05"),
            ("2024-03-05T23:30:00-02:00", "2024-03-06"),
            ("2024-03-05 08:15:00", "2024-03-05"),
            ("2024/03/05", "2024-03-05"),
            ("03/05/2024", "2024-03-05"),
            ("3/5/24", "2024-03-05"),
            ("March 5, 2024", "2024-03-05"),
            ("5 Mar 2024", "2024-03-05"),
            ("2024", "2024-01-01"),
            ("2024-03", "2024-03-01"),
        ];
        for (input, expected) in cases {
            assert_eq!(
                convert_value(&text(input), DataType::Date),
                text(expected),
                "input {input}"
            );
        }
    }

    #[test]
    fn test_bad_date_keeps_text() {
        assert_eq!(convert_value(&text("soon"), DataType::Date), text("soon"));
        assert_eq!(convert_value(&text("2024-02-30"), DataType::Date), text("2024-02-30"));
    }

    #[test]
    fn test_boolean() {
        for t in ["true", "TRUE", " Yes ", "1"] {
            assert_eq!(convert_value(&text(t), DataType::Boolean), Scalar::Bool(true));
        }
        for f in ["false", "No", "0"] {
            assert_eq!(convert_value(&text(f), DataType::Boolean), Scalar::Bool(false));
        }
        assert_eq!(convert_value(&Scalar::Num(1.0), DataType::Boolean), Scalar::Bool(true));
        assert_eq!(convert_value(&text(" maybe "), DataType::Boolean), text(" maybe "));
        assert_eq!(convert_value(&Scalar::Num(2.0), DataType::Boolean), Scalar::Num(2.0));
    }

    #[test]
    fn test_string_trims() {
        assert_eq!(convert_value(&text("  Widget "), DataType::String), text("Widget"));
        assert_eq!(convert_value(&Scalar::Num(12.0), DataType::String), text("12"));
        assert_eq!(convert_value(&Scalar::Bool(true), DataType::String), text("true"));
    }

    #[test]
    fn test_auto() {
        assert_eq!(convert_value(&text("TRUE"), DataType::Auto), Scalar::Bool(true));
        assert_eq!(convert_value(&text("false"), DataType::Auto), Scalar::Bool(false));
        assert_eq!(convert_value(&text("True"), DataType::Auto), text("True"));
        assert_eq!(convert_value(&text(" 12 "), DataType::Auto), Scalar::Num(12.0));
        assert_eq!(convert_value(&text("007"), DataType::Auto), Scalar::Num(7.0));
        assert_eq!(convert_value(&text("12abc"), DataType::Auto), text("12abc"));
        assert_eq!(convert_value(&text(" keep me "), DataType::Auto), text(" keep me "));
        assert_eq!(convert_value(&Scalar::Bool(false), DataType::Auto), Scalar::Bool(false));
    }

    #[test]
    fn test_auto_roundtrips_through_canonical_text() {
        for input in ["1", "2.5", "-3", "true", "false", "hello"] {
            let first = convert_value(&text(input), DataType::Auto);
            let again = convert_value(&text(&first.to_text()), DataType::Auto);
            assert_eq!(first, again, "input {input}");
        }
    }
}
