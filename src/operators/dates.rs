//! Month truncation of dates and timestamps
//!
//! All three operations map a point in time to the first day of its month at
//! midnight UTC and keep the input's representation.

use std::fmt::Write as _;

use chrono::format::{parse, Parsed, StrftimeItems};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;

/// Directives accepted in a date pattern. `%f` is handled separately.
const SUPPORTED_DIRECTIVES: &str = "YymdHIMSpbBaA";

/// Truncate a date string to the first of its month, keeping `pattern` for
/// both parsing and formatting. Failures are reported in-band as sentinel
/// strings so one bad record does not stop a batch.
pub fn truncate_day_from_str(value: &Value, pattern: Option<&str>) -> Value {
    let Some(pattern) = pattern.filter(|p| !p.trim().is_empty()) else {
        return Value::from("invalid_pattern: missing");
    };
    let Some(input) = value.as_str().filter(|s| !s.trim().is_empty()) else {
        return Value::Null;
    };

    let mismatch = || Value::String(format!("input_does_not_match_pattern: {}", pattern));
    let output_pattern = match output_pattern(pattern) {
        Ok(output_pattern) => output_pattern,
        Err(PatternError::Unreadable) => return mismatch(),
        Err(PatternError::Redefined(directive)) => {
            return Value::String(format!(
                "invalid_pattern: {} / error: redefinition of directive '%{}'",
                pattern, directive
            ))
        }
    };

    let Some(date) = parse_date(input, pattern) else {
        return mismatch();
    };

    let truncated = first_of_month(date);
    let mut formatted = String::new();
    match write!(formatted, "{}", truncated.format(&output_pattern)) {
        Ok(()) => Value::String(formatted),
        Err(_) => Value::String(format!(
            "invalid_pattern: {} / error: cannot format date",
            pattern
        )),
    }
}

enum PatternError {
    /// Unknown directive or a trailing `%`; no input can match.
    Unreadable,
    /// The same directive appears twice.
    Redefined(char),
}

/// Validate `pattern` and derive the pattern used to render the truncated
/// value: fractional seconds are always zero after truncation.
fn output_pattern(pattern: &str) -> Result<String, PatternError> {
    let mut seen = String::new();
    let mut output = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            output.push(c);
            continue;
        }
        let Some(directive) = chars.next() else {
            return Err(PatternError::Unreadable);
        };
        if directive == '%' {
            output.push_str("%%");
            continue;
        }
        if directive != 'f' && !SUPPORTED_DIRECTIVES.contains(directive) {
            return Err(PatternError::Unreadable);
        }
        if seen.contains(directive) {
            return Err(PatternError::Redefined(directive));
        }
        seen.push(directive);

        if directive == 'f' {
            output.push_str("000000");
        } else {
            output.push('%');
            output.push(directive);
        }
    }

    Ok(output)
}

/// Parse the date part of `input`; fields the pattern does not mention default
/// to 1900-01-01. Two-digit years 69-99 fall in the 1900s, 00-68 in the 2000s.
fn parse_date(input: &str, pattern: &str) -> Option<NaiveDate> {
    let mut parsed = Parsed::new();
    parse(&mut parsed, input, StrftimeItems::new(pattern)).ok()?;

    if parsed.year().is_none() {
        let year = match parsed.year_mod_100() {
            Some(short) if short < 69 => 2000 + i64::from(short),
            Some(short) => 1900 + i64::from(short),
            None => 1900,
        };
        parsed.set_year(year).ok()?;
    }
    if parsed.month().is_none() {
        parsed.set_month(1).ok()?;
    }
    if parsed.day().is_none() {
        parsed.set_day(1).ok()?;
    }
    parsed.to_naive_date().ok()
}

fn first_of_month(date: NaiveDate) -> NaiveDateTime {
    date.with_day(1).unwrap_or(date).and_time(NaiveTime::MIN)
}

/// Truncate a POSIX timestamp in seconds. Non-numbers give null.
pub fn truncate_day_from_posix_timestamp(value: &Value) -> Value {
    value
        .as_f64()
        .and_then(truncate_seconds)
        .map(Value::from)
        .unwrap_or(Value::Null)
}

/// Truncate a timestamp in milliseconds since the epoch. Non-numbers give null.
pub fn truncate_day_from_epoch_milliseconds(value: &Value) -> Value {
    value
        .as_f64()
        .and_then(|ms| truncate_seconds(ms / 1000.0))
        .and_then(|seconds| seconds.checked_mul(1000))
        .map(Value::from)
        .unwrap_or(Value::Null)
}

fn truncate_seconds(seconds: f64) -> Option<i64> {
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    if whole < i64::MIN as f64 || whole > i64::MAX as f64 {
        return None;
    }
    let moment = DateTime::from_timestamp(whole as i64, 0)?;
    let truncated = first_of_month(moment.date_naive());
    Some(truncated.and_utc().timestamp())
}
