//! Single-value anonymization primitives
//!
//! Pure functions over one JSON value. `null` in gives `null` out unless the
//! operation is a presence check, which reports absence instead.

use regex::Regex;
use serde_json::{Number, Value};

use crate::error::{AnonymizerError, Result};

/// Keep the first two octets of a dotted address: `192.168.1.1` -> `192.168.0.0`.
pub fn round_ip(value: Value) -> Result<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::String(address) => {
            let mut parts = address.split('.');
            match (parts.next(), parts.next()) {
                (Some(first), Some(second)) => {
                    Ok(Value::String(format!("{}.{}.0.0", first, second)))
                }
                _ => Ok(Value::Null),
            }
        }
        other => Err(AnonymizerError::invalid_value("round_ip", &other)),
    }
}

/// Nearest integer, ties to even. Integers pass through.
pub fn round_float_to_integer(value: Value) -> Result<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Number(n) if n.is_f64() => {
            let rounded = n.as_f64().unwrap_or_default().round_ties_even();
            if rounded >= i64::MIN as f64 && rounded <= i64::MAX as f64 {
                Ok(Value::from(rounded as i64))
            } else {
                Ok(float_value(rounded))
            }
        }
        Value::Number(n) => Ok(Value::Number(n)),
        other => Err(AnonymizerError::invalid_value("round_float_to_integer", &other)),
    }
}

/// Round to `ndigits` decimals. Floats stay floats (`4.0`), integers stay
/// integers unless `ndigits` is negative.
pub fn round_float(value: Value, ndigits: i32) -> Result<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Number(n) if n.is_f64() => {
            Ok(float_value(round_to_digits(n.as_f64().unwrap_or_default(), ndigits)))
        }
        Value::Number(n) if ndigits >= 0 => Ok(Value::Number(n)),
        Value::Number(n) => {
            let rounded = round_to_digits(n.as_f64().unwrap_or_default(), ndigits);
            Ok(Value::from(rounded as i64))
        }
        other => Err(AnonymizerError::invalid_value("round_float", &other)),
    }
}

/// Decimal rounding on the exact binary value, ties to even.
fn round_to_digits(x: f64, ndigits: i32) -> f64 {
    if !x.is_finite() {
        return x;
    }
    if ndigits >= 0 {
        let precision = ndigits.min(340) as usize;
        format!("{:.*}", precision, x).parse().unwrap_or(x)
    } else {
        let factor = 10f64.powi(-ndigits);
        (x / factor).round_ties_even() * factor
    }
}

pub(crate) fn float_value(x: f64) -> Value {
    Number::from_f64(x).map(Value::Number).unwrap_or(Value::Null)
}

/// `"true"` if the value is a string with at least one non-whitespace character.
pub fn is_string_present(value: &Value) -> &'static str {
    match value {
        Value::String(s) if !s.trim().is_empty() => "true",
        _ => "false",
    }
}

/// `1` for any JSON number, `0` otherwise.
pub fn is_number_present(value: &Value) -> Value {
    Value::from(u8::from(value.is_number()))
}

/// Classify an email address as `false`, `invalid`, `test` or `true`.
pub fn is_email_present_or_test(value: &Value, test_domains: &[String]) -> Value {
    let presence = is_string_present(value);
    let Some(address) = value.as_str().filter(|_| presence == "true") else {
        return Value::from(presence);
    };
    let Some((_, domain)) = address.split_once('@') else {
        return Value::from("invalid");
    };
    // only the part between the first and a possible second '@' counts
    let domain = domain.split('@').next().unwrap_or_default().trim().to_lowercase();
    if test_domains
        .iter()
        .any(|candidate| candidate.trim().to_lowercase() == domain)
    {
        Value::from("test")
    } else {
        Value::from("true")
    }
}

/// Classify a slug as `false`, `test` or `true`; a slug is a test slug when
/// one of its `-`, `_` or `.` separated tokens is `test`.
pub fn is_slug_present_or_test(value: &Value) -> Value {
    let presence = is_string_present(value);
    let Some(slug) = value.as_str().filter(|_| presence == "true") else {
        return Value::from(presence);
    };
    let is_test = slug
        .trim()
        .split(['-', '_', '.'])
        .any(|token| token.eq_ignore_ascii_case("test"));
    Value::from(if is_test { "test" } else { "true" })
}

pub fn replace_regex_matches(value: Value, pattern: &Regex, replacement: &str) -> Result<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::String(s) => Ok(Value::String(pattern.replace_all(&s, replacement).into_owned())),
        other => Err(AnonymizerError::invalid_value(
            "replace_regex_matches_with_string",
            &other,
        )),
    }
}

/// Translate a replacement written with `\1` / `\g<name>` group references
/// into the `${1}` / `${name}` syntax of the regex crate. A literal `$`
/// stays literal.
pub fn translate_replacement(replacement: &str) -> String {
    let mut out = String::with_capacity(replacement.len());
    let mut chars = replacement.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '$' => out.push_str("$$"),
            '\\' => match chars.peek().copied() {
                Some(d) if d.is_ascii_digit() => {
                    let mut group = String::new();
                    while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                        group.push(d);
                        chars.next();
                    }
                    out.push_str(&format!("${{{}}}", group));
                }
                Some('g') => {
                    chars.next();
                    if chars.peek() == Some(&'<') {
                        chars.next();
                        let name: String = chars.by_ref().take_while(|&c| c != '>').collect();
                        out.push_str(&format!("${{{}}}", name));
                    } else {
                        out.push_str("\\g");
                    }
                }
                Some('n') => {
                    chars.next();
                    out.push('\n');
                }
                Some('t') => {
                    chars.next();
                    out.push('\t');
                }
                Some('\\') => {
                    chars.next();
                    out.push('\\');
                }
                _ => out.push('\\'),
            },
            other => out.push(other),
        }
    }
    out
}

/// Number of characters of a string or entries of a container; `0` for null.
pub fn convert_to_field_length(value: &Value) -> Result<Value> {
    match value {
        Value::Null => Ok(Value::from(0)),
        Value::String(s) => Ok(Value::from(s.chars().count())),
        Value::Array(items) => Ok(Value::from(items.len())),
        Value::Object(map) => Ok(Value::from(map.len())),
        other => Err(AnonymizerError::invalid_value("convert_to_field_length", other)),
    }
}

/// Text form of a value: strings unquoted, everything else as compact JSON.
pub fn coerce_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_ip() {
        assert_eq!(round_ip(json!("192.168.1.1")).unwrap(), json!("192.168.0.0"));
        assert_eq!(round_ip(json!("255.255.200.100")).unwrap(), json!("255.255.0.0"));
        assert_eq!(round_ip(Value::Null).unwrap(), Value::Null);
        assert_eq!(round_ip(json!("localhost")).unwrap(), Value::Null);
        assert!(round_ip(json!(17)).is_err());
    }

    #[test]
    fn test_round_float_to_integer() {
        assert_eq!(round_float_to_integer(json!(192.8)).unwrap(), json!(193));
        assert_eq!(round_float_to_integer(json!(0)).unwrap(), json!(0));
        assert_eq!(round_float_to_integer(json!(2.5)).unwrap(), json!(2));
        assert_eq!(round_float_to_integer(json!(-1.5)).unwrap(), json!(-2));
        assert_eq!(round_float_to_integer(Value::Null).unwrap(), Value::Null);
        assert!(round_float_to_integer(json!("1.5")).is_err());
    }

    #[test]
    fn test_round_float() {
        assert_eq!(round_float(json!(3.73), 1).unwrap(), json!(3.7));
        assert_eq!(round_float(json!(3.738), 2).unwrap(), json!(3.74));
        assert_eq!(round_float(json!(3.738), 0).unwrap(), json!(4.0));
        assert_eq!(round_float(json!(5.6372), 2).unwrap(), json!(5.64));
        assert_eq!(round_float(json!(1234.5), -2).unwrap(), json!(1200.0));
        assert_eq!(round_float(json!(3), 2).unwrap(), json!(3));
        assert_eq!(round_float(json!(1234), -2).unwrap(), json!(1200));
        assert_eq!(round_float(Value::Null, 2).unwrap(), Value::Null);
    }

    #[test]
    fn test_round_float_keeps_float_type() {
        let rounded = round_float(json!(3.0), 2).unwrap();
        assert!(rounded.is_f64());
        assert_eq!(rounded.to_string(), "3.0");
    }

    #[test]
    fn test_is_string_present() {
        assert_eq!(is_string_present(&json!("test")), "true");
        assert_eq!(is_string_present(&json!("")), "false");
        assert_eq!(is_string_present(&Value::Null), "false");
        assert_eq!(is_string_present(&json!("null")), "true");
        assert_eq!(is_string_present(&json!(" ")), "false");
        assert_eq!(is_string_present(&json!("false")), "true");
        assert_eq!(is_string_present(&json!(" a")), "true");
        assert_eq!(is_string_present(&json!(1)), "false");
    }

    #[test]
    fn test_is_number_present() {
        assert_eq!(is_number_present(&json!("test")), json!(0));
        assert_eq!(is_number_present(&json!(111)), json!(1));
        assert_eq!(is_number_present(&json!(7.6)), json!(1));
        assert_eq!(is_number_present(&json!(0)), json!(1));
        assert_eq!(is_number_present(&json!(-1)), json!(1));
        assert_eq!(is_number_present(&Value::Null), json!(0));
        assert_eq!(is_number_present(&json!(true)), json!(0));
    }

    #[test]
    fn test_is_email_present_or_test() {
        let domains = vec!["Testing.com".to_string()];
        assert_eq!(is_email_present_or_test(&json!("test"), &domains), json!("invalid"));
        assert_eq!(is_email_present_or_test(&Value::Null, &domains), json!("false"));
        assert_eq!(
            is_email_present_or_test(&json!("test@gmail.com"), &domains),
            json!("true")
        );
        assert_eq!(
            is_email_present_or_test(&json!("a@TESTING.com"), &domains),
            json!("test")
        );
        assert_eq!(is_email_present_or_test(&json!("a@testing.com"), &[]), json!("true"));
        assert_eq!(is_email_present_or_test(&json!("   "), &domains), json!("false"));
    }

    #[test]
    fn test_is_slug_present_or_test() {
        assert_eq!(is_slug_present_or_test(&Value::Null), json!("false"));
        assert_eq!(is_slug_present_or_test(&json!("")), json!("false"));
        assert_eq!(is_slug_present_or_test(&json!("morning-run")), json!("true"));
        assert_eq!(is_slug_present_or_test(&json!("test-user-42")), json!("test"));
        assert_eq!(is_slug_present_or_test(&json!("qa_TEST")), json!("test"));
        assert_eq!(is_slug_present_or_test(&json!("contest-winner")), json!("true"));
    }

    #[test]
    fn test_replace_regex_matches() {
        let guid =
            Regex::new("[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}").unwrap();
        let url = "https://www.testing.com/ru/user/5894e20e-a7af-471e-bf3f-042cd81b8ac6/dashboard";
        assert_eq!(
            replace_regex_matches(json!(url), &guid, "anonymized").unwrap(),
            json!("https://www.testing.com/ru/user/anonymized/dashboard")
        );
        assert_eq!(
            replace_regex_matches(Value::Null, &guid, "anonymized").unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_translate_replacement() {
        assert_eq!(translate_replacement("anonymized"), "anonymized");
        assert_eq!(translate_replacement(r"\1-x"), "${1}-x");
        assert_eq!(translate_replacement(r"\g<user>"), "${user}");
        assert_eq!(translate_replacement("cost $5"), "cost $$5");

        let re = Regex::new(r"(\w+)@(\w+)\.com").unwrap();
        let repl = translate_replacement(r"\1 at \2");
        assert_eq!(re.replace_all("joe@example.com", repl.as_str()), "joe at example");
    }

    #[test]
    fn test_convert_to_field_length() {
        assert_eq!(convert_to_field_length(&json!("hello")).unwrap(), json!(5));
        assert_eq!(convert_to_field_length(&json!("")).unwrap(), json!(0));
        assert_eq!(convert_to_field_length(&Value::Null).unwrap(), json!(0));
        assert_eq!(convert_to_field_length(&json!([1, 2, 3])).unwrap(), json!(3));
        assert_eq!(convert_to_field_length(&json!("héllo")).unwrap(), json!(5));
        assert!(convert_to_field_length(&json!(42)).is_err());
    }

    #[test]
    fn test_coerce_to_string() {
        assert_eq!(coerce_to_string(&json!("abc")), "abc");
        assert_eq!(coerce_to_string(&json!(1234567)), "1234567");
        assert_eq!(coerce_to_string(&json!(3.0)), "3.0");
        assert_eq!(coerce_to_string(&Value::Null), "null");
        assert_eq!(coerce_to_string(&json!(true)), "true");
    }
}
