//! Raw value conversion between item variants.
//!
//! Primitive conversions follow JavaScript's `Boolean()`, `Number()` and
//! `String()` coercions. Dates travel as `{"$isDate": true, "str": ...}` so
//! they stay JSON round-trippable; numeric coercion of a Date parses its
//! string into epoch milliseconds.

use super::ItemType;
use crate::primitives::{DATE_STR_KEY, IS_DATE_KEY, WAS_ARRAY_KEY};
use crate::selector::Selector;
use crate::types::MureError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::{json, Map, Number, Value};

/// Largest integer magnitude stored as a JSON integer.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Convert a raw value of variant `from` into the raw shape of `to`.
///
/// The caller has already checked `from.can_convert_to(to)`.
pub(crate) fn convert_value(from: ItemType, to: ItemType, value: Value) -> Result<Value, MureError> {
    if to.is_container() {
        return attach_required_fields(from, to, value);
    }
    Ok(match to {
        ItemType::Boolean => Value::Bool(truthy(&value)),
        ItemType::Number => number_value(to_number(&value)),
        ItemType::String => Value::String(to_js_string(&value)),
        ItemType::Reference => Value::String(reference_text(to_js_string(&value))?),
        ItemType::Date => date_value(&value),
        ItemType::Null => Value::Null,
        _ => return Err(MureError::ConversionUnsupported { from, to }),
    })
}

/// A Reference holds an absolute selector; anything else stays a String.
fn reference_text(text: String) -> Result<String, MureError> {
    if text.len() > 1 && text.starts_with('@') && Selector::is_selector(&text) {
        return Ok(text);
    }
    Err(MureError::InvalidSelector(format!(
        "{text:?} is not an absolute selector and cannot become a Reference"
    )))
}

fn attach_required_fields(from: ItemType, to: ItemType, value: Value) -> Result<Value, MureError> {
    let mut map = match value {
        Value::Object(map) => map,
        Value::Array(items) => array_to_object(items),
        _ => return Err(MureError::ConversionUnsupported { from, to }),
    };
    for field in to.required_fields() {
        let present = map.get(*field).is_some_and(Value::is_object);
        if !present {
            map.insert((*field).to_string(), Value::Object(Map::new()));
        }
    }
    Ok(Value::Object(map))
}

/// Canonical object form of an array: index keys plus `$wasArray: true`.
#[must_use]
pub fn array_to_object(items: Vec<Value>) -> Map<String, Value> {
    let mut map: Map<String, Value> = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| (index.to_string(), item))
        .collect();
    map.insert(WAS_ARRAY_KEY.to_string(), Value::Bool(true));
    map
}

// =============================================================================
// JAVASCRIPT-STYLE COERCION
// =============================================================================

/// `Boolean(value)`.
#[must_use]
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// `Number(value)`. Non-numeric input yields NaN.
#[must_use]
pub fn to_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => parse_js_number(s),
        Value::Object(_) if is_date_object(value) => {
            let text = date_string_of(value);
            parse_date_millis(text)
                .map(|ms| ms as f64)
                .unwrap_or_else(|| parse_js_number(text))
        }
        Value::Array(_) | Value::Object(_) => f64::NAN,
    }
}

fn parse_js_number(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ => {
            if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
                return i64::from_str_radix(hex, 16).map_or(f64::NAN, |n| n as f64);
            }
            // Rust accepts "inf"/"nan" spellings JavaScript does not.
            if trimmed.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
                return f64::NAN;
            }
            trimmed.parse::<f64>().unwrap_or(f64::NAN)
        }
    }
}

/// `String(value)`.
#[must_use]
pub fn to_js_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n
            .as_f64()
            .map_or_else(|| n.to_string(), js_number_string),
        Value::String(s) => s.clone(),
        Value::Object(_) if is_date_object(value) => date_string_of(value).to_string(),
        Value::Array(items) => items.iter().map(to_js_string).collect::<Vec<_>>().join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Format a float the way JavaScript prints numbers.
#[must_use]
pub fn js_number_string(f: f64) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if f == 0.0 {
        // -0 prints as "0"
        return "0".to_string();
    }
    let magnitude = f.abs();
    if (1e-6..1e21).contains(&magnitude) {
        // shortest round-trip digits, zero padded
        return format!("{f}");
    }
    let text = format!("{f:e}");
    match text.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{mantissa}e+{exponent}")
        }
        _ => text,
    }
}

/// Store a float as a JSON number. NaN and infinities are not JSON; they
/// become `0`.
#[must_use]
pub fn number_value(f: f64) -> Value {
    if !f.is_finite() {
        tracing::warn!(value = %f, "non-finite number coerced to 0");
        return json!(0);
    }
    if f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER {
        return json!(f as i64);
    }
    Number::from_f64(f).map_or_else(|| json!(0), Value::Number)
}

// =============================================================================
// DATES
// =============================================================================

/// Whether `value` is the canonical Date object.
#[must_use]
pub fn is_date_object(value: &Value) -> bool {
    value.get(IS_DATE_KEY).is_some_and(|v| v == &Value::Bool(true))
}

fn date_string_of(value: &Value) -> &str {
    value.get(DATE_STR_KEY).and_then(Value::as_str).unwrap_or("")
}

/// Build the canonical Date object for `text` (kept verbatim).
#[must_use]
pub fn date_object(text: impl Into<String>) -> Value {
    json!({ IS_DATE_KEY: true, DATE_STR_KEY: text.into() })
}

pub(crate) fn date_value(value: &Value) -> Value {
    if is_date_object(value) {
        return date_object(date_string_of(value));
    }
    let text = match value {
        Value::Number(n) => n
            .as_f64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms as i64).single())
            .map(format_date)
            .unwrap_or_default(),
        Value::String(s) => normalize_date_string(s),
        other => to_js_string(other),
    };
    date_object(text)
}

/// Parse RFC 3339, `YYYY-MM-DDTHH:MM:SS` or `YYYY-MM-DD` into epoch millis.
#[must_use]
pub fn parse_date_millis(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc().timestamp_millis());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis())
}

/// Reformat a parseable date string as RFC 3339 UTC; other text is kept.
#[must_use]
pub fn normalize_date_string(text: &str) -> String {
    parse_date_millis(text)
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .map_or_else(|| text.to_string(), format_date)
}

fn format_date(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_coercion_matches_javascript() {
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("")));
        assert!(!truthy(&Value::Null));
        assert!(truthy(&json!("false")));
        assert!(truthy(&json!(-1.5)));
        assert!(truthy(&date_object("2020-01-01")));
    }

    #[test]
    fn number_coercion_matches_javascript() {
        assert_eq!(to_number(&json!(true)), 1.0);
        assert_eq!(to_number(&json!("  42 ")), 42.0);
        assert_eq!(to_number(&json!("")), 0.0);
        assert_eq!(to_number(&json!("0x1f")), 31.0);
        assert!(to_number(&json!("abc")).is_nan());
        assert!(to_number(&json!("inf")).is_nan());
        assert_eq!(to_number(&Value::Null), 0.0);
    }

    #[test]
    fn string_coercion_matches_javascript() {
        assert_eq!(to_js_string(&json!(3.0)), "3");
        assert_eq!(to_js_string(&json!(2.5)), "2.5");
        assert_eq!(to_js_string(&json!(false)), "false");
        assert_eq!(to_js_string(&Value::Null), "null");
        assert_eq!(to_js_string(&date_object("x")), "x");
    }

    #[test]
    fn large_and_tiny_numbers_print_like_javascript() {
        assert_eq!(to_js_string(&json!(1e20)), "100000000000000000000");
        assert_eq!(js_number_string(9_223_372_036_854_775_808.0), "9223372036854776000");
        assert_eq!(js_number_string(-123_456_789_012.0), "-123456789012");
        assert_eq!(js_number_string(1e21), "1e+21");
        assert_eq!(js_number_string(-2.5e25), "-2.5e+25");
        assert_eq!(js_number_string(1.5e-7), "1.5e-7");
        assert_eq!(js_number_string(0.000_001), "0.000001");
        assert_eq!(js_number_string(-0.0), "0");
        assert_eq!(js_number_string(0.1), "0.1");
    }

    #[test]
    fn only_selectors_become_references() {
        let reference = convert_value(
            ItemType::String,
            ItemType::Reference,
            json!(r#"@{"_id":"application/json;f.json"}$.contents.a"#),
        )
        .expect("selector text");
        assert_eq!(reference, json!(r#"@{"_id":"application/json;f.json"}$.contents.a"#));

        for text in ["plain words", "", "@", "$.contents.a", "@{broken"] {
            let err = convert_value(ItemType::String, ItemType::Reference, json!(text))
                .expect_err(text);
            assert!(matches!(err, MureError::InvalidSelector(_)), "{text:?}");
        }
    }

    #[test]
    fn non_finite_numbers_are_stored_as_zero() {
        assert_eq!(number_value(f64::NAN), json!(0));
        assert_eq!(number_value(f64::INFINITY), json!(0));
        assert_eq!(number_value(7.0), json!(7));
        assert_eq!(number_value(0.5), json!(0.5));
    }

    #[test]
    fn dates_convert_to_epoch_millis() {
        let date = date_object("1970-01-02");
        assert_eq!(to_number(&date), 86_400_000.0);
        let date = convert_value(ItemType::Number, ItemType::Date, json!(0)).expect("convert");
        assert_eq!(date, date_object("1970-01-01T00:00:00.000Z"));
    }

    #[test]
    fn date_normalization_is_stable() {
        let once = normalize_date_string("2021-03-04");
        assert_eq!(once, "2021-03-04T00:00:00.000Z");
        assert_eq!(normalize_date_string(&once), once);
        assert_eq!(normalize_date_string("not a date"), "not a date");
    }

    #[test]
    fn container_conversion_attaches_fields() {
        let node = convert_value(ItemType::Container, ItemType::Node, json!({ "a": 1 }))
            .expect("convert");
        assert_eq!(node, json!({ "a": 1, "$tags": {}, "$edges": {} }));
        assert!(convert_value(ItemType::Number, ItemType::Node, json!(1)).is_err());
    }

    #[test]
    fn arrays_become_canonical_objects() {
        let map = array_to_object(vec![json!("a"), json!("b")]);
        assert_eq!(
            Value::Object(map),
            json!({ "0": "a", "1": "b", "$wasArray": true })
        );
    }
}
