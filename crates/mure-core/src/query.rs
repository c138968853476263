//! # Document Queries
//!
//! The store query carried by an absolute selector's `@{...}` clause and by
//! `DocumentStore::find`. It is a small Mango-like matcher over the raw
//! document tree:
//!
//! ```text
//! {"_id": "application/json;f.json"}              field equality
//! {"mimeType": {"$in": ["text/csv", "text/plain"]}}
//! {"contents.title": {"$regex": "^Draft"}}        dotted field path
//! {"$or": [{"filename": "a"}, {"filename": "b"}]}
//! ```
//!
//! A `{"selector": {...}}` wrapper is accepted and unwrapped.

use crate::primitives::ID_KEY;
use crate::types::{DocId, MureError};
use regex::Regex;
use serde_json::{Map, Value, json};
use std::cmp::Ordering;
use std::fmt;

/// A parsed store query.
#[derive(Debug, Clone)]
pub struct DocumentQuery {
    source: Value,
    condition: Condition,
}

#[derive(Debug, Clone)]
enum Condition {
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Field { path: Vec<String>, ops: Vec<FieldOp> },
}

#[derive(Debug, Clone)]
enum FieldOp {
    Eq(Value),
    Ne(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Exists(bool),
    Regex(Regex),
    Compare(Ordering, bool, Value),
}

impl DocumentQuery {
    /// Parse a query object.
    pub fn from_value(value: Value) -> Result<Self, MureError> {
        let source = match value {
            Value::Object(mut map) if map.len() == 1 && map.get("selector").is_some_and(Value::is_object) => {
                map.remove("selector").unwrap_or_default()
            }
            other => other,
        };
        let Value::Object(map) = &source else {
            return Err(MureError::InvalidSelector(format!(
                "document query must be an object, got {source}"
            )));
        };
        let condition = parse_object(map)?;
        Ok(Self { source, condition })
    }

    /// Parse query text.
    pub fn parse(text: &str) -> Result<Self, MureError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| MureError::InvalidSelector(format!("document query: {e}")))?;
        Self::from_value(value)
    }

    /// Match exactly one document id.
    #[must_use]
    pub fn by_id(id: &DocId) -> Self {
        Self {
            source: json!({ ID_KEY: id.as_str() }),
            condition: Condition::And(vec![Condition::Field {
                path: vec![ID_KEY.to_string()],
                ops: vec![FieldOp::Eq(Value::String(id.as_str().to_string()))],
            }]),
        }
    }

    /// The query as written.
    #[must_use]
    pub fn source(&self) -> &Value {
        &self.source
    }

    /// If the query is a plain `{"_id": "..."}` equality, the id it names.
    #[must_use]
    pub fn id_equality(&self) -> Option<&str> {
        let Condition::And(parts) = &self.condition else {
            return None;
        };
        match parts.as_slice() {
            [Condition::Field { path, ops }] if path.len() == 1 && path[0] == ID_KEY => {
                match ops.as_slice() {
                    [FieldOp::Eq(Value::String(id))] => Some(id.as_str()),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Whether a raw document satisfies the query.
    #[must_use]
    pub fn matches(&self, raw: &Value) -> bool {
        self.condition.matches(raw)
    }
}

impl fmt::Display for DocumentQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

// =============================================================================
// PARSING
// =============================================================================

fn parse_object(map: &Map<String, Value>) -> Result<Condition, MureError> {
    let mut parts = Vec::with_capacity(map.len());
    for (key, value) in map {
        match key.as_str() {
            "$and" | "$or" => {
                let branches = value
                    .as_array()
                    .ok_or_else(|| MureError::InvalidSelector(format!("{key} expects an array")))?
                    .iter()
                    .map(|branch| {
                        branch
                            .as_object()
                            .ok_or_else(|| {
                                MureError::InvalidSelector(format!("{key} branches must be objects"))
                            })
                            .and_then(parse_object)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                parts.push(if key == "$and" {
                    Condition::And(branches)
                } else {
                    Condition::Or(branches)
                });
            }
            op if op.starts_with('$') => {
                return Err(MureError::InvalidSelector(format!(
                    "unknown top-level operator {op}"
                )));
            }
            field => parts.push(Condition::Field {
                path: field.split('.').map(str::to_string).collect(),
                ops: parse_ops(value)?,
            }),
        }
    }
    Ok(Condition::And(parts))
}

fn parse_ops(value: &Value) -> Result<Vec<FieldOp>, MureError> {
    let operators = match value {
        Value::Object(map) if !map.is_empty() && map.keys().all(|k| k.starts_with('$')) => map,
        other => return Ok(vec![FieldOp::Eq(other.clone())]),
    };
    operators
        .iter()
        .map(|(op, arg)| {
            Ok(match op.as_str() {
                "$eq" => FieldOp::Eq(arg.clone()),
                "$ne" => FieldOp::Ne(arg.clone()),
                "$in" => FieldOp::In(array_arg(op, arg)?),
                "$nin" => FieldOp::Nin(array_arg(op, arg)?),
                "$exists" => FieldOp::Exists(arg.as_bool().ok_or_else(|| {
                    MureError::InvalidSelector("$exists expects a boolean".to_string())
                })?),
                "$regex" => {
                    let pattern = arg.as_str().ok_or_else(|| {
                        MureError::InvalidSelector("$regex expects a string".to_string())
                    })?;
                    FieldOp::Regex(
                        Regex::new(pattern)
                            .map_err(|e| MureError::InvalidSelector(format!("$regex: {e}")))?,
                    )
                }
                "$gt" => FieldOp::Compare(Ordering::Greater, false, arg.clone()),
                "$gte" => FieldOp::Compare(Ordering::Greater, true, arg.clone()),
                "$lt" => FieldOp::Compare(Ordering::Less, false, arg.clone()),
                "$lte" => FieldOp::Compare(Ordering::Less, true, arg.clone()),
                other => {
                    return Err(MureError::InvalidSelector(format!(
                        "unknown field operator {other}"
                    )));
                }
            })
        })
        .collect()
}

fn array_arg(op: &str, arg: &Value) -> Result<Vec<Value>, MureError> {
    arg.as_array()
        .cloned()
        .ok_or_else(|| MureError::InvalidSelector(format!("{op} expects an array")))
}

// =============================================================================
// MATCHING
// =============================================================================

impl Condition {
    fn matches(&self, raw: &Value) -> bool {
        match self {
            Self::And(parts) => parts.iter().all(|part| part.matches(raw)),
            Self::Or(parts) => parts.iter().any(|part| part.matches(raw)),
            Self::Field { path, ops } => {
                let field = path
                    .iter()
                    .try_fold(raw, |value, key| value.as_object().and_then(|m| m.get(key)));
                ops.iter().all(|op| op.matches(field))
            }
        }
    }
}

impl FieldOp {
    fn matches(&self, field: Option<&Value>) -> bool {
        match (self, field) {
            (Self::Exists(expected), _) => field.is_some() == *expected,
            (Self::Ne(expected), None) => !expected.is_null(),
            (Self::Nin(_), None) => true,
            (_, None) => false,
            (Self::Eq(expected), Some(value)) => loosely_equal(value, expected),
            (Self::Ne(expected), Some(value)) => !loosely_equal(value, expected),
            (Self::In(options), Some(value)) => options.iter().any(|o| loosely_equal(value, o)),
            (Self::Nin(options), Some(value)) => !options.iter().any(|o| loosely_equal(value, o)),
            (Self::Regex(re), Some(value)) => value.as_str().is_some_and(|s| re.is_match(s)),
            (Self::Compare(direction, inclusive, bound), Some(value)) => {
                match compare(value, bound) {
                    Some(Ordering::Equal) => *inclusive,
                    Some(ordering) => ordering == *direction,
                    None => false,
                }
            }
        }
    }
}

/// Equality that treats `1` and `1.0` as the same number.
fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Value {
        json!({
            "_id": "application/json;a.json",
            "mimeType": "application/json",
            "filename": "a.json",
            "contents": { "title": "Draft plan", "size": 3 }
        })
    }

    #[test]
    fn equality_on_id() {
        let query = DocumentQuery::parse(r#"{"_id":"application/json;a.json"}"#).expect("parse");
        assert!(query.matches(&doc()));
        assert_eq!(query.id_equality(), Some("application/json;a.json"));

        let miss = DocumentQuery::parse(r#"{"_id":"application/json;b.json"}"#).expect("parse");
        assert!(!miss.matches(&doc()));
    }

    #[test]
    fn operators_and_dotted_fields() {
        let query = DocumentQuery::parse(
            r#"{"contents.title":{"$regex":"^Draft"},"contents.size":{"$gte":3,"$lt":4}}"#,
        )
        .expect("parse");
        assert!(query.matches(&doc()));
        assert_eq!(query.id_equality(), None);

        let query = DocumentQuery::parse(r#"{"mimeType":{"$in":["text/csv","application/json"]}}"#)
            .expect("parse");
        assert!(query.matches(&doc()));

        let query = DocumentQuery::parse(r#"{"charset":{"$exists":false}}"#).expect("parse");
        assert!(query.matches(&doc()));
    }

    #[test]
    fn or_branches() {
        let query =
            DocumentQuery::parse(r#"{"$or":[{"filename":"zzz"},{"filename":"a.json"}]}"#)
                .expect("parse");
        assert!(query.matches(&doc()));
    }

    #[test]
    fn selector_wrapper_is_unwrapped() {
        let query =
            DocumentQuery::parse(r#"{"selector":{"filename":"a.json"}}"#).expect("parse");
        assert!(query.matches(&doc()));
        assert_eq!(query.source(), &json!({ "filename": "a.json" }));
    }

    #[test]
    fn malformed_queries_are_rejected() {
        assert!(DocumentQuery::parse("[1]").is_err());
        assert!(DocumentQuery::parse(r#"{"a":{"$bogus":1}}"#).is_err());
        assert!(DocumentQuery::parse(r#"{"a":{"$regex":"("}}"#).is_err());
        assert!(DocumentQuery::parse(r#"{"$nor":[]}"#).is_err());
    }

    #[test]
    fn numbers_compare_loosely() {
        let query = DocumentQuery::parse(r#"{"contents.size":3.0}"#).expect("parse");
        assert!(query.matches(&doc()));
    }
}
