//! Reserved relation maps stored on items.
//!
//! - `$tags`    set selector  -> `true`   (every Taggable)
//! - `$members` item selector -> `true`   (every Set)
//! - `$edges`   edge selector -> `true`   (every Node)
//! - `$nodes`   node selector -> `{source|target|undirected: count}` (every Edge)
//!
//! These helpers only touch one object at a time. Keeping both sides of a
//! relation consistent is the graph layer's job.

use crate::primitives::{EDGES_KEY, MEMBERS_KEY, NODES_KEY, TAGS_KEY};
use crate::types::Direction;
use serde_json::{Map, Value};

/// Run `f` against the reserved map under `key`, creating it if needed.
fn with_reserved_map<R>(
    obj: &mut Map<String, Value>,
    key: &str,
    f: impl FnOnce(&mut Map<String, Value>) -> R,
) -> R {
    let slot = obj
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(map) = slot {
        return f(map);
    }
    let mut map = Map::new();
    let result = f(&mut map);
    *slot = Value::Object(map);
    result
}

// =============================================================================
// FLAG MAPS ($tags, $members, $edges)
// =============================================================================

/// A selector -> `true` map stored under one reserved key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bookkeeping {
    key: &'static str,
}

impl Bookkeeping {
    /// Set memberships of a Taggable.
    pub const TAGS: Self = Self { key: TAGS_KEY };
    /// Members of a Set.
    pub const MEMBERS: Self = Self { key: MEMBERS_KEY };
    /// Edges of a Node.
    pub const EDGES: Self = Self { key: EDGES_KEY };

    /// Record `selector`. Returns `false` if it was already present.
    pub fn add(self, obj: &mut Map<String, Value>, selector: &str) -> bool {
        with_reserved_map(obj, self.key, |map| {
            map.insert(selector.to_string(), Value::Bool(true)) != Some(Value::Bool(true))
        })
    }

    /// Forget `selector`. Returns `true` if it was present.
    pub fn remove(self, obj: &mut Map<String, Value>, selector: &str) -> bool {
        match obj.get_mut(self.key).and_then(Value::as_object_mut) {
            Some(map) => map.shift_remove(selector).is_some(),
            None => false,
        }
    }

    /// Whether `selector` is recorded as `true`.
    #[must_use]
    pub fn contains(self, obj: &Map<String, Value>, selector: &str) -> bool {
        obj.get(self.key)
            .and_then(|map| map.get(selector))
            .is_some_and(|flag| flag == &Value::Bool(true))
    }

    /// Recorded selectors, in insertion order.
    #[must_use]
    pub fn selectors(self, obj: &Map<String, Value>) -> Vec<String> {
        obj.get(self.key)
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter(|(_, flag)| *flag == &Value::Bool(true))
                    .map(|(selector, _)| selector.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

// =============================================================================
// DIRECTION RECORDS ($nodes)
// =============================================================================

/// The `$nodes` map of an Edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRecords;

impl NodeRecords {
    /// Add one occurrence of `direction` for `node_selector`; returns the new count.
    pub fn increment(obj: &mut Map<String, Value>, node_selector: &str, direction: Direction) -> u64 {
        with_reserved_map(obj, NODES_KEY, |nodes| {
            let record = nodes
                .entry(node_selector.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !record.is_object() {
                *record = Value::Object(Map::new());
            }
            let mut count = 0;
            if let Value::Object(record) = record {
                count = record
                    .get(direction.as_str())
                    .and_then(Value::as_u64)
                    .unwrap_or(0)
                    .saturating_add(1);
                record.insert(direction.as_str().to_string(), Value::from(count));
            }
            count
        })
    }

    /// Forget `node_selector` entirely. Returns `true` if it was present.
    pub fn remove(obj: &mut Map<String, Value>, node_selector: &str) -> bool {
        match obj.get_mut(NODES_KEY).and_then(Value::as_object_mut) {
            Some(nodes) => nodes.shift_remove(node_selector).is_some(),
            None => false,
        }
    }

    /// Recorded count of `direction` for `node_selector`.
    #[must_use]
    pub fn count(obj: &Map<String, Value>, node_selector: &str, direction: Direction) -> u64 {
        obj.get(NODES_KEY)
            .and_then(|nodes| nodes.get(node_selector))
            .and_then(|record| record.get(direction.as_str()))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }

    /// Node selectors filtered by direction.
    ///
    /// `None` returns every node, `Some(true)` the targets and `Some(false)`
    /// the sources. Undirected endpoints match both directions.
    #[must_use]
    pub fn selectors(obj: &Map<String, Value>, forward: Option<bool>) -> Vec<String> {
        let Some(nodes) = obj.get(NODES_KEY).and_then(Value::as_object) else {
            return Vec::new();
        };
        nodes
            .iter()
            .filter(|(selector, _)| match forward {
                None => true,
                Some(true) => Self::has(obj, selector, Direction::Target),
                Some(false) => Self::has(obj, selector, Direction::Source),
            })
            .map(|(selector, _)| selector.clone())
            .collect()
    }

    /// Whether `node_selector` counts as `direction` (undirected counts as both).
    #[must_use]
    pub fn has(obj: &Map<String, Value>, node_selector: &str, direction: Direction) -> bool {
        Self::count(obj, node_selector, direction) > 0
            || Self::count(obj, node_selector, Direction::Undirected) > 0
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn flags_add_and_remove() {
        let mut obj = object(json!({}));
        assert!(Bookkeeping::TAGS.add(&mut obj, "@$.classes.a"));
        assert!(!Bookkeeping::TAGS.add(&mut obj, "@$.classes.a"));
        assert!(Bookkeeping::TAGS.contains(&obj, "@$.classes.a"));
        assert_eq!(Bookkeeping::TAGS.selectors(&obj), vec!["@$.classes.a"]);

        assert!(Bookkeeping::TAGS.remove(&mut obj, "@$.classes.a"));
        assert!(!Bookkeeping::TAGS.remove(&mut obj, "@$.classes.a"));
        assert!(Bookkeeping::TAGS.selectors(&obj).is_empty());
    }

    #[test]
    fn malformed_reserved_map_is_replaced() {
        let mut obj = object(json!({ "$members": [1, 2] }));
        Bookkeeping::MEMBERS.add(&mut obj, "x");
        assert_eq!(obj["$members"], json!({ "x": true }));
    }

    #[test]
    fn node_records_count_parallel_edges() {
        let mut obj = object(json!({ "$nodes": {} }));
        assert_eq!(NodeRecords::increment(&mut obj, "a", Direction::Source), 1);
        assert_eq!(NodeRecords::increment(&mut obj, "a", Direction::Source), 2);
        assert_eq!(NodeRecords::increment(&mut obj, "b", Direction::Target), 1);
        assert_eq!(NodeRecords::count(&obj, "a", Direction::Source), 2);
        assert_eq!(NodeRecords::count(&obj, "a", Direction::Target), 0);
    }

    #[test]
    fn node_records_filter_by_direction() {
        let mut obj = object(json!({}));
        NodeRecords::increment(&mut obj, "s", Direction::Source);
        NodeRecords::increment(&mut obj, "t", Direction::Target);
        NodeRecords::increment(&mut obj, "u", Direction::Undirected);

        assert_eq!(NodeRecords::selectors(&obj, None), vec!["s", "t", "u"]);
        assert_eq!(NodeRecords::selectors(&obj, Some(true)), vec!["t", "u"]);
        assert_eq!(NodeRecords::selectors(&obj, Some(false)), vec!["s", "u"]);

        assert!(NodeRecords::remove(&mut obj, "u"));
        assert_eq!(NodeRecords::selectors(&obj, Some(true)), vec!["t"]);
    }
}
