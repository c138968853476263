//! # Property-Based Tests
//!
//! Invariants of standardization, bookkeeping and conversion, checked with
//! proptest over generated documents.

use mure_core::graph;
use mure_core::primitives::WAS_ARRAY_KEY;
use mure_core::{
    DocId, Direction, Document, Item, ItemPath, ItemType, MemoryStore, MureError, Selector,
    StandardizeOptions, standardize_document,
};
use proptest::collection::{btree_map, btree_set, vec};
use proptest::prelude::*;
use serde_json::{Map, Value, json};

// =============================================================================
// STRATEGIES
// =============================================================================

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-1000i64..1000).prop_map(Value::from),
        "[a-z ]{0,8}".prop_map(Value::String),
    ]
}

fn json_value() -> impl Strategy<Value = Value> {
    leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            vec(inner.clone(), 0..4).prop_map(Value::Array),
            btree_map("[a-z]{1,4}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<String, Value>>())),
        ]
    })
}

/// Object keys as they occur in the wild: identifiers, digit runs of any
/// length, and arbitrary text with quotes, dots, brackets and wildcards.
fn path_key() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z_][a-zA-Z0-9_]{0,6}",
        "[0-9]{1,25}",
        "[.*\\[\\]'\",:$@ -]{0,6}",
        ".{0,8}",
    ]
}

fn standardize(raw: Value) -> Document {
    standardize_document(raw, &MemoryStore::new(), StandardizeOptions::default())
        .expect("standardize")
}

fn id() -> DocId {
    DocId::new("application/json;prop.json").expect("id")
}

/// A standardized document with `count` empty objects under `contents`.
fn with_objects(count: usize) -> (Document, Vec<Item>) {
    let contents: Map<String, Value> = (0..count).map(|i| (format!("n{i}"), json!({}))).collect();
    let doc = standardize(json!({ "_id": id().as_str(), "contents": contents }));
    let items = (0..count)
        .map(|i| {
            Item::infer(&doc, &id(), ItemPath::from_keys(["contents".to_string(), format!("n{i}")]))
                .expect("item")
        })
        .collect();
    (doc, items)
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Standardizing twice changes nothing.
    #[test]
    fn standardization_is_idempotent(contents in json_value()) {
        let once = standardize(json!({ "_id": id().as_str(), "contents": contents }));
        let twice = standardize(once.raw().clone());
        prop_assert_eq!(once.raw(), twice.raw());
    }

    /// Arrays become index-keyed objects flagged with `$wasArray`.
    #[test]
    fn arrays_are_canonicalized(items in vec(leaf(), 0..8)) {
        let doc = standardize(json!({ "_id": id().as_str(), "contents": { "list": items.clone() } }));
        let list = doc.raw()["contents"]["list"].as_object().expect("object");
        prop_assert_eq!(list.get(WAS_ARRAY_KEY), Some(&Value::Bool(true)));
        for (i, item) in items.iter().enumerate() {
            prop_assert_eq!(list.get(&i.to_string()), Some(item));
        }
        prop_assert!(list.get(&items.len().to_string()).is_none());
    }

    /// An item is in a set exactly when the set lists it as a member.
    #[test]
    fn tags_and_members_stay_symmetric(
        names in btree_set("[a-z]{1,5}", 1..5),
        removed in any::<prop::sample::Index>(),
    ) {
        let (mut doc, items) = with_objects(1);
        let item = &items[0];
        let names: Vec<String> = names.into_iter().collect();
        for name in &names {
            graph::add_class(&mut doc, item, name).expect("class");
        }
        let gone = removed.get(&names).clone();
        graph::remove_class(&mut doc, item, &gone).expect("remove");

        let selector = item.unique_selector();
        let tagged = graph::sets(&doc, item).expect("sets");
        for name in &names {
            let class = Item::infer(&doc, &id(), ItemPath::from_keys(["classes", name.as_str()]))
                .expect("class");
            let member = graph::members(&doc, &class).expect("members").contains(&selector);
            let tag = tagged.contains(&class.unique_selector());
            prop_assert_eq!(member, tag);
            prop_assert_eq!(member, name != &gone);
        }
    }

    /// Every link is visible from both ends with the right direction.
    #[test]
    fn links_round_trip(pairs in vec((0usize..4, 0usize..4), 1..8)) {
        let (mut doc, items) = with_objects(4);
        for (from, to) in pairs {
            let a = &items[from];
            let b = &items[to];
            let edge = graph::link_to(&mut doc, a, b, None, Direction::Source).expect("link");
            let edge_selector = edge.unique_selector();

            prop_assert!(graph::edge_selectors(&doc, a).expect("a edges").contains(&edge_selector));
            prop_assert!(graph::edge_selectors(&doc, b).expect("b edges").contains(&edge_selector));
            prop_assert!(graph::node_selectors(&doc, &edge, Some(false)).expect("sources").contains(&a.unique_selector()));
            prop_assert!(graph::node_selectors(&doc, &edge, Some(true)).expect("targets").contains(&b.unique_selector()));
        }
    }

    /// A unique selector parses back to the document and path it names.
    #[test]
    fn unique_selectors_round_trip(keys in vec(path_key(), 0..5)) {
        let path = ItemPath::from_keys(keys);
        let rendered = path.unique_selector(&id());
        let parsed = Selector::parse(&rendered).expect("parse");
        prop_assert_eq!(parsed.as_unique_path(), Some((id(), path)));
    }

    /// Every declared conversion succeeds; undeclared ones are refused; a
    /// variant converted to itself is unchanged.
    #[test]
    fn conversion_table_is_total(index in 2usize..ItemType::ALL.len()) {
        let from = ItemType::ALL[index];
        let path = ItemPath::from_keys(["contents", "x"]);
        for target in ItemType::ALL {
            let mut doc = standardize(json!({ "_id": id().as_str() }));
            doc.set(&path, from.boilerplate_value()).expect("set");
            let item = Item::new(&doc, &id(), path.clone(), from).expect("item");
            let before = doc.raw().clone();
            let result = item.convert_to(&mut doc, target);
            if target == from {
                prop_assert_eq!(result.expect("identity"), item.clone());
                prop_assert_eq!(doc.raw(), &before);
            } else if from.can_convert_to(target) && target == ItemType::Reference {
                // boilerplate text is never a selector
                prop_assert!(matches!(result, Err(MureError::InvalidSelector(_))));
                prop_assert_eq!(doc.raw(), &before);
            } else if from.can_convert_to(target) {
                let converted = result.expect("declared conversion");
                prop_assert_eq!(converted.item_type(), target);
                prop_assert!(Item::new(&doc, &id(), path.clone(), target).is_ok());
            } else {
                prop_assert!(result.is_err());
            }
        }
    }
}
