//! # Graph Relationships
//!
//! Node/edge linking and set membership over items.
//!
//! Every relation is stored on both ends, keyed by unique selectors:
//!
//! ```text
//! node.$edges[edge]             = true
//! edge.$nodes[node][direction] += 1
//! set.$members[item]            = true
//! item.$tags[set]               = true
//! ```
//!
//! The functions here always write both ends. They work on any
//! [`DocumentAccess`] owner; when the two ends live in different documents
//! the owner must have both loaded.

use crate::document::DocumentAccess;
use crate::item::bookkeeping::{Bookkeeping, NodeRecords};
use crate::item::{Item, ItemType};
use crate::path::ItemPath;
use crate::primitives::{CLASSES_KEY, ID_KEY, ORPHAN_EDGES_KEY, ORPHAN_NODES_KEY, is_reserved_key};
use crate::selector::Selector;
use crate::types::{DocId, Direction, MureError};
use serde_json::{Map, Value};

// =============================================================================
// COLLECTIONS
// =============================================================================

/// The top-level collection `key` of `doc`, created if missing.
fn ensure_collection(
    docs: &mut impl DocumentAccess,
    doc: &DocId,
    key: &str,
) -> Result<Item, MureError> {
    let path = ItemPath::from_keys([key]);
    let document = docs.document_mut(doc)?;
    let present = document.get(&path).is_some_and(Value::is_object);
    if !present {
        let mut map = Map::new();
        map.insert(ID_KEY.to_string(), Value::String(path.local_id()));
        document.set(&path, Value::Object(map))?;
    }
    Item::infer(docs, doc, path)
}

/// One past the highest integer key of a container (0 when there is none).
fn next_free_key(container: &Map<String, Value>) -> String {
    container
        .keys()
        .filter(|key| !is_reserved_key(key))
        .filter_map(|key| key.parse::<u64>().ok())
        .max()
        .map_or(0, |highest| highest.saturating_add(1))
        .to_string()
}

/// Insert `item_type`'s boilerplate under the next free key of `container`.
fn insert_new(
    docs: &mut impl DocumentAccess,
    container: &Item,
    item_type: ItemType,
) -> Result<Item, MureError> {
    if matches!(container.item_type(), ItemType::Root | ItemType::Document)
        || container.item_type().is_primitive()
    {
        return Err(MureError::InvalidIdentifier(format!(
            "cannot create a {item_type} directly inside a {}",
            container.item_type()
        )));
    }
    let doc = container
        .doc_id()
        .cloned()
        .ok_or_else(|| MureError::NotFound("container has no document".to_string()))?;
    let object = container.object_mut(docs)?;
    let key = next_free_key(object);
    let path = container.path().child(key.as_str());

    let mut value = item_type.boilerplate_value();
    if let Value::Object(map) = &mut value {
        map.insert(ID_KEY.to_string(), Value::String(path.local_id()));
    }
    object.insert(key, value);
    Item::new(docs, &doc, path, item_type)
}

/// Convert `item` into the node family if it is not already there.
pub fn ensure_node(docs: &mut impl DocumentAccess, item: &Item) -> Result<Item, MureError> {
    match item.item_type() {
        kind if kind.is_node() => Ok(item.clone()),
        ItemType::Set => item.convert_to(docs, ItemType::Supernode),
        _ => item.convert_to(docs, ItemType::Node),
    }
}

fn ensure_set(docs: &mut impl DocumentAccess, item: &Item) -> Result<Item, MureError> {
    match item.item_type() {
        kind if kind.is_set() => Ok(item.clone()),
        ItemType::Node => item.convert_to(docs, ItemType::Supernode),
        _ => item.convert_to(docs, ItemType::Set),
    }
}

fn ensure_taggable(docs: &mut impl DocumentAccess, item: &Item) -> Result<Item, MureError> {
    if item.item_type().is_taggable() {
        Ok(item.clone())
    } else {
        item.convert_to(docs, ItemType::Taggable)
    }
}

// =============================================================================
// LINKING
// =============================================================================

/// Create an edge between `a` and `b`.
///
/// The edge goes under the next free integer key of `container`, or of
/// `a`'s document's `orphanEdges` when no container is given. `a` is
/// recorded with `direction` and `b` with its opposite. Endpoints that are
/// not nodes yet are converted first.
pub fn link_to(
    docs: &mut impl DocumentAccess,
    a: &Item,
    b: &Item,
    container: Option<&Item>,
    direction: Direction,
) -> Result<Item, MureError> {
    let a = ensure_node(docs, a)?;
    let b = ensure_node(docs, b)?;
    let container = match container {
        Some(container) => container.clone(),
        None => {
            let doc = a
                .doc_id()
                .cloned()
                .ok_or_else(|| MureError::NotFound("endpoint has no document".to_string()))?;
            ensure_collection(docs, &doc, ORPHAN_EDGES_KEY)?
        }
    };
    let edge = insert_new(docs, &container, ItemType::Edge)?;

    let edge_selector = edge.unique_selector();
    let a_selector = a.unique_selector();
    let b_selector = b.unique_selector();

    Bookkeeping::EDGES.add(a.object_mut(docs)?, &edge_selector);
    Bookkeeping::EDGES.add(b.object_mut(docs)?, &edge_selector);
    let record = edge.object_mut(docs)?;
    NodeRecords::increment(record, &a_selector, direction);
    NodeRecords::increment(record, &b_selector, direction.opposite());

    tracing::debug!(
        edge = %edge_selector,
        a = %a_selector,
        b = %b_selector,
        direction = %direction,
        "linked nodes"
    );
    Ok(edge)
}

/// Node selectors recorded on `edge`.
///
/// `None` returns all of them, `Some(true)` the targets and `Some(false)`
/// the sources. Undirected endpoints match both.
pub fn node_selectors(
    docs: &impl DocumentAccess,
    edge: &Item,
    forward: Option<bool>,
) -> Result<Vec<String>, MureError> {
    Ok(NodeRecords::selectors(edge.object(docs)?, forward))
}

/// Edge selectors recorded on `node`.
pub fn edge_selectors(docs: &impl DocumentAccess, node: &Item) -> Result<Vec<String>, MureError> {
    Ok(Bookkeeping::EDGES.selectors(node.object(docs)?))
}

/// The edges of `node`, resolved.
pub fn connected_edges(docs: &impl DocumentAccess, node: &Item) -> Result<Vec<Item>, MureError> {
    edge_selectors(docs, node)?
        .iter()
        .map(|selector| Item::from_unique_selector(docs, selector))
        .collect()
}

/// Nodes sharing an edge with `node`, filtered by their direction on that
/// edge. `node` itself is skipped.
pub fn connected_nodes(
    docs: &impl DocumentAccess,
    node: &Item,
    forward: Option<bool>,
) -> Result<Vec<Item>, MureError> {
    let own = node.unique_selector();
    let mut seen = Vec::new();
    for edge in connected_edges(docs, node)? {
        for selector in node_selectors(docs, &edge, forward)? {
            if selector != own && !seen.contains(&selector) {
                seen.push(selector);
            }
        }
    }
    seen.iter()
        .map(|selector| Item::from_unique_selector(docs, selector))
        .collect()
}

/// One source/target pair of an edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointPair {
    pub source: String,
    pub target: String,
    pub directed: bool,
}

/// Every endpoint pair of `edge`: each source with each target, plus each
/// pair of undirected endpoints.
pub fn endpoint_pairs(docs: &impl DocumentAccess, edge: &Item) -> Result<Vec<EndpointPair>, MureError> {
    let record = edge.object(docs)?;
    let all = NodeRecords::selectors(record, None);
    let with = |direction: Direction| -> Vec<&String> {
        all.iter()
            .filter(|s| NodeRecords::count(record, s, direction) > 0)
            .collect()
    };
    let sources = with(Direction::Source);
    let targets = with(Direction::Target);
    let undirected = with(Direction::Undirected);

    let mut pairs = Vec::new();
    for source in &sources {
        for target in &targets {
            pairs.push(EndpointPair {
                source: (*source).clone(),
                target: (*target).clone(),
                directed: true,
            });
        }
    }
    if let [only] = undirected.as_slice() {
        // a self loop
        pairs.push(EndpointPair {
            source: (*only).clone(),
            target: (*only).clone(),
            directed: false,
        });
    }
    for (i, first) in undirected.iter().enumerate() {
        for second in undirected.iter().skip(i + 1) {
            pairs.push(EndpointPair {
                source: (*first).clone(),
                target: (*second).clone(),
                directed: false,
            });
        }
    }
    Ok(pairs)
}

// =============================================================================
// SETS AND CLASSES
// =============================================================================

/// Put `item` into `set`, converting either side as needed.
///
/// Returns the (possibly converted) item and set.
pub fn add_to_set(
    docs: &mut impl DocumentAccess,
    item: &Item,
    set: &Item,
) -> Result<(Item, Item), MureError> {
    let set = ensure_set(docs, set)?;
    let item = if item.unique_selector() == set.unique_selector() {
        set.clone()
    } else {
        ensure_taggable(docs, item)?
    };
    let item_selector = item.unique_selector();
    let set_selector = set.unique_selector();
    Bookkeeping::MEMBERS.add(set.object_mut(docs)?, &item_selector);
    Bookkeeping::TAGS.add(item.object_mut(docs)?, &set_selector);
    Ok((item, set))
}

/// Take `item` out of `set`. Both ends are cleared, or neither is when
/// one end is missing or not an object.
pub fn remove_from_set(
    docs: &mut impl DocumentAccess,
    item: &Item,
    set: &Item,
) -> Result<(), MureError> {
    set.object(docs)?;
    item.object(docs)?;
    let item_selector = item.unique_selector();
    let set_selector = set.unique_selector();
    Bookkeeping::MEMBERS.remove(set.object_mut(docs)?, &item_selector);
    Bookkeeping::TAGS.remove(item.object_mut(docs)?, &set_selector);
    Ok(())
}

fn class_path(name: &str) -> Result<ItemPath, MureError> {
    if name.is_empty() || is_reserved_key(name) {
        return Err(MureError::InvalidIdentifier(format!(
            "{name:?} is not a valid class name"
        )));
    }
    Ok(ItemPath::from_keys([CLASSES_KEY, name]))
}

/// Tag `item` with class `name`, creating `classes[name]` in the item's
/// document if needed. Returns the class set.
pub fn add_class(docs: &mut impl DocumentAccess, item: &Item, name: &str) -> Result<Item, MureError> {
    let path = class_path(name)?;
    let doc = item
        .doc_id()
        .cloned()
        .ok_or_else(|| MureError::InvalidIdentifier("the root cannot be classed".to_string()))?;
    ensure_collection(docs, &doc, CLASSES_KEY)?;
    let missing = docs.document(&doc)?.get(&path).is_none();
    if missing {
        let mut value = ItemType::Set.boilerplate_value();
        if let Value::Object(map) = &mut value {
            map.insert(ID_KEY.to_string(), Value::String(path.local_id()));
        }
        docs.document_mut(&doc)?.set(&path, value)?;
        tracing::debug!(doc = %doc, class = name, "created class");
    }
    let class = Item::infer(docs, &doc, path)?;
    let (_, class) = add_to_set(docs, item, &class)?;
    Ok(class)
}

/// Remove class `name` from `item`. The class set itself stays.
pub fn remove_class(docs: &mut impl DocumentAccess, item: &Item, name: &str) -> Result<(), MureError> {
    let path = class_path(name)?;
    let Some(doc) = item.doc_id().cloned() else {
        return Ok(());
    };
    if docs.document(&doc)?.get(&path).is_none() {
        return Ok(());
    }
    let class = Item::infer(docs, &doc, path)?;
    remove_from_set(docs, item, &class)
}

/// Names of the classes (in the item's own document) `item` is tagged with.
pub fn class_names(docs: &impl DocumentAccess, item: &Item) -> Result<Vec<String>, MureError> {
    let Some(own_doc) = item.doc_id() else {
        return Ok(Vec::new());
    };
    Ok(sets(docs, item)?
        .iter()
        .filter_map(|selector| Selector::parse(selector).ok()?.as_unique_path())
        .filter(|(doc, path)| {
            doc == own_doc && path.len() == 2 && path.keys().first().map(String::as_str) == Some(CLASSES_KEY)
        })
        .filter_map(|(_, path)| path.label().map(str::to_string))
        .collect())
}

/// Selectors of the sets `item` belongs to.
pub fn sets(docs: &impl DocumentAccess, item: &Item) -> Result<Vec<String>, MureError> {
    match item.value(docs)? {
        Value::Object(map) => Ok(Bookkeeping::TAGS.selectors(map)),
        _ => Ok(Vec::new()),
    }
}

/// Selectors of the members of `set`.
pub fn members(docs: &impl DocumentAccess, set: &Item) -> Result<Vec<String>, MureError> {
    Ok(Bookkeeping::MEMBERS.selectors(set.object(docs)?))
}

/// Add an empty Node to `doc`'s `orphanNodes`.
pub fn create_orphan_node(docs: &mut impl DocumentAccess, doc: &DocId) -> Result<Item, MureError> {
    let orphans = ensure_collection(docs, doc, ORPHAN_NODES_KEY)?;
    insert_new(docs, &orphans, ItemType::Node)
}

// =============================================================================
// TESTS
// =============================================================================
