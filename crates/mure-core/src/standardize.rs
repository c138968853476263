//! # Standardization
//!
//! Turns an arbitrary JSON document into its canonical shape:
//!
//! - the document carries `_id`, `mimeType`, `filename`, `charset` and the
//!   four reserved collections (`contents`, `classes`, `orphanNodes`,
//!   `orphanEdges`)
//! - every container carries `_id = "@" + path expression`
//! - arrays become objects keyed `"0".."n-1"` with `$wasArray: true`
//! - every container carries the reserved maps its variant requires
//! - every primitive has the raw JSON type of its variant
//!
//! Standardization is idempotent: standardizing a standardized document
//! returns it unchanged.

use crate::document::Document;
use crate::item::ItemType;
use crate::item::coerce::{
    array_to_object, date_value, is_date_object, number_value, parse_date_millis, to_js_string,
    to_number, truthy,
};
use crate::path::ItemPath;
use crate::primitives::{
    CHARSET_KEY, CLASSES_KEY, CONTENTS_KEY, DEFAULT_CHARSET, DEFAULT_MIME_TYPE, EDGES_KEY,
    FILENAME_KEY, ID_KEY, MEMBERS_KEY, MIME_TYPE_KEY, NODES_KEY, ORPHAN_EDGES_KEY,
    ORPHAN_NODES_KEY, REV_KEY, TAGS_KEY, UNTITLED_PREFIX, WAS_ARRAY_KEY, is_reserved_key,
};
use crate::selector::Selector;
use crate::store::{DocumentStore, IdRange};
use crate::types::{DocId, MureError, is_known_mime_type};
use serde_json::{Map, Value};

// =============================================================================
// OPTIONS
// =============================================================================

/// Knobs for a standardization pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StandardizeOptions {
    /// Enable heuristic promotion (date strings, array elements as nodes).
    pub aggressive: bool,
}

/// Hints for [`infer_type`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InferOptions {
    pub aggressive: bool,
    /// The value is an element of an array-like container.
    pub array_element: bool,
}

/// Where a value sits while it is being standardized.
#[derive(Debug, Clone)]
pub struct StandardizeContext<'a> {
    pub doc_id: &'a DocId,
    pub path: ItemPath,
    pub aggressive: bool,
}

impl StandardizeContext<'_> {
    fn child(&self, key: &str) -> Self {
        Self {
            doc_id: self.doc_id,
            path: self.path.child(key),
            aggressive: self.aggressive,
        }
    }
}

// =============================================================================
// TYPE INFERENCE
// =============================================================================

/// Pick the variant for a raw value.
///
/// Explicit markers win over everything else. Heuristics only run in
/// aggressive mode and only for values without markers.
#[must_use]
pub fn infer_type(raw: &Value, options: InferOptions) -> ItemType {
    match raw {
        Value::Null => ItemType::Null,
        Value::Bool(_) => ItemType::Boolean,
        Value::Number(_) => ItemType::Number,
        Value::String(s) => {
            if s.len() > 1 && s.starts_with('@') && Selector::is_selector(s) {
                ItemType::Reference
            } else if options.aggressive && parse_date_millis(s).is_some() {
                ItemType::Date
            } else {
                ItemType::String
            }
        }
        Value::Object(map) => {
            let has = |key: &str| map.contains_key(key);
            if is_date_object(raw) {
                ItemType::Date
            } else if has(NODES_KEY) {
                ItemType::Edge
            } else if has(EDGES_KEY) && has(MEMBERS_KEY) {
                ItemType::Supernode
            } else if has(EDGES_KEY) {
                ItemType::Node
            } else if has(MEMBERS_KEY) {
                ItemType::Set
            } else if has(TAGS_KEY) {
                ItemType::Taggable
            } else if options.aggressive && options.array_element {
                ItemType::Node
            } else {
                ItemType::Container
            }
        }
        Value::Array(_) => {
            if options.aggressive && options.array_element {
                ItemType::Node
            } else {
                ItemType::Container
            }
        }
    }
}

// =============================================================================
// VALUE STANDARDIZATION
// =============================================================================

/// Canonicalize `raw` as `item_type`.
pub fn standardize_value(item_type: ItemType, raw: Value, ctx: &StandardizeContext<'_>) -> Value {
    match item_type {
        ItemType::Boolean => match raw {
            Value::Bool(_) => raw,
            other => Value::Bool(truthy(&other)),
        },
        ItemType::Number => match raw {
            Value::Number(_) => raw,
            other => number_value(to_number(&other)),
        },
        ItemType::String | ItemType::Reference => match raw {
            Value::String(_) => raw,
            other => Value::String(to_js_string(&other)),
        },
        ItemType::Null => Value::Null,
        ItemType::Date => date_value(&raw),
        container => Value::Object(standardize_container(container, raw, ctx, None)),
    }
}

/// Canonicalize a container. `forced_child` overrides the inferred variant of
/// each child unless the inferred one already belongs to that family.
fn standardize_container(
    item_type: ItemType,
    raw: Value,
    ctx: &StandardizeContext<'_>,
    forced_child: Option<ItemType>,
) -> Map<String, Value> {
    let mut map = match raw {
        Value::Object(map) => map,
        Value::Array(items) => array_to_object(items),
        other => {
            tracing::warn!(
                doc = %ctx.doc_id,
                path = %ctx.path,
                found = %other,
                item_type = %item_type,
                "replacing non-container value with an empty container"
            );
            Map::new()
        }
    };

    map.insert(ID_KEY.to_string(), Value::String(ctx.path.local_id()));
    for field in item_type.required_fields() {
        if !map.get(*field).is_some_and(Value::is_object) {
            map.insert((*field).to_string(), Value::Object(Map::new()));
        }
    }

    let array_like = map.get(WAS_ARRAY_KEY) == Some(&Value::Bool(true));
    let keys: Vec<String> = map.keys().filter(|k| !is_reserved_key(k)).cloned().collect();
    for key in keys {
        let Some(slot) = map.get_mut(&key) else {
            continue;
        };
        let child = std::mem::take(slot);
        let inferred = infer_type(
            &child,
            InferOptions {
                aggressive: ctx.aggressive,
                array_element: array_like,
            },
        );
        let child_type = match forced_child {
            Some(family) => force_family(inferred, family),
            None => inferred,
        };
        *slot = standardize_value(child_type, child, &ctx.child(&key));
    }
    map
}

/// Keep `inferred` if it already has `family`'s capabilities, else use `family`.
fn force_family(inferred: ItemType, family: ItemType) -> ItemType {
    let fits = match family {
        ItemType::Set => inferred.is_set(),
        ItemType::Node => inferred.is_node(),
        ItemType::Edge => inferred.is_edge(),
        other => inferred == other,
    };
    if fits { inferred } else { family }
}

// =============================================================================
// DOCUMENT STANDARDIZATION
// =============================================================================

/// Canonicalize a whole raw document.
///
/// `store` is consulted only to number `Untitled N` filenames.
pub fn standardize_document(
    raw: Value,
    store: &impl DocumentStore,
    options: StandardizeOptions,
) -> Result<Document, MureError> {
    let Value::Object(mut map) = raw else {
        return Err(MureError::SerializationError(
            "a document must be a JSON object".to_string(),
        ));
    };

    let explicit_id = match map.get(ID_KEY) {
        Some(Value::String(id)) => Some(DocId::new(id.as_str())?),
        Some(other) => {
            return Err(MureError::InvalidIdentifier(format!(
                "document _id must be a string, got {other}"
            )));
        }
        None => None,
    };

    let field = |map: &Map<String, Value>, key: &str| {
        map.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let mime_type = explicit_id
        .as_ref()
        .and_then(|id| id.mime_type().map(str::to_string))
        .or_else(|| field(&map, MIME_TYPE_KEY))
        .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string())
        .to_lowercase();
    let filename = match explicit_id
        .as_ref()
        .map(|id| id.filename().to_string())
        .or_else(|| field(&map, FILENAME_KEY))
    {
        Some(name) => name,
        None => untitled_filename(store, &mime_type)?,
    };
    let id = DocId::from_parts(&mime_type, &filename)?;
    if !is_known_mime_type(&mime_type) {
        tracing::warn!(doc = %id, mime_type = %mime_type, "unknown mimeType");
    }
    let charset = field(&map, CHARSET_KEY).unwrap_or_else(|| DEFAULT_CHARSET.to_string());

    let ctx = |key: &str| StandardizeContext {
        doc_id: &id,
        path: ItemPath::from_keys([key]),
        aggressive: options.aggressive,
    };
    let mut take = |key: &str| map.shift_remove(key).unwrap_or_else(|| Value::Object(Map::new()));

    let contents = take(CONTENTS_KEY);
    let contents_type = match infer_type(&contents, InferOptions::default()) {
        kind if kind.is_container() => kind,
        _ => ItemType::Container,
    };
    let contents = standardize_value(contents_type, contents, &ctx(CONTENTS_KEY));
    let classes = standardize_container(
        ItemType::Container,
        take(CLASSES_KEY),
        &ctx(CLASSES_KEY),
        Some(ItemType::Set),
    );
    let orphan_nodes = standardize_container(
        ItemType::Container,
        take(ORPHAN_NODES_KEY),
        &ctx(ORPHAN_NODES_KEY),
        Some(ItemType::Node),
    );
    let orphan_edges = standardize_container(
        ItemType::Container,
        take(ORPHAN_EDGES_KEY),
        &ctx(ORPHAN_EDGES_KEY),
        Some(ItemType::Edge),
    );

    let mut out = Map::new();
    out.insert(ID_KEY.to_string(), Value::String(id.as_str().to_string()));
    if let Some(rev) = map.shift_remove(REV_KEY) {
        out.insert(REV_KEY.to_string(), rev);
    }
    out.insert(MIME_TYPE_KEY.to_string(), Value::String(mime_type));
    out.insert(FILENAME_KEY.to_string(), Value::String(filename));
    out.insert(CHARSET_KEY.to_string(), Value::String(charset));
    out.insert(CONTENTS_KEY.to_string(), contents);
    out.insert(CLASSES_KEY.to_string(), Value::Object(classes));
    out.insert(ORPHAN_NODES_KEY.to_string(), Value::Object(orphan_nodes));
    out.insert(ORPHAN_EDGES_KEY.to_string(), Value::Object(orphan_edges));
    for (key, value) in map {
        if !matches!(key.as_str(), ID_KEY | MIME_TYPE_KEY | FILENAME_KEY | CHARSET_KEY) {
            out.insert(key, value);
        }
    }

    tracing::debug!(doc = %id, aggressive = options.aggressive, "standardized document");
    Document::from_value(Value::Object(out))
}

/// `Untitled N` with N one past the highest existing number for `mime_type`.
pub fn untitled_filename(store: &impl DocumentStore, mime_type: &str) -> Result<String, MureError> {
    let prefix = format!("{};{UNTITLED_PREFIX}", mime_type.to_lowercase());
    let highest = store
        .all_docs(&IdRange::prefix(&prefix))?
        .iter()
        .filter_map(|doc| doc.id().as_str().strip_prefix(prefix.as_str())?.trim().parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    Ok(format!("{UNTITLED_PREFIX}{}", highest.saturating_add(1)))
}

// =============================================================================
// TESTS
// =============================================================================
