//! # Document Trees
//!
//! A `Document` owns one raw JSON tree. Every item is addressed by
//! `(DocId, ItemPath)` and resolves through a `DocumentAccess` owner, so no
//! two items ever alias the same memory.
//!
//! `DocumentSet` holds the documents one operation touches and remembers
//! which of them were mutated, so the session only writes those back.

use crate::path::ItemPath;
use crate::primitives::{ID_KEY, REV_KEY};
use crate::types::{DocId, MureError, Revision};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// DOCUMENT
// =============================================================================

/// One document: its id and its owned raw tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    id: DocId,
    raw: Value,
}

impl Document {
    /// Wrap a raw tree. The root must be an object carrying a valid `_id`.
    pub fn from_value(raw: Value) -> Result<Self, MureError> {
        let id = raw
            .get(ID_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| MureError::InvalidIdentifier("document has no _id".to_string()))?;
        let id = DocId::new(id)?;
        if !raw.is_object() {
            return Err(MureError::SerializationError(
                "document root must be an object".to_string(),
            ));
        }
        Ok(Self { id, raw })
    }

    /// The document id.
    #[must_use]
    pub fn id(&self) -> &DocId {
        &self.id
    }

    /// The store revision, if the document has been stored.
    #[must_use]
    pub fn rev(&self) -> Option<Revision> {
        self.raw.get(REV_KEY).and_then(Value::as_str).map(Revision::new)
    }

    /// Record the revision assigned by the store.
    pub fn set_rev(&mut self, rev: &Revision) {
        if let Value::Object(map) = &mut self.raw {
            map.insert(REV_KEY.to_string(), Value::String(rev.as_str().to_string()));
        }
    }

    /// The raw tree.
    #[must_use]
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Consume into the raw tree.
    #[must_use]
    pub fn into_raw(self) -> Value {
        self.raw
    }

    /// Resolve a path. Object keys are looked up by name, arrays by index.
    #[must_use]
    pub fn get(&self, path: &ItemPath) -> Option<&Value> {
        path.keys()
            .iter()
            .try_fold(&self.raw, |value, key| step(value, key))
    }

    /// Resolve a path mutably.
    pub fn get_mut(&mut self, path: &ItemPath) -> Option<&mut Value> {
        path.keys()
            .iter()
            .try_fold(&mut self.raw, |value, key| step_mut(value, key))
    }

    /// Write `value` into the slot named by `path`.
    ///
    /// The parent must already exist. Object parents gain the key if it is
    /// missing; array parents only accept existing indices. The root itself
    /// cannot be replaced.
    pub fn set(&mut self, path: &ItemPath, value: Value) -> Result<(), MureError> {
        let (Some(parent_path), Some(label)) = (path.parent(), path.label()) else {
            return Err(MureError::InvalidIdentifier(
                "the document root cannot be replaced through an item".to_string(),
            ));
        };
        let label = label.to_string();
        let doc = self.id.clone();
        let parent = self
            .get_mut(&parent_path)
            .ok_or_else(|| MureError::NotFound(parent_path.unique_selector(&doc)))?;
        match parent {
            Value::Object(map) => {
                map.insert(label, value);
                Ok(())
            }
            Value::Array(items) => {
                let slot = label
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| items.get_mut(index))
                    .ok_or_else(|| MureError::NotFound(path.unique_selector(&doc)))?;
                *slot = value;
                Ok(())
            }
            _ => Err(MureError::NotFound(path.unique_selector(&doc))),
        }
    }

    /// Remove the value at `path` from its parent object.
    pub fn remove(&mut self, path: &ItemPath) -> Option<Value> {
        let parent_path = path.parent()?;
        let label = path.label()?.to_string();
        match self.get_mut(&parent_path)? {
            Value::Object(map) => map.shift_remove(&label),
            _ => None,
        }
    }

    /// The object at `path`, if there is one.
    #[must_use]
    pub fn object(&self, path: &ItemPath) -> Option<&Map<String, Value>> {
        self.get(path).and_then(Value::as_object)
    }

    /// The object at `path`, mutably.
    pub fn object_mut(&mut self, path: &ItemPath) -> Option<&mut Map<String, Value>> {
        self.get_mut(path).and_then(Value::as_object_mut)
    }
}

fn step<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn step_mut<'a>(value: &'a mut Value, key: &str) -> Option<&'a mut Value> {
    match value {
        Value::Object(map) => map.get_mut(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get_mut(i)),
        _ => None,
    }
}

// =============================================================================
// DOCUMENT ACCESS
// =============================================================================

/// Owner through which items read and write their documents.
pub trait DocumentAccess {
    /// Borrow a loaded document.
    fn document(&self, id: &DocId) -> Result<&Document, MureError>;

    /// Borrow a loaded document for writing.
    fn document_mut(&mut self, id: &DocId) -> Result<&mut Document, MureError>;
}

impl DocumentAccess for Document {
    fn document(&self, id: &DocId) -> Result<&Document, MureError> {
        if &self.id == id {
            Ok(self)
        } else {
            Err(MureError::NotFound(format!("document {id} is not loaded")))
        }
    }

    fn document_mut(&mut self, id: &DocId) -> Result<&mut Document, MureError> {
        if &self.id == id {
            Ok(self)
        } else {
            Err(MureError::NotFound(format!("document {id} is not loaded")))
        }
    }
}

/// The documents loaded for one operation.
#[derive(Debug, Clone, Default)]
pub struct DocumentSet {
    docs: BTreeMap<DocId, Document>,
    dirty: BTreeSet<DocId>,
}

impl DocumentSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a loaded document.
    pub fn insert(&mut self, doc: Document) {
        self.docs.insert(doc.id().clone(), doc);
    }

    /// Whether `id` is loaded.
    #[must_use]
    pub fn contains(&self, id: &DocId) -> bool {
        self.docs.contains_key(id)
    }

    /// Consume the set, returning the documents that were borrowed mutably.
    #[must_use]
    pub fn into_dirty(self) -> Vec<Document> {
        let Self { mut docs, dirty } = self;
        dirty.iter().filter_map(|id| docs.remove(id)).collect()
    }
}

impl DocumentAccess for DocumentSet {
    fn document(&self, id: &DocId) -> Result<&Document, MureError> {
        self.docs
            .get(id)
            .ok_or_else(|| MureError::NotFound(format!("document {id} is not loaded")))
    }

    fn document_mut(&mut self, id: &DocId) -> Result<&mut Document, MureError> {
        let doc = self
            .docs
            .get_mut(id)
            .ok_or_else(|| MureError::NotFound(format!("document {id} is not loaded")))?;
        self.dirty.insert(id.clone());
        Ok(doc)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Document {
        Document::from_value(json!({
            "_id": "application/json;t.json",
            "contents": { "a": 1, "list": [10, 20] }
        }))
        .expect("doc")
    }

    #[test]
    fn from_value_requires_id() {
        assert!(Document::from_value(json!({ "contents": {} })).is_err());
        assert!(Document::from_value(json!({ "_id": "_bad" })).is_err());
    }

    #[test]
    fn get_walks_objects_and_arrays() {
        let doc = sample();
        assert_eq!(
            doc.get(&ItemPath::from_keys(["contents", "a"])),
            Some(&json!(1))
        );
        assert_eq!(
            doc.get(&ItemPath::from_keys(["contents", "list", "1"])),
            Some(&json!(20))
        );
        assert_eq!(doc.get(&ItemPath::from_keys(["contents", "zzz"])), None);
    }

    #[test]
    fn set_writes_through_parent() {
        let mut doc = sample();
        doc.set(&ItemPath::from_keys(["contents", "b"]), json!(true))
            .expect("set");
        assert_eq!(
            doc.get(&ItemPath::from_keys(["contents", "b"])),
            Some(&json!(true))
        );

        doc.set(&ItemPath::from_keys(["contents", "list", "0"]), json!(5))
            .expect("set");
        assert_eq!(doc.raw()["contents"]["list"], json!([5, 20]));

        assert!(doc.set(&ItemPath::root(), json!({})).is_err());
        assert!(doc
            .set(&ItemPath::from_keys(["missing", "x"]), json!(1))
            .is_err());
    }

    #[test]
    fn document_set_tracks_mutations() {
        let mut set = DocumentSet::new();
        let doc = sample();
        let id = doc.id().clone();
        set.insert(doc);

        assert!(set.document(&id).is_ok());
        assert!(set.clone().into_dirty().is_empty());

        set.document_mut(&id).expect("loaded");
        assert_eq!(set.into_dirty().len(), 1);
    }

    #[test]
    fn revision_round_trip() {
        let mut doc = sample();
        assert!(doc.rev().is_none());
        doc.set_rev(&Revision::new("1-00"));
        assert_eq!(doc.rev().map(|r| r.generation()), Some(1));
    }
}
