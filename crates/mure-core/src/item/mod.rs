//! # Items
//!
//! An `Item` is a typed view over one location in a document:
//! `(document id, path, variant)`. It never holds a reference into the tree.
//! Reads and writes go through a [`DocumentAccess`] owner, and writing a
//! value always lands in the parent's slot.
//!
//! Two synthetic variants exist: `Root` (the whole store, no document) and
//! `Document` (a whole document, empty path).

pub mod bookkeeping;
pub mod coerce;
mod kind;

pub use kind::ItemType;

use crate::document::DocumentAccess;
use crate::path::ItemPath;
use crate::primitives::{IS_DATE_KEY, is_reserved_key};
use crate::selector::Selector;
use crate::standardize::{InferOptions, infer_type};
use crate::types::{DocId, MureError};
use serde_json::{Map, Value};
use std::fmt;

/// A typed, addressable location.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Item {
    doc: Option<DocId>,
    path: ItemPath,
    item_type: ItemType,
}

impl Item {
    // =========================================================================
    // CONSTRUCTION
    // =========================================================================

    /// The store root.
    #[must_use]
    pub fn root() -> Self {
        Self {
            doc: None,
            path: ItemPath::root(),
            item_type: ItemType::Root,
        }
    }

    /// A whole document.
    #[must_use]
    pub fn document(id: DocId) -> Self {
        Self {
            doc: Some(id),
            path: ItemPath::root(),
            item_type: ItemType::Document,
        }
    }

    /// Build an item of an explicit variant.
    ///
    /// Fails with `StructuralPrecondition` when the raw value at `path` does
    /// not have the shape `item_type` requires (for example a Node without
    /// `$edges`), and with `NotFound` when nothing lives at `path`.
    pub fn new(
        docs: &impl DocumentAccess,
        doc: &DocId,
        path: ItemPath,
        item_type: ItemType,
    ) -> Result<Self, MureError> {
        match item_type {
            ItemType::Root => return Ok(Self::root()),
            ItemType::Document => {
                docs.document(doc)?;
                return Ok(Self::document(doc.clone()));
            }
            _ => {}
        }
        let value = docs
            .document(doc)?
            .get(&path)
            .ok_or_else(|| MureError::NotFound(path.unique_selector(doc)))?;
        check_shape(item_type, value, &path)?;
        Ok(Self {
            doc: Some(doc.clone()),
            path,
            item_type,
        })
    }

    /// Build an item whose variant is inferred from its raw value.
    pub fn infer(
        docs: &impl DocumentAccess,
        doc: &DocId,
        path: ItemPath,
    ) -> Result<Self, MureError> {
        if path.is_root() {
            return Self::new(docs, doc, path, ItemType::Document);
        }
        let value = docs
            .document(doc)?
            .get(&path)
            .ok_or_else(|| MureError::NotFound(path.unique_selector(doc)))?;
        let item_type = infer_type(value, InferOptions::default());
        Ok(Self {
            doc: Some(doc.clone()),
            path,
            item_type,
        })
    }

    /// Resolve a unique selector (`@{"_id":"..."}$.a.b`) to its item.
    pub fn from_unique_selector(
        docs: &impl DocumentAccess,
        selector: &str,
    ) -> Result<Self, MureError> {
        let parsed = Selector::parse(selector)?;
        let (doc, path) = parsed.as_unique_path().ok_or_else(|| {
            MureError::InvalidSelector(format!("{selector} does not name a single item"))
        })?;
        Self::infer(docs, &doc, path)
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Owning document, `None` for the root.
    #[must_use]
    pub fn doc_id(&self) -> Option<&DocId> {
        self.doc.as_ref()
    }

    /// Path inside the owning document.
    #[must_use]
    pub fn path(&self) -> &ItemPath {
        &self.path
    }

    /// Variant.
    #[must_use]
    pub fn item_type(&self) -> ItemType {
        self.item_type
    }

    /// Key under the parent. Documents are labelled by their id.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        match (&self.doc, self.item_type) {
            (Some(doc), ItemType::Document) => Some(doc.as_str()),
            _ => self.path.label(),
        }
    }

    /// The stable id stored under `_id`.
    #[must_use]
    pub fn local_id(&self) -> String {
        self.path.local_id()
    }

    /// Canonical address of this item across the whole store.
    #[must_use]
    pub fn unique_selector(&self) -> String {
        match &self.doc {
            Some(doc) => self.path.unique_selector(doc),
            None => "@".to_string(),
        }
    }

    fn require_doc(&self) -> Result<&DocId, MureError> {
        self.doc
            .as_ref()
            .ok_or_else(|| MureError::NotFound("the root item has no raw value".to_string()))
    }

    /// The raw value, read through `docs`.
    pub fn value<'a>(&self, docs: &'a impl DocumentAccess) -> Result<&'a Value, MureError> {
        let doc = self.require_doc()?;
        docs.document(doc)?
            .get(&self.path)
            .ok_or_else(|| MureError::NotFound(self.unique_selector()))
    }

    /// The raw object of a container item.
    pub fn object<'a>(
        &self,
        docs: &'a impl DocumentAccess,
    ) -> Result<&'a Map<String, Value>, MureError> {
        self.value(docs)?.as_object().ok_or_else(|| MureError::StructuralPrecondition {
            item_type: self.item_type,
            field: "object",
            path: self.path.to_expression(),
        })
    }

    /// The raw object of a container item, mutably.
    pub fn object_mut<'a>(
        &self,
        docs: &'a mut impl DocumentAccess,
    ) -> Result<&'a mut Map<String, Value>, MureError> {
        let doc = self.require_doc()?.clone();
        let item_type = self.item_type;
        let expression = self.path.to_expression();
        docs.document_mut(&doc)?
            .get_mut(&self.path)
            .ok_or_else(|| MureError::NotFound(self.path.unique_selector(&doc)))?
            .as_object_mut()
            .ok_or(MureError::StructuralPrecondition {
                item_type,
                field: "object",
                path: expression,
            })
    }

    /// Replace the raw value. The write lands in the parent's slot.
    pub fn set_value(&self, docs: &mut impl DocumentAccess, value: Value) -> Result<(), MureError> {
        let doc = self.require_doc()?;
        docs.document_mut(doc)?.set(&self.path, value)
    }

    /// The containing item. The root has none; a document's parent is the root.
    pub fn parent(&self, docs: &impl DocumentAccess) -> Result<Option<Self>, MureError> {
        match self.item_type {
            ItemType::Root => Ok(None),
            ItemType::Document => Ok(Some(Self::root())),
            _ => {
                let doc = self.require_doc()?;
                match self.path.parent() {
                    Some(parent) => Self::infer(docs, doc, parent).map(Some),
                    None => Ok(None),
                }
            }
        }
    }

    /// Non-reserved children in key order. Primitives have none.
    pub fn children(&self, docs: &impl DocumentAccess) -> Result<Vec<Self>, MureError> {
        if self.item_type.is_primitive() || self.item_type == ItemType::Root {
            return Ok(Vec::new());
        }
        let doc = self.require_doc()?;
        let keys: Vec<String> = match self.value(docs)? {
            Value::Object(map) => map
                .keys()
                .filter(|key| !is_reserved_key(key))
                .cloned()
                .collect(),
            Value::Array(items) => (0..items.len()).map(|i| i.to_string()).collect(),
            _ => Vec::new(),
        };
        keys.into_iter()
            .map(|key| Self::infer(docs, doc, self.path.child(key)))
            .collect()
    }

    // =========================================================================
    // CONVERSION
    // =========================================================================

    /// Convert to `target`, writing the converted raw value back.
    ///
    /// Same-variant conversion returns an equal item and leaves the tree
    /// untouched.
    pub fn convert_to(
        &self,
        docs: &mut impl DocumentAccess,
        target: ItemType,
    ) -> Result<Self, MureError> {
        if target == self.item_type {
            return Ok(self.clone());
        }
        if !self.item_type.can_convert_to(target) {
            return Err(MureError::ConversionUnsupported {
                from: self.item_type,
                to: target,
            });
        }
        let raw = self.value(docs)?.clone();
        let converted = coerce::convert_value(self.item_type, target, raw)?;
        self.set_value(docs, converted)?;
        tracing::debug!(
            item = %self.unique_selector(),
            from = %self.item_type,
            to = %target,
            "converted item"
        );
        Ok(Self {
            item_type: target,
            ..self.clone()
        })
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.item_type, self.unique_selector())
    }
}

fn check_shape(item_type: ItemType, value: &Value, path: &ItemPath) -> Result<(), MureError> {
    let missing = |field: &'static str| MureError::StructuralPrecondition {
        item_type,
        field,
        path: path.to_expression(),
    };
    let ok = match item_type {
        ItemType::Boolean => value.is_boolean(),
        ItemType::Number => value.is_number(),
        ItemType::String | ItemType::Reference => value.is_string(),
        ItemType::Null => value.is_null(),
        ItemType::Date => {
            if !coerce::is_date_object(value) {
                return Err(missing(IS_DATE_KEY));
            }
            true
        }
        ItemType::Container => value.is_object() || value.is_array(),
        _ => {
            let Some(map) = value.as_object() else {
                return Err(missing(
                    item_type.required_fields().first().copied().unwrap_or("object"),
                ));
            };
            if let Some(field) = item_type
                .required_fields()
                .iter()
                .find(|field| !map.get(**field).is_some_and(Value::is_object))
            {
                return Err(missing(*field));
            }
            true
        }
    };
    if ok {
        Ok(())
    } else {
        Err(missing(json_kind(item_type)))
    }
}

fn json_kind(item_type: ItemType) -> &'static str {
    match item_type {
        ItemType::Boolean => "boolean",
        ItemType::Number => "number",
        ItemType::String | ItemType::Reference => "string",
        ItemType::Null => "null",
        _ => "object",
    }
}

// =============================================================================
// TESTS
// =============================================================================
