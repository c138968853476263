//! # Document Stores
//!
//! The key-value document store the core reads from and writes to.
//!
//! - `get(id)` misses with `NotFound`, including for deleted documents
//! - `put(doc)` is revision checked: a live document must be written with
//!   its current `_rev`, otherwise the put fails with `Conflict`
//! - `put_all(docs)` writes several documents as one unit: if any of them
//!   fails its revision check, none is written
//! - `remove(id, rev)` leaves a tombstone; a later put may re-create the id
//! - `all_docs(range)` scans live documents in id order
//!
//! Two implementations ship with the crate: [`MemoryStore`] and the
//! disk-backed [`RedbStore`].

mod memory;
pub mod record;
mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::document::Document;
use crate::primitives::REV_KEY;
use crate::query::DocumentQuery;
use crate::types::{DocId, MureError, Revision};
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Outcome of a successful put.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutResult {
    pub id: DocId,
    pub rev: Revision,
}

/// Inclusive range of document ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdRange {
    start: String,
    end: String,
}

impl IdRange {
    /// Every id.
    #[must_use]
    pub fn all() -> Self {
        Self {
            start: String::new(),
            end: "\u{fff0}".to_string(),
        }
    }

    /// Ids starting with `prefix`.
    #[must_use]
    pub fn prefix(prefix: &str) -> Self {
        Self {
            start: prefix.to_string(),
            end: format!("{prefix}\u{fff0}"),
        }
    }

    /// Ids between `start` and `end`, both inclusive.
    #[must_use]
    pub fn between(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Lower bound.
    #[must_use]
    pub fn start(&self) -> &str {
        &self.start
    }

    /// Upper bound.
    #[must_use]
    pub fn end(&self) -> &str {
        &self.end
    }

    /// Whether `id` falls inside the range.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.start.as_str() <= id && id <= self.end.as_str()
    }
}

/// The document store collaborator.
pub trait DocumentStore {
    /// Fetch one live document.
    fn get(&self, id: &DocId) -> Result<Document, MureError>;

    /// Write a document, returning its new revision.
    fn put(&mut self, doc: &Document) -> Result<PutResult, MureError>;

    /// Write every document in `docs` or none of them. Ids must be distinct.
    fn put_all(&mut self, docs: &[Document]) -> Result<Vec<PutResult>, MureError>;

    /// Live documents whose ids fall in `range`, in id order.
    fn all_docs(&self, range: &IdRange) -> Result<Vec<Document>, MureError>;

    /// Soft-delete a live document.
    fn remove(&mut self, id: &DocId, rev: &Revision) -> Result<Revision, MureError>;

    /// Live documents matching `query`, in id order.
    ///
    /// The default scans every document; a query naming a single `_id`
    /// becomes a point lookup.
    fn find(&self, query: &DocumentQuery) -> Result<Vec<Document>, MureError> {
        if let Some(id) = query.id_equality() {
            let id = DocId::new(id)?;
            return match self.get(&id) {
                Ok(doc) => Ok(vec![doc]),
                Err(e) if e.is_not_found() => Ok(Vec::new()),
                Err(e) => Err(e),
            };
        }
        Ok(self
            .all_docs(&IdRange::all())?
            .into_iter()
            .filter(|doc| query.matches(doc.raw()))
            .collect())
    }
}

// =============================================================================
// REVISION CHECKS (shared by every store)
// =============================================================================

/// What a store currently holds under one id.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Existing<'a> {
    pub rev: &'a Revision,
    pub deleted: bool,
}

/// Check `doc`'s `_rev` against the stored state and produce the raw value
/// to store, carrying its new revision.
pub(crate) fn prepare_put(
    existing: Option<Existing<'_>>,
    doc: &Document,
) -> Result<(Revision, Value), MureError> {
    let incoming = doc.rev();
    let previous = match (existing, incoming.as_ref()) {
        (None, None) => None,
        (None, Some(rev)) => {
            return Err(MureError::Conflict(format!(
                "{} does not exist but was written with _rev {rev}",
                doc.id()
            )));
        }
        (Some(current), Some(rev)) if current.rev == rev => Some(current.rev),
        (Some(current), None) if current.deleted => Some(current.rev),
        (Some(current), _) => {
            return Err(MureError::Conflict(format!(
                "{} is at _rev {}, write was based on {}",
                doc.id(),
                current.rev,
                incoming.as_ref().map_or("nothing", Revision::as_str)
            )));
        }
    };

    let mut raw = doc.raw().clone();
    if let Value::Object(map) = &mut raw {
        map.shift_remove(REV_KEY);
    }
    let rev = Revision::next(previous, digest(&raw));
    if let Value::Object(map) = &mut raw {
        map.insert(REV_KEY.to_string(), Value::String(rev.as_str().to_string()));
    }
    Ok((rev, raw))
}

/// Check a removal against the stored state; returns the tombstone revision.
pub(crate) fn prepare_remove(
    id: &DocId,
    existing: Option<Existing<'_>>,
    rev: &Revision,
) -> Result<Revision, MureError> {
    match existing {
        Some(current) if !current.deleted && current.rev == rev => {
            Ok(Revision::next(Some(current.rev), digest(&Value::Null)))
        }
        Some(current) if !current.deleted => Err(MureError::Conflict(format!(
            "{id} is at _rev {}, delete was based on {rev}",
            current.rev
        ))),
        _ => Err(MureError::NotFound(format!("document {id}"))),
    }
}

fn digest(body: &Value) -> u64 {
    let mut hasher = DefaultHasher::new();
    body.to_string().hash(&mut hasher);
    hasher.finish()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_range_contains_only_prefixed_ids() {
        let range = IdRange::prefix("application/json;Untitled ");
        assert!(range.contains("application/json;Untitled 1"));
        assert!(range.contains("application/json;Untitled 10"));
        assert!(!range.contains("application/json;notes.json"));
        assert!(!range.contains("text/csv;Untitled 1"));
        assert!(IdRange::all().contains("anything"));
    }

    #[test]
    fn between_is_inclusive_on_both_ends() {
        let range = IdRange::between("application/json;b", "application/json;d");
        assert!(range.contains("application/json;b"));
        assert!(range.contains("application/json;c.json"));
        assert!(range.contains("application/json;d"));
        assert!(!range.contains("application/json;a.json"));
        assert!(!range.contains("application/json;d.json"));
    }
}
