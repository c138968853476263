//! In-memory document store.

use super::{DocumentStore, Existing, IdRange, PutResult, prepare_put, prepare_remove};
use crate::document::Document;
use crate::types::{DocId, MureError, Revision};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct Entry {
    rev: Revision,
    deleted: bool,
    raw: Value,
}

/// A `DocumentStore` held entirely in memory.
///
/// Documents are kept in a `BTreeMap` so scans come back in id order.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<DocId, Entry>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.values().filter(|e| !e.deleted).count()
    }

    /// Whether the store holds no live documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn existing(&self, id: &DocId) -> Option<Existing<'_>> {
        self.entries.get(id).map(|entry| Existing {
            rev: &entry.rev,
            deleted: entry.deleted,
        })
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, id: &DocId) -> Result<Document, MureError> {
        match self.entries.get(id) {
            Some(entry) if !entry.deleted => Document::from_value(entry.raw.clone()),
            Some(_) => Err(MureError::NotFound(format!("document {id} (deleted)"))),
            None => Err(MureError::NotFound(format!("document {id}"))),
        }
    }

    fn put(&mut self, doc: &Document) -> Result<PutResult, MureError> {
        self.put_all(std::slice::from_ref(doc))?
            .pop()
            .ok_or_else(|| MureError::IoError(format!("no result for {}", doc.id())))
    }

    fn put_all(&mut self, docs: &[Document]) -> Result<Vec<PutResult>, MureError> {
        let prepared = docs
            .iter()
            .map(|doc| prepare_put(self.existing(doc.id()), doc).map(|ready| (doc.id().clone(), ready)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(prepared
            .into_iter()
            .map(|(id, (rev, raw))| {
                self.entries.insert(
                    id.clone(),
                    Entry {
                        rev: rev.clone(),
                        deleted: false,
                        raw,
                    },
                );
                PutResult { id, rev }
            })
            .collect())
    }

    fn all_docs(&self, range: &IdRange) -> Result<Vec<Document>, MureError> {
        self.entries
            .iter()
            .filter(|(id, entry)| !entry.deleted && range.contains(id.as_str()))
            .map(|(_, entry)| Document::from_value(entry.raw.clone()))
            .collect()
    }

    fn remove(&mut self, id: &DocId, rev: &Revision) -> Result<Revision, MureError> {
        let tombstone = prepare_remove(id, self.existing(id), rev)?;
        if let Some(entry) = self.entries.get_mut(id) {
            entry.rev = tombstone.clone();
            entry.deleted = true;
            entry.raw = Value::Null;
        }
        Ok(tombstone)
    }
}
