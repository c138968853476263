//! # redb-backed Document Store
//!
//! A disk-backed `DocumentStore` using the redb embedded database. Each
//! document is one row keyed by its id; the value is a [`StoredRecord`]
//! (revision, tombstone flag, JSON body) in the record format of
//! [`super::record`]. Every put or remove is its own ACID write transaction;
//! `put_all` checks and writes a whole batch inside one transaction.

use super::record::{StoredRecord, decode_record, encode_record};
use super::{DocumentStore, Existing, IdRange, PutResult, prepare_put, prepare_remove};
use crate::document::Document;
use crate::types::{DocId, MureError, Revision};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};
use std::path::Path;

/// Table for documents: id -> encoded `StoredRecord`.
const DOCUMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("documents");

fn io(e: impl std::fmt::Display) -> MureError {
    MureError::IoError(e.to_string())
}

/// A document store persisted in a redb file.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MureError> {
        let db = Database::create(path.as_ref()).map_err(io)?;
        {
            let write_txn = db.begin_write().map_err(io)?;
            let _ = write_txn.open_table(DOCUMENTS).map_err(io)?;
            write_txn.commit().map_err(io)?;
        }
        tracing::debug!(path = %path.as_ref().display(), "opened redb document store");
        Ok(Self { db })
    }

    fn read_record(&self, id: &DocId) -> Result<Option<StoredRecord>, MureError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(DOCUMENTS).map_err(io)?;
        table
            .get(id.as_str())
            .map_err(io)?
            .map(|guard| decode_record(guard.value()))
            .transpose()
    }

    fn write_record(&self, id: &DocId, record: &StoredRecord) -> Result<(), MureError> {
        let bytes = encode_record(record)?;
        let write_txn = self.db.begin_write().map_err(io)?;
        {
            let mut table = write_txn.open_table(DOCUMENTS).map_err(io)?;
            table.insert(id.as_str(), bytes.as_slice()).map_err(io)?;
        }
        write_txn.commit().map_err(io)?;
        Ok(())
    }
}

fn record_to_document(record: &StoredRecord) -> Result<Document, MureError> {
    Document::from_value(serde_json::from_str(&record.body)?)
}

/// Revision-check `doc` against the stored record and build its replacement.
fn prepare_record(
    current: Option<&StoredRecord>,
    doc: &Document,
) -> Result<(Revision, StoredRecord), MureError> {
    let current_rev = current.map(|r| Revision::new(r.rev.clone()));
    let existing = current
        .zip(current_rev.as_ref())
        .map(|(record, rev)| Existing {
            rev,
            deleted: record.deleted,
        });
    let (rev, raw) = prepare_put(existing, doc)?;
    let record = StoredRecord {
        rev: rev.as_str().to_string(),
        deleted: false,
        body: serde_json::to_string(&raw)?,
    };
    Ok((rev, record))
}

/// Check and stage every document of a batch inside `txn`.
fn write_batch(txn: &WriteTransaction, docs: &[Document]) -> Result<Vec<PutResult>, MureError> {
    let mut table = txn.open_table(DOCUMENTS).map_err(io)?;
    let mut results = Vec::with_capacity(docs.len());
    for doc in docs {
        let current = table
            .get(doc.id().as_str())
            .map_err(io)?
            .map(|guard| decode_record(guard.value()))
            .transpose()?;
        let (rev, record) = prepare_record(current.as_ref(), doc)?;
        let bytes = encode_record(&record)?;
        table.insert(doc.id().as_str(), bytes.as_slice()).map_err(io)?;
        results.push(PutResult {
            id: doc.id().clone(),
            rev,
        });
    }
    Ok(results)
}

impl DocumentStore for RedbStore {
    fn get(&self, id: &DocId) -> Result<Document, MureError> {
        match self.read_record(id)? {
            Some(record) if !record.deleted => record_to_document(&record),
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
        let write_txn = self.db.begin_write().map_err(io)?;
        match write_batch(&write_txn, docs) {
            Ok(results) => {
                write_txn.commit().map_err(io)?;
                for put in &results {
                    tracing::debug!(id = %put.id, rev = %put.rev, "put document");
                }
                Ok(results)
            }
            Err(e) => {
                write_txn.abort().map_err(io)?;
                Err(e)
            }
        }
    }

    fn all_docs(&self, range: &IdRange) -> Result<Vec<Document>, MureError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(DOCUMENTS).map_err(io)?;
        let mut docs = Vec::new();
        for entry in table.range(range.start()..=range.end()).map_err(io)? {
            let (_key, value) = entry.map_err(io)?;
            let record = decode_record(value.value())?;
            if !record.deleted {
                docs.push(record_to_document(&record)?);
            }
        }
        Ok(docs)
    }

    fn remove(&mut self, id: &DocId, rev: &Revision) -> Result<Revision, MureError> {
        let current = self.read_record(id)?;
        let current_rev = current.as_ref().map(|r| Revision::new(r.rev.clone()));
        let existing = current
            .as_ref()
            .zip(current_rev.as_ref())
            .map(|(record, rev)| Existing {
                rev,
                deleted: record.deleted,
            });
        let tombstone = prepare_remove(id, existing, rev)?;
        self.write_record(
            id,
            &StoredRecord {
                rev: tombstone.as_str().to_string(),
                deleted: true,
                body: String::new(),
            },
        )?;
        tracing::debug!(id = %id, rev = %tombstone, "removed document");
        Ok(tombstone)
    }
}
