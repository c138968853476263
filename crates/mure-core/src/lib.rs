//! # mure-core
//!
//! The graph-document data model for Mure.
//!
//! JSON documents are standardized into a canonical shape and then viewed as
//! trees of typed items: primitives, containers, nodes, edges and sets. Items
//! are addressed with a JSONPath-style selector language whose unique form
//! (`@{"_id":"<doc>"}$.path`) names exactly one item in the whole store.
//! Graph relations (edges, set membership, classes) live inside the
//! documents as bookkeeping maps keyed by those unique selectors.
//!
//! ## Architectural Constraints
//!
//! - Synchronous and single-threaded: no async runtime, no network
//! - The store owns the raw tree; an [`Item`] is a `(document, path, type)`
//!   triple, never a reference into the tree
//! - All state goes through an explicit [`Session`]; there is no global store
//! - Selections are lazy and restartable: each resolution re-reads the store

// =============================================================================
// MODULES
// =============================================================================

pub mod document;
pub mod formats;
pub mod graph;
pub mod item;
pub mod path;
pub mod primitives;
pub mod query;
pub mod selection;
pub mod selector;
pub mod session;
pub mod standardize;
pub mod store;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use document::{Document, DocumentAccess, DocumentSet};
pub use item::{Item, ItemType};
pub use path::ItemPath;
pub use types::{DocId, Direction, MureError, Revision};

// =============================================================================
// RE-EXPORTS: Selection
// =============================================================================

pub use query::DocumentQuery;
pub use selection::{Selection, SelectionContext, SelectionCursor};
pub use selector::Selector;

// =============================================================================
// RE-EXPORTS: Storage and Session
// =============================================================================

pub use session::{ErrorObserver, Session};
pub use standardize::{StandardizeOptions, standardize_document};
pub use store::{DocumentStore, IdRange, MemoryStore, PutResult, RedbStore};

// =============================================================================
// RE-EXPORTS: Formats
// =============================================================================

pub use formats::{CsvTables, D3Json, ExportOptions, ExportedData, FormatAdapter, Gexf, adapter_for};
