//! # Session Module
//!
//! The handle every operation goes through: a document store, the
//! standardization options, and an optional error observer.
//!
//! Writing operations follow one pattern: load the documents the operation
//! touches into a [`DocumentSet`], mutate items through it, then put every
//! document that was borrowed mutably back into the store with a single
//! `put_all`. A stale revision on any of them surfaces as `Conflict` and
//! none of them is written, so both ends of a relation land together.
//!
//! ## Error reporting
//!
//! Store failures are returned to the caller and also broadcast: logged at
//! `error` and handed to the observer. `NotFound` is not broadcast, since
//! callers routinely recover from it.

use crate::document::{Document, DocumentSet};
use crate::formats::{ExportOptions, ExportedData, FormatAdapter};
use crate::graph;
use crate::item::{Item, ItemType};
use crate::primitives::ID_KEY;
use crate::selection::{Selection, SelectionContext, SelectionCursor};
use crate::selector::Selector;
use crate::standardize::{StandardizeOptions, standardize_document};
use crate::store::{DocumentStore, IdRange, PutResult};
use crate::types::{DocId, Direction, MureError, Revision};
use serde_json::{Map, Value};
use std::fmt;

// =============================================================================
// ERROR REPORTING
// =============================================================================

/// Receives errors that are reported rather than (or as well as) returned.
pub trait ErrorObserver {
    fn notify(&self, error: &MureError);
}

impl<F> ErrorObserver for F
where
    F: Fn(&MureError),
{
    fn notify(&self, error: &MureError) {
        self(error);
    }
}

/// Log a failed store call and hand it to the observer, then pass the
/// result through unchanged.
fn report<T>(
    observer: Option<&dyn ErrorObserver>,
    result: Result<T, MureError>,
    context: &str,
) -> Result<T, MureError> {
    if let Err(error) = &result
        && !error.is_not_found()
    {
        tracing::error!(context, %error, "store operation failed");
        if let Some(observer) = observer {
            observer.notify(error);
        }
    }
    result
}

/// The document a unique selector points into, if it is one.
fn selector_doc(selector: &str) -> Option<DocId> {
    Selector::parse(selector)
        .ok()?
        .as_unique_path()
        .map(|(doc, _)| doc)
}

// =============================================================================
// SESSION
// =============================================================================

/// A store plus the settings operations run with.
pub struct Session<S: DocumentStore> {
    store: S,
    observer: Option<Box<dyn ErrorObserver>>,
    options: StandardizeOptions,
}

impl<S: DocumentStore + fmt::Debug> fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("store", &self.store)
            .field("options", &self.options)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl<S: DocumentStore> Session<S> {
    /// Create a session over `store` with default options and no observer.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            observer: None,
            options: StandardizeOptions::default(),
        }
    }

    /// Install an error observer.
    #[must_use]
    pub fn with_observer(mut self, observer: impl ErrorObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Replace the standardization options.
    #[must_use]
    pub fn with_options(mut self, options: StandardizeOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn options(&self) -> StandardizeOptions {
        self.options
    }

    fn observer(&self) -> Option<&dyn ErrorObserver> {
        self.observer.as_deref()
    }

    // =========================================================================
    // DOCUMENTS
    // =========================================================================

    /// Standardize `raw` and store it as a new document (or a new revision,
    /// when `raw` carries the current `_rev`).
    pub fn upload(&mut self, raw: Value) -> Result<Document, MureError> {
        let mut doc = standardize_document(raw, &self.store, self.options)?;
        let put = report(self.observer.as_deref(), self.store.put(&doc), "upload")?;
        doc.set_rev(&put.rev);
        tracing::info!(doc = %put.id, rev = %put.rev, "uploaded document");
        Ok(doc)
    }

    /// Fetch a document.
    pub fn get_document(&self, id: &DocId) -> Result<Document, MureError> {
        report(self.observer(), self.store.get(id), "get_document")
    }

    /// Fetch a document, or build a fresh standardized one with that id when
    /// it does not exist. The fresh document is not stored.
    pub fn get_or_init_document(&self, id: &DocId) -> Result<Document, MureError> {
        match self.get_document(id) {
            Err(error) if error.is_not_found() => {
                tracing::debug!(doc = %id, "initializing missing document");
                let mut raw = Map::new();
                raw.insert(ID_KEY.to_string(), Value::String(id.as_str().to_string()));
                standardize_document(Value::Object(raw), &self.store, self.options)
            }
            other => other,
        }
    }

    /// Re-standardize `doc` and store it. `doc` gets the new revision.
    pub fn save_document(&mut self, doc: &mut Document) -> Result<PutResult, MureError> {
        let canonical = standardize_document(doc.raw().clone(), &self.store, self.options)?;
        let put = report(self.observer.as_deref(), self.store.put(&canonical), "save_document")?;
        *doc = canonical;
        doc.set_rev(&put.rev);
        Ok(put)
    }

    /// Delete the current revision of a document.
    pub fn delete_document(&mut self, id: &DocId) -> Result<Revision, MureError> {
        let current = self.get_document(id)?;
        let rev = current
            .rev()
            .ok_or_else(|| MureError::Conflict(format!("document {id} has no revision")))?;
        let tombstone = report(
            self.observer.as_deref(),
            self.store.remove(id, &rev),
            "delete_document",
        )?;
        tracing::info!(doc = %id, rev = %tombstone, "deleted document");
        Ok(tombstone)
    }

    /// Ids of the live documents in `range`, in id order.
    pub fn list_documents(&self, range: &IdRange) -> Result<Vec<DocId>, MureError> {
        let docs = report(self.observer(), self.store.all_docs(range), "list_documents")?;
        Ok(docs.iter().map(|doc| doc.id().clone()).collect())
    }

    // =========================================================================
    // SELECTION
    // =========================================================================

    /// Parse `selector` against `context`. Nothing is resolved yet.
    pub fn select_all(
        &self,
        selector: &str,
        context: SelectionContext,
    ) -> Result<Selection, MureError> {
        Selection::parse(selector, context)
    }

    /// Narrow `parent` to `selector`, resolving `parent` once now; see
    /// [`Selection::select`].
    pub fn narrow(&self, parent: &Selection, selector: &str) -> Result<Selection, MureError> {
        report(
            self.observer(),
            parent.select(selector, &self.store, self.observer()),
            "narrow",
        )
    }

    /// Start resolving `selection` with this session's observer.
    pub fn cursor(&self, selection: &Selection) -> Result<SelectionCursor, MureError> {
        report(
            self.observer(),
            selection.cursor(&self.store, self.observer()),
            "select",
        )
    }

    /// Resolve `selection` eagerly.
    pub fn resolve(&self, selection: &Selection) -> Result<Vec<Item>, MureError> {
        Ok(self.cursor(selection)?.collect())
    }

    /// The single item `selector` names: a unique selector is looked up
    /// directly, anything else resolves to its first match.
    pub fn item(&self, selector: &str) -> Result<Item, MureError> {
        let parsed = Selector::parse(selector)?;
        if let Some((doc, path)) = parsed.as_unique_path() {
            let loaded = self.get_document(&doc)?;
            return Item::infer(&loaded, &doc, path);
        }
        let selection = Selection::new(parsed, SelectionContext::None);
        self.cursor(&selection)?
            .next()
            .ok_or_else(|| MureError::NotFound(format!("nothing matches {selector}")))
    }

    /// A copy of the item's current raw value.
    pub fn value_of(&self, item: &Item) -> Result<Value, MureError> {
        let docs = self.load(&[item])?;
        item.value(&docs).cloned()
    }

    // =========================================================================
    // MUTATION
    // =========================================================================

    /// Convert an item in place.
    pub fn convert(&mut self, item: &Item, target: ItemType) -> Result<Item, MureError> {
        self.mutate(&[item], |docs| item.convert_to(docs, target))
    }

    /// Link `a` and `b` with a new edge; see [`graph::link_to`].
    pub fn link_to(
        &mut self,
        a: &Item,
        b: &Item,
        container: Option<&Item>,
        direction: Direction,
    ) -> Result<Item, MureError> {
        let mut touched = vec![a, b];
        touched.extend(container);
        self.mutate(&touched, |docs| graph::link_to(docs, a, b, container, direction))
    }

    /// Tag `item` with class `name`. Returns the class set.
    pub fn add_class(&mut self, item: &Item, name: &str) -> Result<Item, MureError> {
        self.mutate(&[item], |docs| graph::add_class(docs, item, name))
    }

    /// Remove class `name` from `item`.
    pub fn remove_class(&mut self, item: &Item, name: &str) -> Result<(), MureError> {
        self.mutate(&[item], |docs| graph::remove_class(docs, item, name))
    }

    /// Put `item` into `set`.
    pub fn add_to_set(&mut self, item: &Item, set: &Item) -> Result<(Item, Item), MureError> {
        self.mutate(&[item, set], |docs| graph::add_to_set(docs, item, set))
    }

    /// Take `item` out of `set`.
    pub fn remove_from_set(&mut self, item: &Item, set: &Item) -> Result<(), MureError> {
        self.mutate(&[item, set], |docs| graph::remove_from_set(docs, item, set))
    }

    /// Add an empty node to `doc`'s orphan nodes.
    pub fn create_orphan_node(&mut self, doc: &DocId) -> Result<Item, MureError> {
        let anchor = Item::document(doc.clone());
        self.mutate(&[&anchor], |docs| graph::create_orphan_node(docs, doc))
    }

    // =========================================================================
    // GRAPH READS
    // =========================================================================

    /// Class names `item` carries in its own document.
    pub fn class_names(&self, item: &Item) -> Result<Vec<String>, MureError> {
        let docs = self.load(&[item])?;
        graph::class_names(&docs, item)
    }

    /// Edges attached to `node`, which may live in other documents.
    pub fn connected_edges(&self, node: &Item) -> Result<Vec<Item>, MureError> {
        let mut docs = self.load(&[node])?;
        let edges = graph::edge_selectors(&docs, node)?;
        self.load_referenced(&mut docs, &edges)?;
        graph::connected_edges(&docs, node)
    }

    /// Nodes sharing an edge with `node`; see [`graph::connected_nodes`].
    pub fn connected_nodes(&self, node: &Item, forward: Option<bool>) -> Result<Vec<Item>, MureError> {
        let mut docs = self.load(&[node])?;
        let edges = graph::edge_selectors(&docs, node)?;
        self.load_referenced(&mut docs, &edges)?;
        for edge in graph::connected_edges(&docs, node)? {
            let nodes = graph::node_selectors(&docs, &edge, forward)?;
            self.load_referenced(&mut docs, &nodes)?;
        }
        graph::connected_nodes(&docs, node, forward)
    }

    // =========================================================================
    // FORMATS
    // =========================================================================

    /// Parse `text` with `adapter` into the document `id` (created when
    /// missing) and store the result.
    pub fn import_with(
        &mut self,
        adapter: &dyn FormatAdapter,
        id: &DocId,
        text: &str,
    ) -> Result<Document, MureError> {
        let mut doc = self.get_or_init_document(id)?;
        adapter.import_data(&mut doc, text)?;
        let put = report(self.observer.as_deref(), self.store.put(&doc), "import")?;
        doc.set_rev(&put.rev);
        tracing::info!(doc = %id, format = adapter.format_name(), "imported data");
        Ok(doc)
    }

    /// Render the document `id` with `adapter`.
    pub fn export_with(
        &self,
        adapter: &dyn FormatAdapter,
        id: &DocId,
        options: &ExportOptions,
    ) -> Result<ExportedData, MureError> {
        let doc = self.get_document(id)?;
        adapter.export_data(&doc, options)
    }

    // =========================================================================
    // LOADING
    // =========================================================================

    fn load(&self, items: &[&Item]) -> Result<DocumentSet, MureError> {
        let mut docs = DocumentSet::new();
        for id in items.iter().filter_map(|item| item.doc_id()) {
            if !docs.contains(id) {
                docs.insert(self.get_document(id)?);
            }
        }
        Ok(docs)
    }

    fn load_referenced(&self, docs: &mut DocumentSet, selectors: &[String]) -> Result<(), MureError> {
        for id in selectors.iter().filter_map(|s| selector_doc(s)) {
            if !docs.contains(&id) {
                docs.insert(self.get_document(&id)?);
            }
        }
        Ok(())
    }

    fn mutate<T>(
        &mut self,
        items: &[&Item],
        op: impl FnOnce(&mut DocumentSet) -> Result<T, MureError>,
    ) -> Result<T, MureError> {
        let mut docs = self.load(items)?;
        let out = op(&mut docs)?;
        let dirty = docs.into_dirty();
        if dirty.is_empty() {
            return Ok(out);
        }
        let puts = report(self.observer.as_deref(), self.store.put_all(&dirty), "write back")?;
        for put in &puts {
            tracing::debug!(doc = %put.id, rev = %put.rev, "wrote back document");
        }
        Ok(out)
    }
}

// =============================================================================
// TESTS
// =============================================================================
