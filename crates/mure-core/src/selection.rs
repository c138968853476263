//! # Selections
//!
//! A `Selection` is a parsed selector plus the context it resolves against.
//! It is a description, not a result: every call to [`Selection::cursor`]
//! fetches the starting documents from the store again and walks their
//! current state, so a selection reflects the latest writes.
//!
//! ## Resolution
//!
//! Each starting document is walked on its own. A walk entry is a location
//! plus the index of the next unconsumed token; children matching that token
//! are queued with the token consumed, and recursive tokens (`..`) also
//! queue every child with the token still pending. A location is a match
//! once all tokens are consumed. Reserved keys (`$...`, `_id`, `_rev`) are
//! never visited and each `(document, path)` is emitted at most once.
//!
//! Results come out document by document in fetch order. Within a document
//! they are in path order: parents before children, siblings in the
//! container's own key order. Documents are walked lazily, one at a time.

use crate::document::Document;
use crate::item::{Item, ItemType};
use crate::path::ItemPath;
use crate::primitives::{MAX_TRAVERSAL_DEPTH, is_reserved_key};
use crate::selector::{Anchor, Selector, Token};
use crate::session::ErrorObserver;
use crate::store::{DocumentStore, IdRange};
use crate::types::{DocId, MureError};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};

/// What a selection resolves against.
#[derive(Debug, Clone)]
pub enum SelectionContext {
    /// Explicit items (a `Root` item stands for every document).
    Items(Vec<Item>),
    /// Nothing: absolute selectors start from every document, relative
    /// selectors cannot resolve.
    None,
}

/// A lazy, restartable selector resolution.
#[derive(Debug, Clone)]
pub struct Selection {
    selector: Selector,
    context: SelectionContext,
}

impl Selection {
    /// Pair a parsed selector with its context.
    #[must_use]
    pub fn new(selector: Selector, context: SelectionContext) -> Self {
        Self { selector, context }
    }

    /// Parse `text` and pair it with `context`.
    pub fn parse(text: &str, context: SelectionContext) -> Result<Self, MureError> {
        Ok(Self::new(Selector::parse(text)?, context))
    }

    /// The selector.
    #[must_use]
    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// The context.
    #[must_use]
    pub fn context(&self) -> &SelectionContext {
        &self.context
    }

    /// Narrow this selection: `selector` resolves against each of its items.
    ///
    /// This selection is resolved once, here, and its items become the
    /// context of the result. Later cursors over the narrowed selection
    /// re-read those items' documents but never re-run this selection's
    /// anchor, so items added elsewhere afterwards are not picked up.
    pub fn select(
        &self,
        selector: &str,
        store: &impl DocumentStore,
        observer: Option<&dyn ErrorObserver>,
    ) -> Result<Self, MureError> {
        let selector = Selector::parse(selector)?;
        let items = self.items(store, observer)?;
        Ok(Self::new(selector, SelectionContext::Items(items)))
    }

    /// Start a fresh resolution.
    ///
    /// A relative selector without context reports `ContextResolution` to
    /// `observer` (and the log) and resolves to nothing.
    pub fn cursor(
        &self,
        store: &impl DocumentStore,
        observer: Option<&dyn ErrorObserver>,
    ) -> Result<SelectionCursor, MureError> {
        let mut cursor = SelectionCursor::new(self.selector.tokens().to_vec());
        match self.selector.anchor() {
            Anchor::Absolute {
                doc_query: Some(query),
            } => {
                for doc in store.find(query)? {
                    let index = cursor.load(doc);
                    cursor.start(index, ItemPath::root());
                }
            }
            Anchor::Absolute { doc_query: None } => {
                let docs = match &self.context {
                    SelectionContext::Items(items) => documents_of(items, store)?,
                    SelectionContext::None => store.all_docs(&IdRange::all())?,
                };
                for doc in docs {
                    let index = cursor.load(doc);
                    cursor.start(index, ItemPath::root());
                }
            }
            Anchor::Relative => {
                let SelectionContext::Items(items) = &self.context else {
                    let error = MureError::ContextResolution(format!(
                        "could not find context for selection {}",
                        self.selector
                    ));
                    tracing::warn!(selector = %self.selector, "{error}");
                    if let Some(observer) = observer {
                        observer.notify(&error);
                    }
                    return Ok(cursor);
                };
                let mut index_of = HashMap::new();
                for doc in documents_of(items, store)? {
                    let id = doc.id().clone();
                    index_of.insert(id, cursor.load(doc));
                }
                for item in items {
                    match item.doc_id() {
                        Some(id) => {
                            if let Some(index) = index_of.get(id) {
                                cursor.start(*index, item.path().clone());
                            }
                        }
                        None => {
                            // the root: every document
                            for index in 0..cursor.docs.len() {
                                cursor.start(index, ItemPath::root());
                            }
                        }
                    }
                }
            }
        }
        tracing::debug!(
            selector = %self.selector,
            documents = cursor.docs.len(),
            "resolving selection"
        );
        Ok(cursor)
    }

    /// Resolve eagerly.
    pub fn items(
        &self,
        store: &impl DocumentStore,
        observer: Option<&dyn ErrorObserver>,
    ) -> Result<Vec<Item>, MureError> {
        Ok(self.cursor(store, observer)?.collect())
    }
}

/// Fetch the documents `items` live in, in first-appearance order.
fn documents_of(items: &[Item], store: &impl DocumentStore) -> Result<Vec<Document>, MureError> {
    if items.iter().any(|item| item.item_type() == ItemType::Root) {
        return store.all_docs(&IdRange::all());
    }
    let mut seen: HashSet<&DocId> = HashSet::new();
    let mut docs = Vec::new();
    for id in items.iter().filter_map(Item::doc_id) {
        if seen.insert(id) {
            docs.push(store.get(id)?);
        }
    }
    Ok(docs)
}

// =============================================================================
// CURSOR
// =============================================================================

/// A location waiting to be tested against `tokens[token]`.
///
/// `order` is the start index followed by the position of each key in its
/// container; comparing it lexicographically gives path order.
#[derive(Debug, Clone)]
struct Pending {
    path: ItemPath,
    token: usize,
    order: Vec<usize>,
}

/// One pass over a selection. Owns the documents it fetched.
#[derive(Debug)]
pub struct SelectionCursor {
    tokens: Vec<Token>,
    docs: Vec<Document>,
    starts: Vec<Vec<ItemPath>>,
    next_doc: usize,
    ready: VecDeque<Item>,
}

impl SelectionCursor {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            docs: Vec::new(),
            starts: Vec::new(),
            next_doc: 0,
            ready: VecDeque::new(),
        }
    }

    fn load(&mut self, doc: Document) -> usize {
        if let Some(index) = self.docs.iter().position(|d| d.id() == doc.id()) {
            return index;
        }
        self.docs.push(doc);
        self.starts.push(Vec::new());
        self.docs.len() - 1
    }

    fn start(&mut self, doc: usize, path: ItemPath) {
        if let Some(starts) = self.starts.get_mut(doc) {
            starts.push(path);
        }
    }

    /// Every match inside one document, in path order.
    fn walk(&self, index: usize) -> Vec<Item> {
        let (Some(doc), Some(starts)) = (self.docs.get(index), self.starts.get(index)) else {
            return Vec::new();
        };
        let mut queue: VecDeque<Pending> = starts
            .iter()
            .enumerate()
            .map(|(position, path)| Pending {
                path: path.clone(),
                token: 0,
                order: vec![position],
            })
            .collect();
        let mut visited: HashSet<(ItemPath, usize)> = HashSet::new();
        let mut matches: Vec<(Vec<usize>, ItemPath)> = Vec::new();
        while let Some(pending) = queue.pop_front() {
            if !visited.insert((pending.path.clone(), pending.token)) {
                continue;
            }
            if pending.token >= self.tokens.len() {
                matches.push((pending.order, pending.path));
                continue;
            }
            queue.extend(self.expand(doc, &pending));
        }

        matches.sort_by(|a, b| a.0.cmp(&b.0));
        let mut emitted: HashSet<ItemPath> = HashSet::new();
        matches
            .into_iter()
            .filter(|(_, path)| emitted.insert(path.clone()))
            .filter_map(|(_, path)| Item::infer(doc, doc.id(), path).ok())
            .collect()
    }

    fn expand(&self, doc: &Document, pending: &Pending) -> Vec<Pending> {
        if pending.path.len() >= MAX_TRAVERSAL_DEPTH {
            return Vec::new();
        }
        let (Some(token), Some(value)) = (self.tokens.get(pending.token), doc.get(&pending.path))
        else {
            return Vec::new();
        };
        let keys = child_keys(value);
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        let child = |position: usize, token: usize| {
            keys.get(position).map(|key| {
                let mut order = pending.order.clone();
                order.push(position);
                Pending {
                    path: pending.path.child(key.as_str()),
                    token,
                    order,
                }
            })
        };
        let mut next: Vec<Pending> = token
            .segment
            .select(&refs)
            .into_iter()
            .filter_map(|position| child(position, pending.token + 1))
            .collect();
        if token.recursive {
            next.extend((0..keys.len()).filter_map(|position| child(position, pending.token)));
        }
        next
    }
}

impl Iterator for SelectionCursor {
    type Item = Item;

    fn next(&mut self) -> Option<Item> {
        loop {
            if let Some(item) = self.ready.pop_front() {
                return Some(item);
            }
            if self.next_doc >= self.docs.len() {
                return None;
            }
            let index = self.next_doc;
            self.next_doc += 1;
            self.ready = self.walk(index).into();
        }
    }
}

fn child_keys(value: &Value) -> Vec<String> {
    match value {
        Value::Object(map) => map.keys().filter(|k| !is_reserved_key(k)).cloned().collect(),
        Value::Array(items) => (0..items.len()).map(|i| i.to_string()).collect(),
        _ => Vec::new(),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::cell::RefCell;

    fn store() -> MemoryStore {
        let mut store = MemoryStore::new();
        for (name, contents) in [
            ("f.json", json!({ "hands": { "0": { "card": "A" }, "1": { "card": "K" } }, "$tags": {} })),
            ("g.json", json!({ "hands": { "0": { "card": "Q" } }, "deep": { "x": { "card": "J" } } })),
        ] {
            let doc = Document::from_value(json!({
                "_id": format!("application/json;{name}"),
                "contents": contents
            }))
            .expect("doc");
            store.put(&doc).expect("put");
        }
        store
    }

    fn labels(items: &[Item]) -> Vec<String> {
        items.iter().map(|i| i.path().to_expression()).collect()
    }

    #[test]
    fn doc_query_anchors_resolution() {
        let store = store();
        let sel = Selection::parse(
            r#"@{"_id":"application/json;f.json"}$.contents.hands[*]"#,
            SelectionContext::None,
        )
        .expect("parse");
        let items = sel.items(&store, None).expect("resolve");
        assert_eq!(labels(&items), vec!["$.contents.hands[0]", "$.contents.hands[1]"]);
    }

    #[test]
    fn absolute_without_query_spans_every_document() {
        let store = store();
        let sel = Selection::parse("@$.contents.hands[0].card", SelectionContext::None)
            .expect("parse");
        let items = sel.items(&store, None).expect("resolve");
        let docs: Vec<&str> = items
            .iter()
            .filter_map(|i| i.doc_id().map(DocId::as_str))
            .collect();
        assert_eq!(docs, vec!["application/json;f.json", "application/json;g.json"]);
        assert_eq!(items[0].item_type(), ItemType::String);
    }

    #[test]
    fn recursive_descent_finds_all_depths() {
        let store = store();
        let sel = Selection::parse("@$..card", SelectionContext::None).expect("parse");
        assert_eq!(sel.items(&store, None).expect("resolve").len(), 4);
    }

    #[test]
    fn relative_without_context_reports_and_is_empty() {
        let store = store();
        let seen = RefCell::new(Vec::new());
        let observer = |e: &MureError| seen.borrow_mut().push(e.to_string());
        let sel = Selection::parse("$.contents", SelectionContext::None).expect("parse");
        let items = sel.items(&store, Some(&observer)).expect("resolve");
        assert!(items.is_empty());
        assert_eq!(seen.borrow().len(), 1);
        assert!(seen.borrow()[0].contains("could not find context"));
    }

    #[test]
    fn sub_selection_narrows_parent() {
        let store = store();
        let hands = Selection::parse("@$.contents.hands", SelectionContext::None)
            .expect("parse");
        let cards = hands.select("$[*].card", &store, None).expect("narrow");
        let items = cards.items(&store, None).expect("resolve");
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|i| i.path().label() == Some("card")));
    }

    #[test]
    fn sub_selection_keeps_the_items_it_was_narrowed_from() {
        let mut store = store();
        let hands = Selection::parse("@$.contents.hands", SelectionContext::None)
            .expect("parse");
        let cards = hands.select("$[*].card", &store, None).expect("narrow");

        let late = Document::from_value(json!({
            "_id": "application/json;h.json",
            "contents": { "hands": { "0": { "card": "2" } } }
        }))
        .expect("doc");
        store.put(&late).expect("put");

        assert_eq!(hands.items(&store, None).expect("resolve").len(), 3);
        assert_eq!(cards.items(&store, None).expect("resolve").len(), 3);
    }

    fn single(store: &mut MemoryStore, name: &str, contents: Value) {
        let doc = Document::from_value(json!({
            "_id": format!("application/json;{name}"),
            "contents": contents
        }))
        .expect("doc");
        store.put(&doc).expect("put");
    }

    fn selectors(items: &[Item]) -> Vec<String> {
        items
            .iter()
            .map(|i| {
                let doc = i.doc_id().map(DocId::filename).unwrap_or_default();
                format!("{doc}:{}", i.path())
            })
            .collect()
    }

    #[test]
    fn results_follow_document_order_before_depth() {
        let mut store = MemoryStore::new();
        single(&mut store, "a.json", json!({ "x": { "y": { "card": 1 } } }));
        single(&mut store, "b.json", json!({ "card": 2 }));

        let sel = Selection::parse("@$..card", SelectionContext::None).expect("parse");
        assert_eq!(
            selectors(&sel.items(&store, None).expect("resolve")),
            vec!["a.json:$.contents.x.y.card", "b.json:$.contents.card"]
        );
    }

    #[test]
    fn results_within_a_document_are_in_path_order() {
        let mut store = MemoryStore::new();
        single(&mut store, "f.json", json!({ "m": { "n": { "k": 1 } }, "z": { "k": 2 } }));
        let deep = Selection::parse("@$..k", SelectionContext::None).expect("parse");
        assert_eq!(
            labels(&deep.items(&store, None).expect("resolve")),
            vec!["$.contents.m.n.k", "$.contents.z.k"]
        );

        let mut store = MemoryStore::new();
        single(&mut store, "g.json", json!({ "a": { "b": 1 }, "c": 2 }));
        let everything = Selection::parse("@$..*", SelectionContext::None).expect("parse");
        assert_eq!(
            labels(&everything.items(&store, None).expect("resolve")),
            vec!["$.contents", "$.contents.a", "$.contents.a.b", "$.contents.c"]
        );
    }

    #[test]
    fn relative_context_items_keep_their_order() {
        let store = store();
        let f = DocId::new("application/json;f.json").expect("id");
        let g = DocId::new("application/json;g.json").expect("id");
        let context = SelectionContext::Items(vec![
            Item::infer(&store.get(&g).expect("g"), &g, ItemPath::from_keys(["contents"]))
                .expect("g contents"),
            Item::infer(&store.get(&f).expect("f"), &f, ItemPath::from_keys(["contents", "hands"]))
                .expect("f hands"),
        ]);
        let sel = Selection::parse("$..card", context).expect("parse");
        assert_eq!(
            selectors(&sel.items(&store, None).expect("resolve")),
            vec![
                "g.json:$.contents.hands[0].card",
                "g.json:$.contents.deep.x.card",
                "f.json:$.contents.hands[0].card",
                "f.json:$.contents.hands[1].card",
            ]
        );
    }

    #[test]
    fn reserved_keys_are_never_visited() {
        let store = store();
        let sel = Selection::parse("@$.contents.*", SelectionContext::None).expect("parse");
        let items = sel.items(&store, None).expect("resolve");
        assert!(items
            .iter()
            .all(|i| !i.path().label().is_some_and(is_reserved_key)));
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn non_matching_tokens_yield_nothing() {
        let store = store();
        let sel = Selection::parse("@$.contents.nothing.here", SelectionContext::None)
            .expect("parse");
        assert!(sel.items(&store, None).expect("resolve").is_empty());
    }

    #[test]
    fn restarting_sees_new_writes() {
        let mut store = store();
        let sel = Selection::parse(
            r#"@{"_id":"application/json;g.json"}$.contents.hands.*"#,
            SelectionContext::None,
        )
        .expect("parse");
        assert_eq!(sel.items(&store, None).expect("resolve").len(), 1);

        let id = DocId::new("application/json;g.json").expect("id");
        let mut doc = store.get(&id).expect("get");
        doc.set(&ItemPath::from_keys(["contents", "hands", "1"]), json!({}))
            .expect("set");
        store.put(&doc).expect("put");
        assert_eq!(sel.items(&store, None).expect("resolve").len(), 2);
    }
}
