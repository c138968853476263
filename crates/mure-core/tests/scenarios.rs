//! # Scenario Tests
//!
//! End-to-end behavior through a `Session`, against both stores.

use mure_core::{
    D3Json, DocId, Direction, Document, DocumentStore, ExportOptions, IdRange, Item, ItemPath,
    ItemType, MemoryStore, MureError, PutResult, RedbStore, Revision, SelectionContext, Session,
};
use serde_json::json;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn memory_session() -> Session<MemoryStore> {
    Session::new(MemoryStore::new())
}

fn item_at<S: DocumentStore>(session: &Session<S>, doc: &DocId, keys: &[&str]) -> Item {
    session
        .item(&ItemPath::from_keys(keys.iter().copied()).unique_selector(doc))
        .expect("item")
}

// =============================================================================
// STANDARDIZATION
// =============================================================================

#[test]
fn untitled_upload_is_standardized() {
    let mut session = memory_session();
    let doc = session
        .upload(json!({ "mimeType": "application/json", "contents": { "a": 1, "b": [2, 3] } }))
        .expect("upload");

    assert_eq!(doc.id().as_str(), "application/json;Untitled 1");
    assert_eq!(
        doc.raw()["contents"]["b"],
        json!({ "_id": "@$.contents.b", "0": 2, "1": 3, "$wasArray": true })
    );
    assert_eq!(doc.raw()["contents"]["_id"], json!("@$.contents"));
    assert_eq!(doc.raw()["contents"]["a"], json!(1));
    assert_eq!(doc.raw()["classes"]["_id"], json!("@$.classes"));
    assert_eq!(doc.raw()["orphanEdges"]["_id"], json!("@$.orphanEdges"));
}

#[test]
fn untitled_names_never_repeat() {
    let mut session = memory_session();
    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(session.upload(json!({})).expect("upload").id().clone());
    }
    session.delete_document(&ids[1]).expect("delete");
    let next = session.upload(json!({})).expect("upload").id().clone();

    assert_eq!(next.as_str(), "application/json;Untitled 4");
    assert!(!ids.contains(&next));
}

// =============================================================================
// GRAPH
// =============================================================================

#[test]
fn link_to_records_counters_on_both_ends() {
    let mut session = memory_session();
    let id = session
        .upload(json!({
            "_id": "application/json;g.json",
            "contents": { "a": {}, "b": {}, "edges": {} }
        }))
        .expect("upload")
        .id()
        .clone();
    let a = item_at(&session, &id, &["contents", "a"]);
    let b = item_at(&session, &id, &["contents", "b"]);
    let container = item_at(&session, &id, &["contents", "edges"]);

    let edge = session
        .link_to(&a, &b, Some(&container), Direction::Source)
        .expect("link");
    assert_eq!(edge.path(), &ItemPath::from_keys(["contents", "edges", "0"]));

    let edge_value = session.value_of(&edge).expect("edge");
    assert_eq!(edge_value["$nodes"][a.unique_selector()]["source"], json!(1));
    assert_eq!(edge_value["$nodes"][b.unique_selector()]["target"], json!(1));
    assert_eq!(
        session.value_of(&a).expect("a")["$edges"][edge.unique_selector()],
        json!(true)
    );
    assert_eq!(
        session.value_of(&b).expect("b")["$edges"][edge.unique_selector()],
        json!(true)
    );
    assert_eq!(item_at(&session, &id, &["contents", "a"]).item_type(), ItemType::Node);
}

#[test]
fn links_across_documents_resolve_from_either_end() {
    let mut session = memory_session();
    let left = session
        .upload(json!({ "_id": "application/json;left.json", "contents": { "x": {} } }))
        .expect("left")
        .id()
        .clone();
    let right = session
        .upload(json!({ "_id": "application/json;right.json", "contents": { "y": {} } }))
        .expect("right")
        .id()
        .clone();
    let x = item_at(&session, &left, &["contents", "x"]);
    let y = item_at(&session, &right, &["contents", "y"]);

    let edge = session.link_to(&x, &y, None, Direction::Source).expect("link");
    assert_eq!(edge.doc_id(), Some(&left));

    let sources = session.connected_nodes(&y, Some(false)).expect("sources");
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].unique_selector(), x.unique_selector());
    assert_eq!(session.connected_edges(&y).expect("edges"), vec![edge]);
}

#[test]
fn classes_export_through_d3() {
    let mut session = memory_session();
    let id = DocId::new("application/json;miserables.json").expect("id");
    session
        .import_with(
            &D3Json,
            &id,
            r#"{"nodes": [{"id": "a"}, {"id": "b"}], "links": [{"source": "a", "target": "b"}]}"#,
        )
        .expect("import");

    let options = ExportOptions {
        include_classes: Some(vec!["node".to_string()]),
        pretty: false,
    };
    let exported = session.export_with(&D3Json, &id, &options).expect("export");
    let graph: serde_json::Value = serde_json::from_slice(&exported.data).expect("json");
    assert_eq!(graph["nodes"].as_array().map(Vec::len), Some(2));
    assert_eq!(graph["links"].as_array().map(Vec::len), Some(0));
}

// =============================================================================
// SELECTION
// =============================================================================

#[test]
fn wildcard_over_hands_yields_both_in_key_order() {
    let mut session = memory_session();
    session
        .upload(json!({
            "_id": "application/json;f.json",
            "contents": { "hands": { "0": {}, "1": {} } }
        }))
        .expect("upload");

    let selection = session
        .select_all(
            r#"@{"_id":"application/json;f.json"}$.contents.hands[*]"#,
            SelectionContext::None,
        )
        .expect("selector");
    let items = session.resolve(&selection).expect("resolve");
    let labels: Vec<_> = items.iter().filter_map(Item::label).collect();
    assert_eq!(labels, vec!["0", "1"]);
}

#[test]
fn recursive_matches_come_document_by_document() {
    let mut session = memory_session();
    for (name, contents) in [
        ("a.json", json!({ "deep": { "deeper": { "x": 1 } }, "x": 2 })),
        ("b.json", json!({ "x": 3 })),
        ("c.json", json!({ "list": [{ "x": 4 }, { "x": 5 }] })),
    ] {
        session
            .upload(json!({ "_id": format!("application/json;{name}"), "contents": contents }))
            .expect("upload");
    }

    let selection = session
        .select_all("@$..x", SelectionContext::None)
        .expect("selector");
    let found: Vec<String> = session
        .resolve(&selection)
        .expect("resolve")
        .iter()
        .map(|item| {
            let doc = item.doc_id().map(DocId::filename).unwrap_or_default();
            format!("{doc}:{}", item.path())
        })
        .collect();
    assert_eq!(
        found,
        vec![
            "a.json:$.contents.deep.deeper.x",
            "a.json:$.contents.x",
            "b.json:$.contents.x",
            "c.json:$.contents.list[0].x",
            "c.json:$.contents.list[1].x",
        ]
    );
}

#[test]
fn narrowed_selection_resolves_inside_its_parent() {
    let mut session = memory_session();
    session
        .upload(json!({
            "_id": "application/json;f.json",
            "contents": { "hands": { "0": { "card": "A" }, "1": { "card": "K" } } }
        }))
        .expect("upload");
    let hands = session
        .select_all("@$.contents.hands.*", SelectionContext::None)
        .expect("selector");
    let cards = session.narrow(&hands, "$.card").expect("narrow");
    let values: Vec<_> = session
        .resolve(&cards)
        .expect("resolve")
        .iter()
        .map(|card| session.value_of(card).expect("value"))
        .collect();
    assert_eq!(values, vec![json!("A"), json!("K")]);
}

#[test]
fn relative_selection_without_context_is_an_event() {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    let session = memory_session().with_observer(move |e: &MureError| {
        sink.borrow_mut().push(matches!(e, MureError::ContextResolution(_)));
    });
    let selection = session
        .select_all("$.contents.*", SelectionContext::None)
        .expect("selector");

    assert!(session.resolve(&selection).expect("resolve").is_empty());
    assert_eq!(*events.borrow(), vec![true]);
}

// =============================================================================
// PERSISTENCE
// =============================================================================

#[test]
fn redb_session_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("mure.redb");
    let id = DocId::new("application/json;persist.json").expect("id");

    {
        let mut session = Session::new(RedbStore::open(&path).expect("open"));
        session
            .upload(json!({ "_id": id.as_str(), "contents": { "a": {}, "b": {} } }))
            .expect("upload");
        let a = item_at(&session, &id, &["contents", "a"]);
        let b = item_at(&session, &id, &["contents", "b"]);
        session.link_to(&a, &b, None, Direction::Undirected).expect("link");
        session.add_class(&a, "people").expect("class");
    }

    let session = Session::new(RedbStore::open(&path).expect("reopen"));
    assert_eq!(session.list_documents(&IdRange::all()).expect("list"), vec![id.clone()]);
    let a = item_at(&session, &id, &["contents", "a"]);
    assert_eq!(a.item_type(), ItemType::Node);
    assert_eq!(session.class_names(&a).expect("classes"), vec!["people".to_string()]);
    let neighbours = session.connected_nodes(&a, None).expect("neighbours");
    assert_eq!(neighbours.len(), 1);
    assert_eq!(neighbours[0].label(), Some("b"));
    let doc = session.get_document(&id).expect("get");
    assert_eq!(doc.rev().map(|r| r.generation()), Some(3));
}

#[test]
fn stale_revision_is_a_conflict() {
    let mut session = memory_session();
    let first = session.upload(json!({ "_id": "application/json;c.json" })).expect("upload");
    let mut second = first.clone();
    session.save_document(&mut second).expect("save");

    let mut stale = first;
    let err = session.save_document(&mut stale).expect_err("stale");
    assert!(matches!(err, MureError::Conflict(_)));
}

/// A memory store where another writer saves `target` again right after
/// this process reads it, once armed.
struct RacingStore {
    inner: RefCell<MemoryStore>,
    target: DocId,
    armed: Cell<bool>,
}

impl DocumentStore for RacingStore {
    fn get(&self, id: &DocId) -> Result<Document, MureError> {
        let doc = self.inner.borrow().get(id)?;
        if id == &self.target && self.armed.replace(false) {
            self.inner.borrow_mut().put(&doc)?;
        }
        Ok(doc)
    }

    fn put(&mut self, doc: &Document) -> Result<PutResult, MureError> {
        self.inner.get_mut().put(doc)
    }

    fn put_all(&mut self, docs: &[Document]) -> Result<Vec<PutResult>, MureError> {
        self.inner.get_mut().put_all(docs)
    }

    fn all_docs(&self, range: &IdRange) -> Result<Vec<Document>, MureError> {
        self.inner.borrow().all_docs(range)
    }

    fn remove(&mut self, id: &DocId, rev: &Revision) -> Result<Revision, MureError> {
        self.inner.get_mut().remove(id, rev)
    }
}

#[test]
fn cross_document_link_is_all_or_nothing() {
    let left = DocId::new("application/json;left.json").expect("id");
    let right = DocId::new("application/json;right.json").expect("id");
    let mut session = Session::new(RacingStore {
        inner: RefCell::new(MemoryStore::new()),
        target: right.clone(),
        armed: Cell::new(false),
    });
    session
        .upload(json!({ "_id": left.as_str(), "contents": { "x": {} } }))
        .expect("left");
    session
        .upload(json!({ "_id": right.as_str(), "contents": { "y": {} } }))
        .expect("right");
    let x = item_at(&session, &left, &["contents", "x"]);
    let y = item_at(&session, &right, &["contents", "y"]);

    session.store().armed.set(true);
    let err = session
        .link_to(&x, &y, None, Direction::Source)
        .expect_err("right changed underneath");
    assert!(matches!(err, MureError::Conflict(_)));

    let left_doc = session.get_document(&left).expect("left");
    assert_eq!(left_doc.rev().map(|r| r.generation()), Some(1));
    assert!(left_doc.raw()["contents"]["x"].get("$edges").is_none());
    assert!(left_doc.raw()["orphanEdges"].get("0").is_none());

    // with nobody racing, the same link lands on both ends
    let y = item_at(&session, &right, &["contents", "y"]);
    let edge = session.link_to(&x, &y, None, Direction::Source).expect("link");
    assert_eq!(session.connected_edges(&y).expect("edges"), vec![edge]);
}
