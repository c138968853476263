//! # File-Format Adapters
//!
//! Adapters move graph data between a document and an external text format.
//! Export works on classes: the members of the selected Node/Edge classes
//! are what gets written. A document without any classes exports every
//! node and edge it holds.
//!
//! | Adapter | Import | Export |
//! |---------|--------|--------|
//! | [`D3Json`] | yes | yes |
//! | [`Gexf`] | no | yes |
//! | [`CsvTables`] | no | yes |

mod d3;
mod gexf;
mod table;

pub use d3::D3Json;
pub use gexf::Gexf;
pub use table::CsvTables;

use crate::document::Document;
use crate::graph::{self, EndpointPair};
use crate::item::coerce::{is_date_object, to_js_string};
use crate::item::{Item, ItemType};
use crate::path::ItemPath;
use crate::primitives::{CLASSES_KEY, DATE_STR_KEY, MAX_TRAVERSAL_DEPTH, is_reserved_key};
use crate::selector::Selector;
use crate::types::MureError;
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};

// =============================================================================
// ADAPTER TRAIT
// =============================================================================

/// Export settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// Classes to export. `None` exports every class of the document.
    pub include_classes: Option<Vec<String>>,
    /// Indent text output where the format allows it.
    pub pretty: bool,
}

/// Bytes produced by an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedData {
    pub data: Vec<u8>,
    pub mime_type: &'static str,
    pub extension: &'static str,
}

/// A graph file format.
pub trait FormatAdapter {
    /// Short name used on the command line and in errors.
    fn format_name(&self) -> &'static str;

    /// Parse `text` into `doc`.
    fn import_data(&self, doc: &mut Document, text: &str) -> Result<(), MureError> {
        let _ = (doc, text);
        Err(MureError::ParseFailure {
            format: self.format_name(),
            reason: "import is not supported".to_string(),
        })
    }

    /// Render `doc`.
    fn export_data(&self, doc: &Document, options: &ExportOptions)
    -> Result<ExportedData, MureError>;
}

/// Look up a shipped adapter by name (`d3`, `gexf`, `csv`).
#[must_use]
pub fn adapter_for(name: &str) -> Option<Box<dyn FormatAdapter>> {
    match name.to_ascii_lowercase().as_str() {
        "d3" | "d3json" | "json" => Some(Box::new(D3Json)),
        "gexf" => Some(Box::new(Gexf)),
        "csv" => Some(Box::new(CsvTables)),
        _ => None,
    }
}

// =============================================================================
// GRAPH VIEW
// =============================================================================

/// A node as exporters see it.
#[derive(Debug, Clone)]
pub(crate) struct ViewNode {
    pub selector: String,
    pub classes: Vec<String>,
    pub fields: Map<String, Value>,
}

/// An edge as exporters see it. `pairs` index into [`GraphView::nodes`].
#[derive(Debug, Clone)]
pub(crate) struct ViewEdge {
    pub selector: String,
    pub classes: Vec<String>,
    pub fields: Map<String, Value>,
    pub pairs: Vec<(usize, usize, bool)>,
}

/// The exported slice of one document's graph.
#[derive(Debug, Clone, Default)]
pub(crate) struct GraphView {
    pub nodes: Vec<ViewNode>,
    pub edges: Vec<ViewEdge>,
}

impl GraphView {
    pub(crate) fn build(doc: &Document, options: &ExportOptions) -> Result<Self, MureError> {
        let classes = class_keys(doc);
        let candidates = match (&options.include_classes, classes.is_empty()) {
            (None, true) => all_graph_items(doc)?,
            (selected, _) => {
                let selected = selected.clone().unwrap_or(classes.clone());
                let mut found = Vec::new();
                for name in &selected {
                    if !classes.contains(name) {
                        tracing::warn!(doc = %doc.id(), class = %name, "class not found, skipped");
                        continue;
                    }
                    let set = Item::infer(doc, doc.id(), ItemPath::from_keys([CLASSES_KEY, name]))?;
                    for selector in graph::members(doc, &set)? {
                        match resolve_local(doc, &selector) {
                            Some(item) => found.push(item),
                            None => {
                                tracing::debug!(member = %selector, "member outside the document, skipped");
                            }
                        }
                    }
                }
                found
            }
        };

        let mut view = Self::default();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut edges = Vec::new();
        for item in candidates {
            if item.item_type().is_node() {
                view.add_node(doc, &item, &mut index)?;
            } else if item.item_type().is_edge() && !edges.contains(&item) {
                edges.push(item);
            }
        }

        for edge in edges {
            let mut pairs = Vec::new();
            for EndpointPair {
                source,
                target,
                directed,
            } in graph::endpoint_pairs(doc, &edge)?
            {
                let source = view.endpoint(doc, &source, &mut index)?;
                let target = view.endpoint(doc, &target, &mut index)?;
                match source.zip(target) {
                    Some((s, t)) => pairs.push((s, t, directed)),
                    None => tracing::debug!(edge = %edge.unique_selector(), "endpoint outside the document, skipped"),
                }
            }
            view.edges.push(ViewEdge {
                selector: edge.unique_selector(),
                classes: graph::class_names(doc, &edge)?,
                fields: fields_of(edge.object(doc)?),
                pairs,
            });
        }
        Ok(view)
    }

    fn add_node(
        &mut self,
        doc: &Document,
        item: &Item,
        index: &mut HashMap<String, usize>,
    ) -> Result<usize, MureError> {
        let selector = item.unique_selector();
        if let Some(existing) = index.get(&selector) {
            return Ok(*existing);
        }
        let position = self.nodes.len();
        self.nodes.push(ViewNode {
            selector: selector.clone(),
            classes: graph::class_names(doc, item)?,
            fields: fields_of(item.object(doc)?),
        });
        index.insert(selector, position);
        Ok(position)
    }

    fn endpoint(
        &mut self,
        doc: &Document,
        selector: &str,
        index: &mut HashMap<String, usize>,
    ) -> Result<Option<usize>, MureError> {
        if let Some(existing) = index.get(selector) {
            return Ok(Some(*existing));
        }
        match resolve_local(doc, selector) {
            Some(item) if item.item_type().is_node() => self.add_node(doc, &item, index).map(Some),
            _ => Ok(None),
        }
    }

    /// Union of field names in first-appearance order.
    pub(crate) fn field_names<'a>(rows: impl Iterator<Item = &'a Map<String, Value>>) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for row in rows {
            for key in row.keys() {
                if !names.contains(key) {
                    names.push(key.clone());
                }
            }
        }
        names
    }
}

fn class_keys(doc: &Document) -> Vec<String> {
    doc.object(&ItemPath::from_keys([CLASSES_KEY]))
        .map(|classes| {
            classes
                .keys()
                .filter(|key| !is_reserved_key(key))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

/// Resolve a unique selector that points into `doc` itself.
fn resolve_local(doc: &Document, selector: &str) -> Option<Item> {
    let (id, path) = Selector::parse(selector).ok()?.as_unique_path()?;
    if &id != doc.id() {
        return None;
    }
    Item::infer(doc, &id, path).ok()
}

/// Every node and edge in `doc`, breadth-first in key order.
fn all_graph_items(doc: &Document) -> Result<Vec<Item>, MureError> {
    let mut found = Vec::new();
    let mut queue = VecDeque::from([Item::document(doc.id().clone())]);
    while let Some(item) = queue.pop_front() {
        if item.item_type().is_node() || item.item_type().is_edge() {
            found.push(item.clone());
        }
        if item.path().len() < MAX_TRAVERSAL_DEPTH && item.item_type() != ItemType::Root {
            queue.extend(item.children(doc)?);
        }
    }
    Ok(found)
}

/// Primitive user fields of an item, flattened for tabular formats.
fn fields_of(object: &Map<String, Value>) -> Map<String, Value> {
    object
        .iter()
        .filter(|(key, _)| !is_reserved_key(key))
        .filter_map(|(key, value)| {
            let flat = match value {
                Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => value.clone(),
                date if is_date_object(date) => date.get(DATE_STR_KEY).cloned().unwrap_or(Value::Null),
                _ => return None,
            };
            Some((key.clone(), flat))
        })
        .collect()
}

/// Text form of a flattened field.
pub(crate) fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(value) => to_js_string(value),
    }
}

/// A label for display-oriented formats: `label`, `name` or `id`, else the
/// selector.
pub(crate) fn display_label(node: &ViewNode) -> String {
    ["label", "name", "id"]
        .iter()
        .find_map(|key| node.fields.get(*key).map(|v| cell(Some(v))))
        .filter(|label| !label.is_empty())
        .unwrap_or_else(|| node.selector.clone())
}

pub(crate) fn write_failure(format: &'static str) -> impl Fn(String) -> MureError {
    move |reason| MureError::ParseFailure { format, reason }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::standardize::{StandardizeOptions, standardize_document};
    use crate::store::MemoryStore;
    use crate::types::Direction;
    use serde_json::json;

    pub(crate) fn linked_doc() -> Document {
        let mut doc = standardize_document(
            json!({
                "_id": "application/json;g.json",
                "contents": {
                    "a": { "name": "Ann", "age": 3, "nested": { "x": 1 } },
                    "b": { "name": "Bob" },
                    "c": { "name": "Cy" }
                }
            }),
            &MemoryStore::new(),
            StandardizeOptions::default(),
        )
        .expect("standardize");
        let id = doc.id().clone();
        let at = |key: &str| ItemPath::from_keys(["contents", key]);
        let a = Item::infer(&doc, &id, at("a")).expect("a");
        let b = Item::infer(&doc, &id, at("b")).expect("b");
        let c = Item::infer(&doc, &id, at("c")).expect("c");
        graph::link_to(&mut doc, &a, &b, None, Direction::Source).expect("a->b");
        graph::link_to(&mut doc, &b, &c, None, Direction::Undirected).expect("b--c");
        doc
    }

    #[test]
    fn unclassed_documents_export_everything() {
        let view = GraphView::build(&linked_doc(), &ExportOptions::default()).expect("view");
        assert_eq!(view.nodes.len(), 3);
        assert_eq!(view.edges.len(), 2);
        assert_eq!(view.edges[0].pairs, vec![(0, 1, true)]);
        assert_eq!(view.edges[1].pairs, vec![(1, 2, false)]);
    }

    #[test]
    fn fields_keep_only_primitives() {
        let view = GraphView::build(&linked_doc(), &ExportOptions::default()).expect("view");
        let ann = &view.nodes[0].fields;
        assert_eq!(ann.get("name"), Some(&json!("Ann")));
        assert!(!ann.contains_key("nested"));
        assert_eq!(display_label(&view.nodes[0]), "Ann");
    }

    #[test]
    fn class_selection_limits_export() {
        let mut doc = linked_doc();
        let id = doc.id().clone();
        let a = Item::infer(&doc, &id, ItemPath::from_keys(["contents", "a"])).expect("a");
        graph::add_class(&mut doc, &a, "people").expect("class");
        let options = ExportOptions {
            include_classes: Some(vec!["people".to_string()]),
            pretty: false,
        };
        let view = GraphView::build(&doc, &options).expect("view");
        assert_eq!(view.nodes.len(), 1);
        assert!(view.edges.is_empty());
        assert_eq!(view.nodes[0].classes, vec!["people".to_string()]);
    }

    #[test]
    fn adapters_are_found_by_name() {
        assert_eq!(adapter_for("GEXF").map(|a| a.format_name()), Some("gexf"));
        assert!(adapter_for("svg").is_none());
    }
}
