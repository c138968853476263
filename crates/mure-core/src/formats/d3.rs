//! D3 force-graph JSON: `{"nodes": [...], "links": [{"source", "target"}]}`.
//!
//! Link endpoints may be node indices, values of a node's `id` field, or
//! objects carrying either. Imported nodes land in `contents.nodes` with
//! class `node`, links in `contents.links` with class `link`.

use super::{ExportOptions, ExportedData, FormatAdapter, GraphView};
use crate::document::Document;
use crate::graph;
use crate::item::coerce::to_js_string;
use crate::item::{Item, ItemType};
use crate::path::ItemPath;
use crate::primitives::{CONTENTS_KEY, ID_KEY, WAS_ARRAY_KEY, is_reserved_key};
use crate::standardize::{InferOptions, StandardizeContext, infer_type, standardize_value};
use crate::types::{Direction, MureError};
use serde_json::{Map, Value};
use std::collections::HashMap;

const FORMAT: &str = "d3";
const NODE_CLASS: &str = "node";
const LINK_CLASS: &str = "link";

/// The D3 JSON adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct D3Json;

fn failure(reason: impl Into<String>) -> MureError {
    MureError::ParseFailure {
        format: FORMAT,
        reason: reason.into(),
    }
}

/// An empty array-like container at `path`.
fn array_container(path: &ItemPath) -> Value {
    let mut map = Map::new();
    map.insert(ID_KEY.to_string(), Value::String(path.local_id()));
    map.insert(WAS_ARRAY_KEY.to_string(), Value::Bool(true));
    Value::Object(map)
}

/// Node index an endpoint refers to.
fn endpoint_index(
    endpoint: Option<&Value>,
    by_id: &HashMap<String, usize>,
    count: usize,
) -> Result<usize, MureError> {
    let index = match endpoint {
        Some(Value::Number(n)) => n.as_u64().map(|n| n as usize),
        Some(Value::String(id)) => by_id.get(id).copied(),
        Some(Value::Object(node)) => match (node.get("index"), node.get("id")) {
            (Some(Value::Number(n)), _) => n.as_u64().map(|n| n as usize),
            (_, Some(id)) => by_id.get(&to_js_string(id)).copied(),
            _ => None,
        },
        _ => None,
    };
    match index {
        Some(index) if index < count => Ok(index),
        _ => Err(failure(format!(
            "link endpoint {} does not name a node",
            endpoint.map_or_else(|| "(missing)".to_string(), Value::to_string)
        ))),
    }
}

impl FormatAdapter for D3Json {
    fn format_name(&self) -> &'static str {
        FORMAT
    }

    fn import_data(&self, doc: &mut Document, text: &str) -> Result<(), MureError> {
        let parsed: Value = serde_json::from_str(text).map_err(|e| failure(e.to_string()))?;
        let Value::Object(mut data) = parsed else {
            return Err(failure("expected a JSON object"));
        };
        let nodes = match data.shift_remove("nodes") {
            Some(Value::Array(nodes)) => nodes,
            _ => return Err(failure("expected a \"nodes\" array")),
        };
        let links = match data.shift_remove("links") {
            Some(Value::Array(links)) => links,
            None => Vec::new(),
            Some(_) => return Err(failure("\"links\" must be an array")),
        };

        let id = doc.id().clone();
        let nodes_path = ItemPath::from_keys([CONTENTS_KEY, "nodes"]);
        let links_path = ItemPath::from_keys([CONTENTS_KEY, "links"]);
        if doc.get(&nodes_path).is_some() || doc.get(&links_path).is_some() {
            return Err(MureError::Conflict(format!(
                "{id} already holds contents.nodes or contents.links"
            )));
        }

        let mut by_id = HashMap::new();
        for (i, node) in nodes.iter().enumerate() {
            if let Some(value) = node.get("id") {
                by_id.entry(to_js_string(value)).or_insert(i);
            }
        }

        doc.set(&nodes_path, array_container(&nodes_path))?;
        let mut node_items = Vec::with_capacity(nodes.len());
        for (i, node) in nodes.into_iter().enumerate() {
            let path = nodes_path.child(i.to_string());
            let raw = match node {
                Value::Object(_) => node,
                other => {
                    let mut wrapped = Map::new();
                    wrapped.insert("value".to_string(), other);
                    Value::Object(wrapped)
                }
            };
            let ctx = StandardizeContext {
                doc_id: &id,
                path: path.clone(),
                aggressive: false,
            };
            doc.set(&path, standardize_value(ItemType::Node, raw, &ctx))?;
            let item = Item::new(doc, &id, path, ItemType::Node)?;
            graph::add_class(doc, &item, NODE_CLASS)?;
            node_items.push(item);
        }

        doc.set(&links_path, array_container(&links_path))?;
        let container = Item::infer(doc, &id, links_path)?;
        for link in links {
            let Value::Object(mut link) = link else {
                return Err(failure("every link must be an object"));
            };
            let source = endpoint_index(link.get("source"), &by_id, node_items.len())?;
            let target = endpoint_index(link.get("target"), &by_id, node_items.len())?;
            let direction = match link.get("directed") {
                Some(Value::Bool(false)) => Direction::Undirected,
                _ => Direction::Source,
            };
            for key in ["source", "target", "directed"] {
                link.shift_remove(key);
            }

            let edge = graph::link_to(
                doc,
                &node_items[source],
                &node_items[target],
                Some(&container),
                direction,
            )?;
            for (key, value) in link {
                if is_reserved_key(&key) {
                    continue;
                }
                let ctx = StandardizeContext {
                    doc_id: &id,
                    path: edge.path().child(key.as_str()),
                    aggressive: false,
                };
                let value = standardize_value(infer_type(&value, InferOptions::default()), value, &ctx);
                edge.object_mut(doc)?.insert(key, value);
            }
            graph::add_class(doc, &edge, LINK_CLASS)?;
        }
        tracing::debug!(doc = %id, nodes = node_items.len(), "imported d3 graph");
        Ok(())
    }

    fn export_data(
        &self,
        doc: &Document,
        options: &ExportOptions,
    ) -> Result<ExportedData, MureError> {
        let view = GraphView::build(doc, options)?;
        let nodes: Vec<Value> = view
            .nodes
            .iter()
            .map(|node| {
                let mut out = node.fields.clone();
                out.insert("selector".to_string(), Value::String(node.selector.clone()));
                out.insert("classes".to_string(), Value::from(node.classes.clone()));
                Value::Object(out)
            })
            .collect();
        let mut links = Vec::new();
        for edge in &view.edges {
            for (source, target, directed) in &edge.pairs {
                let mut out = edge.fields.clone();
                out.insert("source".to_string(), Value::from(*source));
                out.insert("target".to_string(), Value::from(*target));
                out.insert("directed".to_string(), Value::Bool(*directed));
                out.insert("selector".to_string(), Value::String(edge.selector.clone()));
                out.insert("classes".to_string(), Value::from(edge.classes.clone()));
                links.push(Value::Object(out));
            }
        }

        let mut graph = Map::new();
        graph.insert("nodes".to_string(), Value::Array(nodes));
        graph.insert("links".to_string(), Value::Array(links));
        let graph = Value::Object(graph);
        let data = if options.pretty {
            serde_json::to_vec_pretty(&graph)?
        } else {
            serde_json::to_vec(&graph)?
        };
        Ok(ExportedData {
            data,
            mime_type: "application/json",
            extension: "json",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::standardize::{StandardizeOptions, standardize_document};
    use crate::store::MemoryStore;
    use serde_json::json;

    fn empty_doc() -> Document {
        standardize_document(
            json!({ "_id": "application/json;miserables.json" }),
            &MemoryStore::new(),
            StandardizeOptions::default(),
        )
        .expect("standardize")
    }

    const SAMPLE: &str = r#"{
        "nodes": [{ "id": "Myriel", "group": 1 }, { "id": "Napoleon", "group": 1 }, { "id": "Mlle", "group": 2 }],
        "links": [
            { "source": "Napoleon", "target": "Myriel", "value": 1 },
            { "source": 2, "target": 0, "value": 8, "directed": false }
        ]
    }"#;

    #[test]
    fn import_builds_classed_nodes_and_links() {
        let mut doc = empty_doc();
        D3Json.import_data(&mut doc, SAMPLE).expect("import");
        let id = doc.id().clone();

        let first = Item::infer(&doc, &id, ItemPath::from_keys(["contents", "nodes", "0"])).expect("node");
        assert_eq!(first.item_type(), ItemType::Node);
        assert_eq!(graph::class_names(&doc, &first).expect("classes"), vec!["node".to_string()]);

        let link = Item::infer(&doc, &id, ItemPath::from_keys(["contents", "links", "0"])).expect("link");
        assert_eq!(link.item_type(), ItemType::Edge);
        assert_eq!(doc.raw()["contents"]["links"]["0"]["value"], json!(1));
        let napoleon = ItemPath::from_keys(["contents", "nodes", "1"]).unique_selector(&id);
        assert_eq!(
            graph::node_selectors(&doc, &link, Some(false)).expect("sources"),
            vec![napoleon]
        );
    }

    #[test]
    fn export_emits_one_link_per_pair() {
        let mut doc = empty_doc();
        D3Json.import_data(&mut doc, SAMPLE).expect("import");
        let exported = D3Json.export_data(&doc, &ExportOptions::default()).expect("export");
        let graph: Value = serde_json::from_slice(&exported.data).expect("json");

        assert_eq!(graph["nodes"].as_array().map(Vec::len), Some(3));
        assert_eq!(graph["nodes"][0]["id"], json!("Myriel"));
        let links = graph["links"].as_array().expect("links");
        assert_eq!(links.len(), 2);
        assert_eq!(links[0]["source"], json!(1));
        assert_eq!(links[0]["target"], json!(0));
        assert_eq!(links[0]["directed"], json!(true));
        assert_eq!(links[1]["directed"], json!(false));
    }

    #[test]
    fn shape_mismatches_are_parse_failures() {
        let mut doc = empty_doc();
        for bad in ["[1, 2]", r#"{"links": []}"#, r#"{"nodes": [], "links": {}}"#, "not json"] {
            let err = D3Json.import_data(&mut doc, bad).expect_err(bad);
            assert!(matches!(err, MureError::ParseFailure { format: "d3", .. }));
        }
        let err = D3Json
            .import_data(&mut doc, r#"{"nodes": [{}], "links": [{"source": 0, "target": 5}]}"#)
            .expect_err("dangling endpoint");
        assert!(matches!(err, MureError::ParseFailure { .. }));
    }
}
