//! GEXF 1.2 export for Gephi and friends.

use super::{ExportOptions, ExportedData, FormatAdapter, GraphView, display_label, write_failure};
use crate::document::Document;
use crate::types::MureError;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};

const FORMAT: &str = "gexf";
const NAMESPACE: &str = "http://www.gexf.net/1.2draft";

/// The GEXF adapter. Export only.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gexf;

impl FormatAdapter for Gexf {
    fn format_name(&self) -> &'static str {
        FORMAT
    }

    fn export_data(
        &self,
        doc: &Document,
        options: &ExportOptions,
    ) -> Result<ExportedData, MureError> {
        let view = GraphView::build(doc, options)?;
        let fail = write_failure(FORMAT);
        let mut writer = if options.pretty {
            Writer::new_with_indent(Vec::new(), b' ', 2)
        } else {
            Writer::new(Vec::new())
        };
        let mut emit = |event: Event<'_>| writer.write_event(event).map_err(|e| fail(e.to_string()));

        emit(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        emit(Event::Start(
            BytesStart::new("gexf").with_attributes([("xmlns", NAMESPACE), ("version", "1.2")]),
        ))?;
        emit(Event::Start(
            BytesStart::new("graph").with_attributes([("mode", "static"), ("defaultedgetype", "directed")]),
        ))?;

        for class in ["node", "edge"] {
            emit(Event::Start(
                BytesStart::new("attributes").with_attributes([("class", class), ("mode", "static")]),
            ))?;
            emit(Event::Empty(BytesStart::new("attribute").with_attributes([
                ("id", "classes"),
                ("title", "classes"),
                ("type", "string"),
            ])))?;
            emit(Event::End(BytesEnd::new("attributes")))?;
        }

        emit(Event::Start(BytesStart::new("nodes")))?;
        for (i, node) in view.nodes.iter().enumerate() {
            let id = i.to_string();
            let label = display_label(node);
            emit(Event::Start(
                BytesStart::new("node").with_attributes([("id", id.as_str()), ("label", label.as_str())]),
            ))?;
            let classes = node.classes.join(",");
            emit(Event::Start(BytesStart::new("attvalues")))?;
            emit(Event::Empty(
                BytesStart::new("attvalue").with_attributes([("for", "classes"), ("value", classes.as_str())]),
            ))?;
            emit(Event::End(BytesEnd::new("attvalues")))?;
            emit(Event::End(BytesEnd::new("node")))?;
        }
        emit(Event::End(BytesEnd::new("nodes")))?;

        emit(Event::Start(BytesStart::new("edges")))?;
        let mut next_id = 0usize;
        for edge in &view.edges {
            let classes = edge.classes.join(",");
            for (source, target, directed) in &edge.pairs {
                let id = next_id.to_string();
                next_id += 1;
                let source = source.to_string();
                let target = target.to_string();
                let kind = if *directed { "directed" } else { "undirected" };
                emit(Event::Start(BytesStart::new("edge").with_attributes([
                    ("id", id.as_str()),
                    ("source", source.as_str()),
                    ("target", target.as_str()),
                    ("type", kind),
                ])))?;
                emit(Event::Start(BytesStart::new("attvalues")))?;
                emit(Event::Empty(
                    BytesStart::new("attvalue").with_attributes([("for", "classes"), ("value", classes.as_str())]),
                ))?;
                emit(Event::End(BytesEnd::new("attvalues")))?;
                emit(Event::End(BytesEnd::new("edge")))?;
            }
        }
        emit(Event::End(BytesEnd::new("edges")))?;

        emit(Event::End(BytesEnd::new("graph")))?;
        emit(Event::End(BytesEnd::new("gexf")))?;

        Ok(ExportedData {
            data: writer.into_inner(),
            mime_type: "application/gexf+xml",
            extension: "gexf",
        })
    }
}
