//! CSV export: a node table and an edge table, separated by a blank line.

use super::{ExportOptions, ExportedData, FormatAdapter, GraphView, cell, write_failure};
use crate::document::Document;
use crate::types::MureError;

const FORMAT: &str = "csv";

/// The CSV adapter. Export only.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvTables;

fn render(header: &[String], rows: &[Vec<String>]) -> Result<Vec<u8>, MureError> {
    let fail = write_failure(FORMAT);
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(header).map_err(|e| fail(e.to_string()))?;
    for row in rows {
        writer.write_record(row).map_err(|e| fail(e.to_string()))?;
    }
    writer.into_inner().map_err(|e| fail(e.to_string()))
}

impl FormatAdapter for CsvTables {
    fn format_name(&self) -> &'static str {
        FORMAT
    }

    fn export_data(
        &self,
        doc: &Document,
        options: &ExportOptions,
    ) -> Result<ExportedData, MureError> {
        let view = GraphView::build(doc, options)?;

        let node_fields = GraphView::field_names(view.nodes.iter().map(|n| &n.fields));
        let mut header = vec!["index".to_string(), "selector".to_string(), "classes".to_string()];
        header.extend(node_fields.iter().cloned());
        let rows: Vec<Vec<String>> = view
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| {
                let mut row = vec![i.to_string(), node.selector.clone(), node.classes.join(";")];
                row.extend(node_fields.iter().map(|f| cell(node.fields.get(f))));
                row
            })
            .collect();
        let mut data = render(&header, &rows)?;

        let edge_fields = GraphView::field_names(view.edges.iter().map(|e| &e.fields));
        let mut header = ["source", "target", "directed", "selector", "classes"]
            .map(str::to_string)
            .to_vec();
        header.extend(edge_fields.iter().cloned());
        let mut rows = Vec::new();
        for edge in &view.edges {
            for (source, target, directed) in &edge.pairs {
                let mut row = vec![
                    source.to_string(),
                    target.to_string(),
                    directed.to_string(),
                    edge.selector.clone(),
                    edge.classes.join(";"),
                ];
                row.extend(edge_fields.iter().map(|f| cell(edge.fields.get(f))));
                rows.push(row);
            }
        }
        data.push(b'\n');
        data.extend(render(&header, &rows)?);

        Ok(ExportedData {
            data,
            mime_type: "text/csv",
            extension: "csv",
        })
    }
}
