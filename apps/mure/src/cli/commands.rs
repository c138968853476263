//! # CLI Command Implementations
//!
//! Each command opens the redb store, wraps it in a `Session`, runs one
//! operation and prints the result as text or, with `--json-mode`, as JSON.

use crate::config::Settings;
use mure_core::{
    DocId, Direction, IdRange, Item, MureError, RedbStore, SelectionContext, Session, adapter_for,
};
use serde_json::{Value, json};
use std::io::Write;
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of an uploaded document (100 MB).
const MAX_UPLOAD_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Maximum size of an imported graph file (500 MB).
const MAX_IMPORT_FILE_SIZE: u64 = 500 * 1024 * 1024;

/// Canonicalize an input path and check it is a regular file within `max_size`.
fn validate_input_file(path: &Path, max_size: u64) -> Result<PathBuf, MureError> {
    let canonical = path.canonicalize().map_err(|e| {
        MureError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;
    if !canonical.is_file() {
        return Err(MureError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }
    let metadata = std::fs::metadata(&canonical)
        .map_err(|e| MureError::IoError(format!("Cannot read file metadata: {}", e)))?;
    if metadata.len() > max_size {
        return Err(MureError::SerializationError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(canonical)
}

fn read_input(path: &Path, max_size: u64) -> Result<String, MureError> {
    let canonical = validate_input_file(path, max_size)?;
    std::fs::read_to_string(&canonical)
        .map_err(|e| MureError::IoError(format!("Cannot read '{}': {}", path.display(), e)))
}

/// Resolve an output path against its canonical parent directory.
fn validate_output_path(path: &Path) -> Result<PathBuf, MureError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let canonical_parent = parent.canonicalize().map_err(|e| {
        MureError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;
    if !canonical_parent.is_dir() {
        return Err(MureError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }
    let filename = path
        .file_name()
        .ok_or_else(|| MureError::IoError("Output path has no filename".to_string()))?;
    Ok(canonical_parent.join(filename))
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Open the database named by `settings` and wrap it in a session.
pub fn open_session(settings: &Settings) -> Result<Session<RedbStore>, MureError> {
    let store = RedbStore::open(&settings.database)?;
    Ok(Session::new(store)
        .with_options(settings.standardize)
        .with_observer(|error: &MureError| eprintln!("warning: {error}")))
}

fn print_json(value: &Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

fn confirm(settings: &Settings, message: &str) {
    if !settings.quiet {
        println!("{message}");
    }
}

// =============================================================================
// DOCUMENT COMMANDS
// =============================================================================

/// Standardize a JSON file and store it.
pub fn cmd_upload(
    settings: &Settings,
    file: &Path,
    id: Option<&str>,
    as_document: bool,
) -> Result<(), MureError> {
    let text = read_input(file, MAX_UPLOAD_FILE_SIZE)?;
    let parsed: Value = serde_json::from_str(&text)?;

    let mut raw = if as_document {
        match parsed {
            Value::Object(map) => map,
            _ => {
                return Err(MureError::SerializationError(
                    "--as-document needs a JSON object".to_string(),
                ));
            }
        }
    } else {
        let mut map = serde_json::Map::new();
        if let Some(name) = file.file_name().and_then(|n| n.to_str()) {
            map.insert("filename".to_string(), Value::String(name.to_string()));
        }
        map.insert("contents".to_string(), parsed);
        map
    };
    if let Some(id) = id {
        raw.insert("_id".to_string(), Value::String(DocId::new(id)?.as_str().to_string()));
    }

    let mut session = open_session(settings)?;
    let doc = session.upload(Value::Object(raw))?;
    let rev = doc.rev().map(|r| r.as_str().to_string()).unwrap_or_default();

    if settings.json_mode {
        print_json(&json!({ "id": doc.id().as_str(), "rev": rev }));
    } else {
        confirm(settings, &format!("Uploaded {} ({rev})", doc.id()));
    }
    Ok(())
}

/// The id range a `list` invocation asks for. Open bounds default to the
/// ends of [`IdRange::all`].
pub fn id_range(prefix: Option<&str>, from: Option<String>, to: Option<String>) -> IdRange {
    if let Some(prefix) = prefix {
        return IdRange::prefix(prefix);
    }
    if from.is_none() && to.is_none() {
        return IdRange::all();
    }
    let all = IdRange::all();
    IdRange::between(
        from.unwrap_or_else(|| all.start().to_string()),
        to.unwrap_or_else(|| all.end().to_string()),
    )
}

/// List stored documents.
pub fn cmd_list(settings: &Settings, range: &IdRange) -> Result<(), MureError> {
    let session = open_session(settings)?;
    let ids = session.list_documents(range)?;

    if settings.json_mode {
        let ids: Vec<&str> = ids.iter().map(DocId::as_str).collect();
        print_json(&json!(ids));
        return Ok(());
    }
    if ids.is_empty() {
        confirm(settings, "No documents");
    }
    for id in &ids {
        println!("{id}");
    }
    Ok(())
}

/// Print a document, or the items a relative selector picks inside it.
pub fn cmd_show(settings: &Settings, id: &str, selector: Option<&str>) -> Result<(), MureError> {
    let session = open_session(settings)?;
    let id = DocId::new(id)?;
    let Some(selector) = selector else {
        let doc = session.get_document(&id)?;
        print_json(doc.raw());
        return Ok(());
    };

    let selection = session.select_all(
        selector,
        SelectionContext::Items(vec![Item::document(id)]),
    )?;
    let mut values = Vec::new();
    for item in session.resolve(&selection)? {
        values.push(session.value_of(&item)?);
    }
    match values.as_slice() {
        [single] if !settings.json_mode => print_json(single),
        _ => print_json(&Value::Array(values)),
    }
    Ok(())
}

/// Delete a document.
pub fn cmd_delete(settings: &Settings, id: &str) -> Result<(), MureError> {
    let mut session = open_session(settings)?;
    let id = DocId::new(id)?;
    let tombstone = session.delete_document(&id)?;

    if settings.json_mode {
        print_json(&json!({ "id": id.as_str(), "rev": tombstone.as_str(), "deleted": true }));
    } else {
        confirm(settings, &format!("Deleted {id} ({tombstone})"));
    }
    Ok(())
}

// =============================================================================
// SELECTION AND GRAPH COMMANDS
// =============================================================================

/// Resolve a selector against the whole store.
pub fn cmd_select(settings: &Settings, selector: &str, with_values: bool) -> Result<(), MureError> {
    let session = open_session(settings)?;
    let selection = session.select_all(selector, SelectionContext::None)?;
    let items = session.resolve(&selection)?;

    if settings.json_mode {
        let mut out = Vec::with_capacity(items.len());
        for item in &items {
            let mut entry = json!({
                "type": item.item_type().name(),
                "selector": item.unique_selector(),
            });
            if with_values {
                entry["value"] = session.value_of(item)?;
            }
            out.push(entry);
        }
        print_json(&Value::Array(out));
        return Ok(());
    }

    for item in &items {
        if with_values {
            let value = session.value_of(item)?;
            println!("{}\t{}\t{}", item.item_type(), item.unique_selector(), value);
        } else {
            println!("{}\t{}", item.item_type(), item.unique_selector());
        }
    }
    if items.is_empty() {
        confirm(settings, "No matches");
    }
    Ok(())
}

/// Connect two items with an edge.
pub fn cmd_link(
    settings: &Settings,
    a: &str,
    b: &str,
    container: Option<&str>,
    direction: &str,
) -> Result<(), MureError> {
    let direction = Direction::parse(direction)?;
    let mut session = open_session(settings)?;
    let a = session.item(a)?;
    let b = session.item(b)?;
    let container = container.map(|selector| session.item(selector)).transpose()?;
    let edge = session.link_to(&a, &b, container.as_ref(), direction)?;

    if settings.json_mode {
        print_json(&json!({ "edge": edge.unique_selector(), "direction": direction.as_str() }));
    } else {
        confirm(settings, &format!("Linked {}", edge.unique_selector()));
    }
    Ok(())
}

/// Add or remove a class.
pub fn cmd_tag(settings: &Settings, item: &str, class: &str, remove: bool) -> Result<(), MureError> {
    let mut session = open_session(settings)?;
    let item = session.item(item)?;
    if remove {
        session.remove_class(&item, class)?;
    } else {
        session.add_class(&item, class)?;
    }
    let item = session.item(&item.unique_selector())?;
    let classes = session.class_names(&item)?;

    if settings.json_mode {
        print_json(&json!({ "item": item.unique_selector(), "classes": classes }));
    } else {
        confirm(settings, &format!("{}: {}", item.unique_selector(), classes.join(", ")));
    }
    Ok(())
}

// =============================================================================
// FORMAT COMMANDS
// =============================================================================

fn adapter(format: &str) -> Result<Box<dyn mure_core::FormatAdapter>, MureError> {
    adapter_for(format)
        .ok_or_else(|| MureError::InvalidIdentifier(format!("unknown format '{format}'")))
}

/// Import graph data into a document.
pub fn cmd_import(settings: &Settings, id: &str, input: &Path, format: &str) -> Result<(), MureError> {
    let adapter = adapter(format)?;
    let text = read_input(input, MAX_IMPORT_FILE_SIZE)?;
    let mut session = open_session(settings)?;
    let doc = session.import_with(adapter.as_ref(), &DocId::new(id)?, &text)?;

    if settings.json_mode {
        let rev = doc.rev().map(|r| r.as_str().to_string());
        print_json(&json!({ "id": doc.id().as_str(), "rev": rev, "format": adapter.format_name() }));
    } else {
        confirm(settings, &format!("Imported {} into {}", input.display(), doc.id()));
    }
    Ok(())
}

/// Export a document's graph to a file or stdout.
pub fn cmd_export(
    settings: &Settings,
    id: &str,
    output: Option<&Path>,
    format: &str,
    classes: Option<Vec<String>>,
    pretty: bool,
) -> Result<(), MureError> {
    let adapter = adapter(format)?;
    let session = open_session(settings)?;
    let options = settings.export_options(classes, pretty);
    let exported = session.export_with(adapter.as_ref(), &DocId::new(id)?, &options)?;

    match output {
        Some(path) => {
            let path = validate_output_path(path)?;
            std::fs::write(&path, &exported.data)
                .map_err(|e| MureError::IoError(format!("Write '{}': {}", path.display(), e)))?;
            if settings.json_mode {
                print_json(&json!({
                    "output": path.to_string_lossy(),
                    "mime_type": exported.mime_type,
                    "bytes": exported.data.len(),
                }));
            } else {
                confirm(settings, &format!("Exported {id} to {}", path.display()));
            }
        }
        None => {
            std::io::stdout()
                .write_all(&exported.data)
                .map_err(|e| MureError::IoError(e.to_string()))?;
        }
    }
    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Create an empty database.
pub fn cmd_init(settings: &Settings, force: bool) -> Result<(), MureError> {
    let path = &settings.database;
    if path.exists() {
        if !force {
            return Err(MureError::Conflict(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(path)
            .map_err(|e| MureError::IoError(format!("Remove '{}': {}", path.display(), e)))?;
    }
    RedbStore::open(path)?;
    confirm(settings, &format!("Initialized new database at {}", path.display()));
    Ok(())
}
