//! # Item Paths
//!
//! An `ItemPath` is the ordered list of keys from a document's root to one
//! location in its tree. Paths render as bracket/dot expressions:
//!
//! ```text
//! ["contents", "hands", "0"]      ->  $.contents.hands[0]
//! ["classes", "two words"]        ->  $.classes["two words"]
//! ```
//!
//! The local id of a container is `"@" + expression`; its unique selector
//! additionally carries the owning document (`@{"_id":"..."}$...`).

use crate::types::DocId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered keys from the document root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct ItemPath(Vec<String>);

impl ItemPath {
    /// The document root (`$`).
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from keys.
    #[must_use]
    pub fn from_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self(keys.into_iter().map(Into::into).collect())
    }

    /// The keys of this path.
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.0
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this is the document root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The path one key deeper.
    #[must_use]
    pub fn child(&self, key: impl Into<String>) -> Self {
        let mut keys = self.0.clone();
        keys.push(key.into());
        Self(keys)
    }

    /// The containing path, `None` at the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (_, init) = self.0.split_last()?;
        Some(Self(init.to_vec()))
    }

    /// The last key, `None` at the root.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Render as `$.a.b[0]`.
    #[must_use]
    pub fn to_expression(&self) -> String {
        let mut out = String::from("$");
        for key in &self.0 {
            push_segment(&mut out, key);
        }
        out
    }

    /// The stable id stored under `_id`: `"@" + expression`.
    #[must_use]
    pub fn local_id(&self) -> String {
        format!("@{}", self.to_expression())
    }

    /// The canonical address of this path inside `doc`.
    #[must_use]
    pub fn unique_selector(&self, doc: &DocId) -> String {
        format!("@{}{}", doc_anchor(doc), self.to_expression())
    }
}

impl fmt::Display for ItemPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_expression())
    }
}

/// The `{"_id":"..."}` document query that anchors unique selectors.
#[must_use]
pub fn doc_anchor(doc: &DocId) -> String {
    serde_json::json!({ "_id": doc.as_str() }).to_string()
}

/// Whether `key` is rendered as a bracketed index (`[3]`). Digit runs
/// with a leading zero or beyond `i64` are quoted instead.
#[must_use]
pub fn is_index_key(key: &str) -> bool {
    !key.is_empty()
        && key.bytes().all(|b| b.is_ascii_digit())
        && (key == "0" || !key.starts_with('0'))
        && key.parse::<i64>().is_ok()
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn push_segment(out: &mut String, key: &str) {
    if is_index_key(key) {
        out.push('[');
        out.push_str(key);
        out.push(']');
    } else if is_identifier(key) {
        out.push('.');
        out.push_str(key);
    } else {
        out.push('[');
        out.push_str(&serde_json::Value::String(key.to_string()).to_string());
        out.push(']');
    }
}
