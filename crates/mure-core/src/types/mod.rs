//! # Core Type Definitions
//!
//! This module contains the identifier and error types shared by every
//! other module:
//! - Document identifiers (`DocId`) and store revisions (`Revision`)
//! - Link directions (`Direction`)
//! - Error types (`MureError`)
//!
//! ## Identifier Guarantees
//!
//! - A `DocId` never starts with a reserved character (`_` or `$`)
//! - The mimeType half of a `DocId` built with `DocId::from_parts` is lowercase
//! - `Revision` generations are strictly increasing per document

use crate::item::ItemType;
use crate::primitives::{DEFAULT_MIME_TYPE, KNOWN_MIME_TYPES, RESERVED_ID_PREFIXES};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// DOCUMENT IDENTIFIER
// =============================================================================

/// Identifier of a document in the store: `"<mimeType>;<filename>"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocId(String);

impl DocId {
    /// Wrap an existing id string.
    ///
    /// Rejects empty ids and ids whose first character is reserved. The
    /// mimeType half is not checked here; see [`DocId::has_known_mime_type`].
    pub fn new(id: impl Into<String>) -> Result<Self, MureError> {
        let id = id.into();
        match id.chars().next() {
            None => Err(MureError::InvalidIdentifier(
                "document id is empty".to_string(),
            )),
            Some(first) if RESERVED_ID_PREFIXES.contains(&first) => Err(
                MureError::InvalidIdentifier(format!("document id {id:?} starts with {first:?}")),
            ),
            Some(_) => Ok(Self(id)),
        }
    }

    /// Build an id from a mimeType and a filename. The mimeType is lowercased.
    pub fn from_parts(mime_type: &str, filename: &str) -> Result<Self, MureError> {
        Self::new(format!("{};{}", mime_type.to_lowercase(), filename))
    }

    /// The mimeType half, if the id carries one.
    #[must_use]
    pub fn mime_type(&self) -> Option<&str> {
        self.0.split_once(';').map(|(mime, _)| mime)
    }

    /// The filename half. Ids without a `;` are all filename.
    #[must_use]
    pub fn filename(&self) -> &str {
        self.0.split_once(';').map_or(self.0.as_str(), |(_, name)| name)
    }

    /// Whether the mimeType half names a recognized type.
    #[must_use]
    pub fn has_known_mime_type(&self) -> bool {
        self.mime_type().is_some_and(is_known_mime_type)
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether `mime_type` is in the recognized table (case-insensitive).
#[must_use]
pub fn is_known_mime_type(mime_type: &str) -> bool {
    let lower = mime_type.to_lowercase();
    lower == DEFAULT_MIME_TYPE || KNOWN_MIME_TYPES.contains(&lower.as_str())
}

// =============================================================================
// REVISION
// =============================================================================

/// Store-assigned revision marker, formatted `"<generation>-<hex>"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Revision(String);

impl Revision {
    /// Wrap an existing revision string.
    #[must_use]
    pub fn new(rev: impl Into<String>) -> Self {
        Self(rev.into())
    }

    /// Produce the revision following `previous` for a body with `digest`.
    #[must_use]
    pub fn next(previous: Option<&Revision>, digest: u64) -> Self {
        let generation = previous.map_or(0, Revision::generation).saturating_add(1);
        Self(format!("{generation}-{digest:016x}"))
    }

    /// The generation counter. Malformed revisions count as generation 0.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.0
            .split_once('-')
            .and_then(|(generation, _)| generation.parse().ok())
            .unwrap_or(0)
    }

    /// Get the revision as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// DIRECTION
// =============================================================================

/// Direction recorded for one endpoint of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Source,
    Target,
    Undirected,
}

impl Direction {
    /// The direction recorded for the other endpoint.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Source => Self::Target,
            Self::Target => Self::Source,
            Self::Undirected => Self::Undirected,
        }
    }

    /// Key used inside an edge's `$nodes` records.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Target => "target",
            Self::Undirected => "undirected",
        }
    }

    /// Parse a direction name.
    pub fn parse(name: &str) -> Result<Self, MureError> {
        match name.to_lowercase().as_str() {
            "source" => Ok(Self::Source),
            "target" => Ok(Self::Target),
            "undirected" => Ok(Self::Undirected),
            other => Err(MureError::InvalidIdentifier(format!(
                "unknown edge direction {other:?}"
            ))),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in Mure.
///
/// - No silent failures
/// - Use `Result<T, MureError>` for fallible operations
/// - Library code never panics
#[derive(Debug, Error)]
pub enum MureError {
    /// A Node/Edge/Set/Taggable was built over a value missing a reserved field.
    #[error("{item_type} at {path} is missing required field {field}")]
    StructuralPrecondition {
        item_type: ItemType,
        field: &'static str,
        path: String,
    },

    /// `convert_to` was asked for a target outside the variant's table.
    #[error("Conversion from {from} to {to} is not implemented")]
    ConversionUnsupported { from: ItemType, to: ItemType },

    /// A format adapter could not interpret its input.
    #[error("Could not parse {format} input: {reason}")]
    ParseFailure { format: &'static str, reason: String },

    /// A document or item lookup missed.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A malformed document id or other identifier.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A selector had no starting context.
    #[error("Context resolution failed: {0}")]
    ContextResolution(String),

    /// A selector string could not be parsed.
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    /// A write was based on a stale revision.
    #[error("Revision conflict: {0}")]
    Conflict(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O or storage error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl MureError {
    /// Whether this error is a store miss.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<serde_json::Error> for MureError {
    fn from(e: serde_json::Error) -> Self {
        Self::SerializationError(e.to_string())
    }
}

// =============================================================================
// TESTS
// =============================================================================
