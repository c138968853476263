//! # Reserved Keys and Limits
//!
//! Hardcoded constants shared by the standardization engine, the item
//! hierarchy and the selector resolver.
//!
//! ## Reserved Keys
//!
//! Keys starting with `$` (and the `_id` / `_rev` bookkeeping keys) carry
//! structure rather than user content. They are never visited by selectors
//! and never standardized as children.

// =============================================================================
// RESERVED ITEM KEYS
// =============================================================================

/// Stable identifier of a container, `"@" + path expression`.
pub const ID_KEY: &str = "_id";

/// Store revision of a document.
pub const REV_KEY: &str = "_rev";

/// Marks an object that was canonicalised from an array.
pub const WAS_ARRAY_KEY: &str = "$wasArray";

/// Set selector -> `true` on every Taggable.
pub const TAGS_KEY: &str = "$tags";

/// Edge selector -> `true` on every Node.
pub const EDGES_KEY: &str = "$edges";

/// Node selector -> direction counters on every Edge.
pub const NODES_KEY: &str = "$nodes";

/// Member selector -> `true` on every Set.
pub const MEMBERS_KEY: &str = "$members";

/// Marks the canonical Date object.
pub const IS_DATE_KEY: &str = "$isDate";

/// Date string inside the canonical Date object.
pub const DATE_STR_KEY: &str = "str";

// =============================================================================
// RESERVED DOCUMENT KEYS
// =============================================================================

pub const CONTENTS_KEY: &str = "contents";
pub const CLASSES_KEY: &str = "classes";
pub const ORPHAN_NODES_KEY: &str = "orphanNodes";
pub const ORPHAN_EDGES_KEY: &str = "orphanEdges";

pub const MIME_TYPE_KEY: &str = "mimeType";
pub const FILENAME_KEY: &str = "filename";
pub const CHARSET_KEY: &str = "charset";

// =============================================================================
// DOCUMENT IDENTITY
// =============================================================================

/// First characters a document id may not start with.
pub const RESERVED_ID_PREFIXES: [char; 2] = ['_', '$'];

/// Fallback mimeType when neither the id nor the document names one.
pub const DEFAULT_MIME_TYPE: &str = "application/json";

/// Fallback charset.
pub const DEFAULT_CHARSET: &str = "UTF-8";

/// Prefix of auto-assigned filenames (`Untitled 1`, `Untitled 2`, ...).
pub const UNTITLED_PREFIX: &str = "Untitled ";

/// MimeTypes recognized without a warning.
pub const KNOWN_MIME_TYPES: &[&str] = &[
    "application/json",
    "application/ld+json",
    "application/geo+json",
    "application/xml",
    "application/gexf+xml",
    "application/zip",
    "image/svg+xml",
    "text/csv",
    "text/plain",
    "text/xml",
    "text/html",
    "text/tab-separated-values",
];

// =============================================================================
// LIMITS
// =============================================================================

/// Maximum depth walked by recursive-descent selector segments (`..`).
pub const MAX_TRAVERSAL_DEPTH: usize = 256;

/// Maximum accepted selector length.
pub const MAX_SELECTOR_LENGTH: usize = 4096;

// =============================================================================
// PERSISTENCE FORMAT
// =============================================================================

/// Magic bytes for stored document records.
pub const MAGIC_BYTES: &[u8; 4] = b"MURE";

/// Current record format version.
pub const FORMAT_VERSION: u8 = 1;

/// Whether `key` is bookkeeping rather than user content.
#[must_use]
pub fn is_reserved_key(key: &str) -> bool {
    key.starts_with('$') || key == ID_KEY || key == REV_KEY
}
