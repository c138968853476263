//! # Selector Parsing
//!
//! Selectors address items inside one or more documents.
//!
//! ```text
//! selector   := '@' doc_query? path? | path
//! doc_query  := JSON object (store query)
//! path       := '$' segment*
//! segment    := '.' name | '.*' | '..' name | '..*' | '..[' bracket ']' | '[' bracket ']'
//! bracket    := '*' | int | int? ':' int? | quoted | (int | quoted) (',' (int | quoted))*
//! ```
//!
//! A selector starting with `@` is absolute: its optional doc query picks the
//! starting documents. A selector starting with `$` is relative to whatever
//! context it is resolved against.

use crate::path::ItemPath;
use crate::primitives::MAX_SELECTOR_LENGTH;
use crate::query::DocumentQuery;
use crate::types::{DocId, MureError};
use serde_json::Value;
use std::fmt;

// =============================================================================
// TOKENS
// =============================================================================

/// What one path step matches among a container's children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A literal key (`.name`, `[0]`, `["two words"]`).
    Key(String),
    /// Every child (`.*`, `[*]`).
    Wildcard,
    /// Children by position (`[1:3]`, `[-1]`). Negative bounds count from the end.
    Range { start: Option<i64>, end: Option<i64> },
    /// Several literal keys (`[0,2]`, `["a","b"]`).
    Union(Vec<String>),
}

impl Segment {
    /// Positions in `keys` (a container's non-reserved keys, in order) this
    /// segment selects.
    #[must_use]
    pub fn select(&self, keys: &[&str]) -> Vec<usize> {
        match self {
            Self::Key(key) => keys.iter().position(|k| *k == key.as_str()).into_iter().collect(),
            Self::Wildcard => (0..keys.len()).collect(),
            Self::Range { start, end } => {
                let len = keys.len() as i64;
                let clamp = |bound: i64| -> i64 {
                    if bound < 0 {
                        (len + bound).max(0)
                    } else {
                        bound.min(len)
                    }
                };
                let from = start.map_or(0, clamp);
                let to = end.map_or(len, clamp);
                (from..to.max(from)).map(|i| i as usize).collect()
            }
            Self::Union(wanted) => wanted
                .iter()
                .filter_map(|key| keys.iter().position(|k| *k == key.as_str()))
                .collect(),
        }
    }
}

/// One path step. Recursive steps (`..`) match at any depth below.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub segment: Segment,
    pub recursive: bool,
}

/// Where resolution starts.
#[derive(Debug, Clone)]
pub enum Anchor {
    /// `@...`: documents picked by the query, or the context's documents.
    Absolute { doc_query: Option<DocumentQuery> },
    /// `$...`: each item of the context.
    Relative,
}

// =============================================================================
// SELECTOR
// =============================================================================

/// A parsed selector.
#[derive(Debug, Clone)]
pub struct Selector {
    source: String,
    anchor: Anchor,
    tokens: Vec<Token>,
}

impl Selector {
    /// Parse selector text.
    pub fn parse(text: &str) -> Result<Self, MureError> {
        let source = text.trim();
        if source.len() > MAX_SELECTOR_LENGTH {
            return Err(MureError::InvalidSelector(format!(
                "selector longer than {MAX_SELECTOR_LENGTH} bytes"
            )));
        }
        let (anchor, path) = if let Some(rest) = source.strip_prefix('@') {
            let rest = rest.trim_start();
            let (doc_query, rest) = if rest.starts_with('{') {
                let (query, consumed) = leading_json(rest)?;
                (Some(DocumentQuery::from_value(query)?), rest[consumed..].trim_start())
            } else {
                (None, rest)
            };
            (Anchor::Absolute { doc_query }, rest)
        } else if source.starts_with('$') {
            (Anchor::Relative, source)
        } else {
            return Err(MureError::InvalidSelector(format!(
                "{source:?} must start with '@' or '$'"
            )));
        };

        let tokens = if path.is_empty() {
            Vec::new()
        } else {
            let Some(segments) = path.strip_prefix('$') else {
                return Err(MureError::InvalidSelector(format!(
                    "expected '$' in {source:?}, found {path:?}"
                )));
            };
            PathParser::new(segments).tokens()?
        };

        Ok(Self {
            source: source.to_string(),
            anchor,
            tokens,
        })
    }

    /// Whether `text` parses as a selector.
    #[must_use]
    pub fn is_selector(text: &str) -> bool {
        Self::parse(text).is_ok()
    }

    /// The text this selector was parsed from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Starting point.
    #[must_use]
    pub fn anchor(&self) -> &Anchor {
        &self.anchor
    }

    /// Path steps.
    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Whether this selector is relative (`$...`).
    #[must_use]
    pub fn is_relative(&self) -> bool {
        matches!(self.anchor, Anchor::Relative)
    }

    /// If this selector names exactly one location (an `_id` doc query plus
    /// literal keys), that location.
    #[must_use]
    pub fn as_unique_path(&self) -> Option<(DocId, ItemPath)> {
        let Anchor::Absolute {
            doc_query: Some(query),
        } = &self.anchor
        else {
            return None;
        };
        let doc = DocId::new(query.id_equality()?).ok()?;
        let keys = self
            .tokens
            .iter()
            .map(|token| match (&token.segment, token.recursive) {
                (Segment::Key(key), false) => Some(key.clone()),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()?;
        Some((doc, ItemPath::from_keys(keys)))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Parse one JSON value at the start of `text`; returns it and the bytes consumed.
fn leading_json(text: &str) -> Result<(Value, usize), MureError> {
    let mut stream = serde_json::Deserializer::from_str(text).into_iter::<Value>();
    match stream.next() {
        Some(Ok(value)) => Ok((value, stream.byte_offset())),
        Some(Err(e)) => Err(MureError::InvalidSelector(format!("document query: {e}"))),
        None => Err(MureError::InvalidSelector("empty document query".to_string())),
    }
}

// =============================================================================
// PATH PARSER
// =============================================================================

struct PathParser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> PathParser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn error(&self, message: &str) -> MureError {
        MureError::InvalidSelector(format!("{message} at offset {} of {:?}", self.pos, self.src))
    }

    fn tokens(mut self) -> Result<Vec<Token>, MureError> {
        let mut tokens = Vec::new();
        while let Some(c) = self.peek() {
            let token = match c {
                '.' => {
                    self.bump();
                    let recursive = self.peek() == Some('.');
                    if recursive {
                        self.bump();
                    }
                    match self.peek() {
                        Some('*') => {
                            self.bump();
                            Token {
                                segment: Segment::Wildcard,
                                recursive,
                            }
                        }
                        Some('[') if recursive => Token {
                            segment: self.bracket()?,
                            recursive,
                        },
                        _ => Token {
                            segment: Segment::Key(self.name()?),
                            recursive,
                        },
                    }
                }
                '[' => Token {
                    segment: self.bracket()?,
                    recursive: false,
                },
                _ => return Err(self.error("expected '.' or '['")),
            };
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn name(&mut self) -> Result<String, MureError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '.' || c == '[' {
                break;
            }
            self.bump();
        }
        let name = self.src[start..self.pos].trim();
        if name.is_empty() {
            return Err(self.error("empty name"));
        }
        Ok(name.to_string())
    }

    /// Parse `[ ... ]`, the cursor sitting on `[`.
    fn bracket(&mut self) -> Result<Segment, MureError> {
        self.bump();
        let start = self.pos;
        let mut quote = None;
        let mut escaped = false;
        loop {
            let Some(c) = self.bump() else {
                return Err(self.error("unterminated '['"));
            };
            match (quote, c) {
                (Some(_), _) if escaped => escaped = false,
                (Some(_), '\\') => escaped = true,
                (Some(q), c) if c == q => quote = None,
                (None, '"' | '\'') => quote = Some(c),
                (None, ']') => break,
                _ => {}
            }
        }
        let inner = &self.src[start..self.pos - 1];
        parse_bracket(inner).map_err(|message| self.error(&message))
    }
}

fn parse_bracket(inner: &str) -> Result<Segment, String> {
    let parts = split_top_level(inner);
    if let [single] = parts.as_slice() {
        let part = single.trim();
        if part == "*" {
            return Ok(Segment::Wildcard);
        }
        if !is_quoted(part) && part.contains(':') {
            return parse_slice(part);
        }
        if let Ok(index) = part.parse::<i64>() {
            return Ok(if index < 0 {
                Segment::Range {
                    start: Some(index),
                    end: (index != -1).then_some(index + 1),
                }
            } else {
                Segment::Key(index.to_string())
            });
        }
        if is_digit_run(part) {
            return Ok(Segment::Key(part.to_string()));
        }
        return parse_key(part).map(Segment::Key);
    }
    parts
        .iter()
        .map(|part| {
            let part = part.trim();
            match part.parse::<i64>() {
                Ok(index) if index >= 0 => Ok(index.to_string()),
                Ok(_) => Err("negative indices are not allowed in a union".to_string()),
                Err(_) if is_digit_run(part) => Ok(part.to_string()),
                Err(_) => parse_key(part),
            }
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Segment::Union)
}

fn parse_slice(part: &str) -> Result<Segment, String> {
    let mut bounds = part.splitn(3, ':');
    let mut bound = || -> Result<Option<i64>, String> {
        match bounds.next().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => text
                .parse::<i64>()
                .map(Some)
                .map_err(|_| format!("bad slice bound {text:?}")),
        }
    };
    let start = bound()?;
    let end = bound()?;
    if bounds.next().is_some() {
        return Err("slice steps are not supported".to_string());
    }
    Ok(Segment::Range { start, end })
}

/// An unsigned integer too long for `i64`; kept verbatim as a key.
fn is_digit_run(part: &str) -> bool {
    !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit())
}

fn is_quoted(part: &str) -> bool {
    part.len() >= 2
        && ((part.starts_with('"') && part.ends_with('"'))
            || (part.starts_with('\'') && part.ends_with('\'')))
}

fn parse_key(part: &str) -> Result<String, String> {
    if !is_quoted(part) {
        return Err(format!("expected a quoted key or an integer, found {part:?}"));
    }
    if part.starts_with('"') {
        return serde_json::from_str::<String>(part).map_err(|e| e.to_string());
    }
    let body = &part[1..part.len() - 1];
    let mut key = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                key.push(next);
            }
        } else {
            key.push(c);
        }
    }
    Ok(key)
}

/// Split on commas that are not inside quotes.
fn split_top_level(inner: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quote = None;
    let mut escaped = false;
    for (i, c) in inner.char_indices() {
        match (quote, c) {
            (Some(_), _) if escaped => escaped = false,
            (Some(_), '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (None, '"' | '\'') => quote = Some(c),
            (None, ',') => {
                parts.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&inner[start..]);
    parts
}

// =============================================================================
// TESTS
// =============================================================================
