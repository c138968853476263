//! # Stored Record Format
//!
//! Binary layout of one document row in the redb table.
//!
//! Format: Header (5 bytes) + postcard-serialized `StoredRecord`.
//! - 4 bytes: Magic ("MURE")
//! - 1 byte: Version
//!
//! The document body is kept as JSON text inside the record: postcard is not
//! self-describing, so it cannot carry an arbitrary `serde_json::Value`.
//!
//! Size is checked before any payload is parsed.

use crate::primitives::{FORMAT_VERSION, MAGIC_BYTES};
use crate::types::MureError;
use serde::{Deserialize, Serialize};

/// Maximum accepted record size.
pub const MAX_RECORD_SIZE: usize = 64 * 1024 * 1024; // 64 MB

const HEADER_LEN: usize = 5;

/// One stored row: revision, tombstone flag and JSON body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub rev: String,
    pub deleted: bool,
    pub body: String,
}

/// Serialize a record (header + payload).
pub fn encode_record(record: &StoredRecord) -> Result<Vec<u8>, MureError> {
    let payload =
        postcard::to_stdvec(record).map_err(|e| MureError::SerializationError(e.to_string()))?;
    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(MAGIC_BYTES);
    bytes.push(FORMAT_VERSION);
    bytes.extend_from_slice(&payload);
    if bytes.len() > MAX_RECORD_SIZE {
        return Err(MureError::SerializationError(format!(
            "record of {} bytes exceeds maximum {MAX_RECORD_SIZE}",
            bytes.len()
        )));
    }
    Ok(bytes)
}

/// Deserialize a record, validating size and header first.
pub fn decode_record(bytes: &[u8]) -> Result<StoredRecord, MureError> {
    if bytes.len() < HEADER_LEN {
        return Err(MureError::SerializationError(
            "record too short: minimum 5 bytes required".to_string(),
        ));
    }
    if bytes.len() > MAX_RECORD_SIZE {
        return Err(MureError::SerializationError(format!(
            "record of {} bytes exceeds maximum {MAX_RECORD_SIZE}",
            bytes.len()
        )));
    }
    let (header, payload) = bytes.split_at(HEADER_LEN);
    if &header[..4] != MAGIC_BYTES {
        return Err(MureError::SerializationError(
            "Invalid magic bytes".to_string(),
        ));
    }
    if header[4] != FORMAT_VERSION {
        return Err(MureError::SerializationError(format!(
            "Unsupported version: {} (expected {FORMAT_VERSION})",
            header[4]
        )));
    }
    postcard::from_bytes(payload).map_err(|e| {
        MureError::SerializationError(format!("Failed to deserialize record: {e}"))
    })
}
