//! Opaque page cursors.

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::Position;

/// Errors raised when decoding a cursor token.
#[derive(Debug, thiserror::Error)]
pub enum CursorError {
    #[error("cursor is not valid base64")]
    Encoding,
    #[error("cursor payload is malformed")]
    Payload,
}

/// Marker for resuming a list after its last shown record.
///
/// Bound to the list it was issued for: `key` fingerprints the collection, ordering and
/// filter, and a cursor whose key differs from the active list is stale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageCursor {
    #[serde(rename = "k")]
    key: String,
    #[serde(rename = "v")]
    value: Value,
    #[serde(rename = "i")]
    id: String,
}

impl PageCursor {
    pub fn new(key: impl Into<String>, position: Position) -> Self {
        Self {
            key: key.into(),
            value: position.value,
            id: position.id,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn position(&self) -> Position {
        Position {
            value: self.value.clone(),
            id: self.id.clone(),
        }
    }

    /// Encode as a URL-safe token.
    pub fn encode(&self) -> String {
        // Serializing a struct of strings and a JSON value cannot fail
        let json = serde_json::to_vec(self).unwrap_or_default();
        general_purpose::URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(token: &str) -> Result<Self, CursorError> {
        let json = general_purpose::URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| CursorError::Encoding)?;
        serde_json::from_slice(&json).map_err(|_| CursorError::Payload)
    }
}
