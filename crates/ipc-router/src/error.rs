//! Error types
//!
//! `IpcError` is the wire error a handler returns. The router passes it
//! through untouched; it never wraps or classifies handler failures.
//! The remaining enums cover registration, transport and generation.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Error returned by a handler or middleware and sent back to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct IpcError {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl IpcError {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            status: None,
        }
    }

    /// Attach an HTTP-like status hint for the UI
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn invalid_payload(message: &str) -> Self {
        Self::new("INVALID_PAYLOAD", message)
    }

    pub fn not_authenticated() -> Self {
        Self::new("NOT_AUTHENTICATED", "A valid session is required for this call").with_status(401)
    }

    pub fn internal(message: &str) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

/// Result of a handler or of a whole compiled chain
pub type IpcResult = Result<serde_json::Value, IpcError>;

/// Registration failures (duplicates are not errors, see `Registration`)
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("invalid channel name '{channel}': {reason}")]
    InvalidChannel { channel: String, reason: String },

    #[error("channel '{channel}' conflicts with registered channel '{existing}'")]
    PrefixConflict { channel: String, existing: String },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Listener installation failures
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("a listener is already installed for channel '{0}'")]
    ListenerExists(String),

    #[error("reply channel closed")]
    Closed,

    #[error("transport i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Generator failures. Unknown schema shapes never fail generation.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("failed to create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
