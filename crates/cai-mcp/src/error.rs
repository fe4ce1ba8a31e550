//! Error types for tool-provider sessions.

use thiserror::Error;

/// Errors from one tool-provider session. None of them outlive the session.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Failed to spawn tool provider '{name}': {source}")]
    SpawnFailed {
        name: String,
        source: std::io::Error,
    },

    #[error("Tool provider '{server}' closed its pipes")]
    ChannelClosed { server: String },

    #[error("Handshake with tool provider '{server}' failed: {source}")]
    HandshakeFailed {
        server: String,
        #[source]
        source: Box<McpError>,
    },

    #[error("Tool provider '{server}' answered id {actual:?}, expected {expected}")]
    ProtocolMismatch {
        server: String,
        expected: u64,
        actual: Option<u64>,
    },

    #[error("JSON-RPC error from '{server}' (code {code}): {message}")]
    JsonRpc {
        server: String,
        code: i64,
        message: String,
    },

    #[error("Tool provider protocol error: {0}")]
    Protocol(String),

    #[error("Tool provider '{name}' timed out after {timeout_ms}ms")]
    Timeout { name: String, timeout_ms: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
