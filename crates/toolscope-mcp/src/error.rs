//! Error types for MCP operations.

use std::fmt;
use thiserror::Error;

/// Coarse error classification surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ExecutableNotFound,
    HandshakeFailed,
    ToolListFailed,
    ToolCallFailed,
    TransportError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::ExecutableNotFound => "executable not found",
            ErrorKind::HandshakeFailed => "handshake failed",
            ErrorKind::ToolListFailed => "tool listing failed",
            ErrorKind::ToolCallFailed => "tool call failed",
            ErrorKind::TransportError => "transport error",
        };
        f.write_str(s)
    }
}

/// Errors from MCP server communication.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Command '{command}' not found. Make sure it's installed and in your PATH.{}", hint_suffix(.hint))]
    ExecutableNotFound {
        command: String,
        hint: Option<String>,
    },

    #[error("Failed to spawn MCP server '{name}': {source}")]
    SpawnFailed {
        name: String,
        source: std::io::Error,
    },

    #[error("Handshake with MCP server '{server}' failed: {reason}")]
    HandshakeFailed { server: String, reason: String },

    #[error("Failed to list tools of MCP server '{server}': {reason}")]
    ToolListFailed { server: String, reason: String },

    #[error("Tool '{tool}' on MCP server '{server}' failed: {reason}")]
    ToolCallFailed {
        server: String,
        tool: String,
        reason: String,
    },

    #[error("JSON-RPC error from '{server}' (code {code}): {message}")]
    JsonRpc {
        server: String,
        code: i64,
        message: String,
    },

    #[error("MCP protocol error: {0}")]
    Protocol(String),

    #[error("MCP server '{name}' closed its transport")]
    TransportClosed { name: String },

    #[error("MCP server '{name}' timed out after {timeout_ms}ms")]
    Timeout { name: String, timeout_ms: u64 },

    #[error("Session with MCP server '{server}' has already served its operation")]
    SessionSpent { server: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn hint_suffix(hint: &Option<String>) -> String {
    match hint {
        Some(h) => format!(" {h}"),
        None => String::new(),
    }
}

impl McpError {
    /// Classify this error into one of the caller-facing kinds.
    pub fn kind(&self) -> ErrorKind {
        match self {
            McpError::ExecutableNotFound { .. } => ErrorKind::ExecutableNotFound,
            McpError::HandshakeFailed { .. } => ErrorKind::HandshakeFailed,
            McpError::ToolListFailed { .. } => ErrorKind::ToolListFailed,
            McpError::ToolCallFailed { .. } => ErrorKind::ToolCallFailed,
            _ => ErrorKind::TransportError,
        }
    }
}
