//! Error types for montage-tools

use thiserror::Error;

/// Tool error type
#[derive(Debug, Error)]
pub enum Error {
    /// Tool not found in the catalog
    #[error("tool not found: {0}")]
    NotFound(String),

    /// Tool execution failed
    #[error("execution failed: {0}")]
    Execution(String),

    /// Arguments rejected by the tool's schema
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Tool is disabled or otherwise not allowed to run
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Tool declared an argument schema that cannot be compiled
    #[error("invalid schema for '{tool}': {message}")]
    InvalidSchema {
        /// Tool name
        tool: String,
        /// Compiler message
        message: String,
    },

    /// Network error reported by a remote tool backend
    #[error("network error: {0}")]
    Network(String),

    /// JSON (de)serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
