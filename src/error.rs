//! Error types for snapkv
//!
//! Provides a unified error type for all adapter operations.

use thiserror::Error;

use crate::engine::EngineError;
use crate::kv::Key;

/// Result type alias using SnapError
pub type Result<T> = std::result::Result<T, SnapError>;

/// Unified error type for snapkv operations
#[derive(Debug, Error)]
pub enum SnapError {
    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    /// Point lookup found no row, or the row had no value in the fixed column
    #[error("Key not found: {key}")]
    NotFound { key: Key },

    // -------------------------------------------------------------------------
    // Caller Errors
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // -------------------------------------------------------------------------
    // Engine Errors
    // -------------------------------------------------------------------------
    /// Failure surfaced by the transactional engine, tagged with the
    /// operation and key it happened on
    #[error("{op} failed for key {key}: {source}")]
    Engine {
        op: &'static str,
        key: Key,
        #[source]
        source: EngineError,
    },

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SnapError {
    /// Wrap an engine failure with operation context
    pub(crate) fn engine(op: &'static str, key: impl Into<Key>, source: EngineError) -> Self {
        let key = key.into();
        tracing::warn!("{} failed for key {}: {}", op, key, source);
        SnapError::Engine { op, key, source }
    }

    /// True for the not-found lookup outcome
    pub fn is_not_found(&self) -> bool {
        matches!(self, SnapError::NotFound { .. })
    }
}

impl From<bincode::Error> for SnapError {
    fn from(e: bincode::Error) -> Self {
        SnapError::Serialization(e.to_string())
    }
}
