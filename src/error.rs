//! Error types for the reminder engine
//!
//! Errors are classified by how callers should react:
//! - Per-item: malformed data or missing records — skip the record, continue the batch
//! - Retryable: transient backend failures on delete/create
//! - Terminal: invalid state transitions, duplicate in-flight operations, storage faults

use thiserror::Error;

/// Error taxonomy for the reminder lifecycle engine
#[derive(Debug, Error)]
pub enum EngineError {
    // Per-item errors — never fatal to a batch
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    // Transient backend failures
    #[error("Network error during {op} for {id}: {message}")]
    Network {
        op: &'static str,
        id: String,
        message: String,
    },

    // Duplicate in-flight operation on the same id — rejected before any
    // external call is issued
    #[error("Operation already in flight for {0}")]
    Concurrency(String),

    // Lifecycle violations (e.g. undo on a record that is not committed)
    #[error("Invalid state for {id}: expected {expected}")]
    InvalidState { id: String, expected: &'static str },

    #[error("Storage error: {0}")]
    Storage(String),
}

impl EngineError {
    /// Returns true if the caller may retry the same operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Network { .. })
    }

    /// Returns true if this error affects a single record and must not
    /// abort processing of the remaining collection.
    pub fn is_per_item(&self) -> bool {
        matches!(
            self,
            EngineError::Validation(_) | EngineError::NotFound { .. }
        )
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        EngineError::Storage(err.to_string())
    }
}
