//! Error types for Retain

use thiserror::Error;
use uuid::Uuid;

use crate::memory::scorer::ScorerError;

/// Main error type for Retain operations
#[derive(Error, Debug)]
pub enum RetainError {
    /// Malformed item or out-of-range importance, rejected before anything is stored
    #[error("Invalid memory item: {0}")]
    InvalidItem(String),

    /// Id or tier lookup miss
    #[error("Not found: {0}")]
    NotFound(String),

    /// Snapshot write or restore failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// An association pointing at a memory that no longer exists
    #[error("Stale association: {referenced_by} links to missing memory {id}")]
    StaleReference { id: Uuid, referenced_by: Uuid },

    /// Importance scorer failures
    #[error("Scorer error: {0}")]
    Scorer(#[from] ScorerError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RetainError {
    /// Shorthand for a missing memory id
    pub fn memory_not_found(id: Uuid) -> Self {
        RetainError::NotFound(format!("memory {id}"))
    }
}

impl From<serde_json::Error> for RetainError {
    fn from(e: serde_json::Error) -> Self {
        RetainError::Serialization(e.to_string())
    }
}

/// Result type alias for Retain operations
pub type Result<T> = std::result::Result<T, RetainError>;
