/*
    errors.rs - Error types for the store subsystem

    Defines all error types that can occur in:
    - Log appends and replay
    - Record (de)serialization
    - Source chain writes
*/

use thiserror::Error;

/// Errors that can occur in the store subsystem
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage I/O error; the append that raised it left no record behind
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Corrupted data detected (bad checksum, broken hash link, truncated record)
    #[error("Corrupted data: {0}")]
    CorruptedData(String),

    /// A write was refused by validation
    #[error("Invalid write: {0}")]
    InvalidWrite(String),

    /// Entity not found
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Storage(err.to_string())
    }
}

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
