use std::io;
use thiserror::Error;

/// Failures reported by a repository's raw primitives.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No persisted record matches the requested key.
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Storage IO failed: {0}")]
    Io(#[from] io::Error),

    #[error("Record could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A key or stored payload the repository cannot handle.
    #[error("Invalid record data: {0}")]
    InvalidData(String),
}
