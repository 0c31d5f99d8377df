//! Storage layer error types.

use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Tuple is not compatible with the table schema")]
    SchemaMismatch,

    #[error("Duplicate field name: {0}")]
    DuplicateField(String),

    #[error("Field not found: {0}")]
    UnknownField(String),

    #[error("Slot {slot} out of range (capacity {capacity})")]
    SlotOutOfRange { slot: usize, capacity: usize },

    #[error("Slot {slot} is empty")]
    SlotEmpty { slot: usize },

    #[error("Page {page} out of range (file has {num_pages} pages)")]
    PageOutOfRange { page: usize, num_pages: usize },

    #[error("Split on an empty leaf page")]
    EmptyLeafSplit,

    #[error("File is not registered: {0}")]
    UnknownFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
