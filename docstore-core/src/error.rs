// docstore-core/src/error.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocStoreError {
    #[error("Duplicate key: a document with _id '{0}' already exists")]
    DuplicateKey(String),

    #[error("Document is missing the _id field")]
    MissingId,

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Document '{0}' not found")]
    NotFound(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid update: {0}")]
    InvalidUpdate(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Cursor has no current document")]
    NoCurrentDocument,

    #[error("Cursor is closed")]
    CursorClosed,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, DocStoreError>;
