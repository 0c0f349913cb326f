use crate::backend::taxonomy::{BackendError, ErrorCategory};
use crate::database::SqlFailure;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    /// Error reported by the engine, already classified
    #[error("{0}")]
    Backend(#[from] BackendError),

    #[error("Backend has been closed")]
    Closed,

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Sequence mismatch: cursor reads query {expected}, page belongs to query {actual}")]
    SequenceMismatch { expected: i32, actual: i32 },

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Index {index} requested, with a size of {size}")]
    CursorIndexOutOfBounds { index: i64, size: usize },

    #[error("Column index {index} out of range, row has {count} columns")]
    ColumnIndexOutOfBounds { index: usize, count: usize },

    #[error("Column '{0}' does not exist")]
    ColumnNotFound(String),

    #[error("{0}")]
    Coercion(&'static str),

    #[error("Cursor is closed")]
    CursorClosed,

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Query returned no rows")]
    NoRows,

    /// Database failure annotated with the statement that caused it
    #[error("{source} (query: {query})")]
    Sql {
        query: String,
        failure: SqlFailure,
        #[source]
        source: BackendError,
    },

    #[error("Bootstrap failed: {0}")]
    Bootstrap(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BridgeError {
    /// Category of the underlying engine error, if this is one
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            BridgeError::Backend(e) => Some(e.category),
            BridgeError::Sql { source, .. } => Some(source.category),
            _ => None,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.category().is_some_and(ErrorCategory::is_fatal)
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
