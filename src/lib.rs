pub mod backend;
pub mod config;
pub mod cursor;
pub mod database;
pub mod error;
pub mod transaction;

pub use backend::protocol::{DbResponse, SqlValue};
pub use backend::{Backend, BackendError, Bootstrap, Engine, ErrorCategory};
pub use config::BridgeConfig;
pub use cursor::{ColumnType, PagedCursor};
pub use database::{ConflictAlgorithm, Database, SqlFailure, Statement};
pub use error::{BridgeError, BridgeResult};
pub use transaction::{Session, TransactionGuard};

#[cfg(feature = "sqlite")]
pub use backend::sqlite::SqliteEngine;
