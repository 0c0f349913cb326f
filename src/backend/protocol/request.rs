use super::value::SqlValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sent once when an engine instance is created
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendInit {
    pub preferred_langs: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DbRequestKind {
    Query,
    Begin,
    Commit,
    Rollback,
}

/// Query or transaction-control request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbRequest {
    pub kind: DbRequestKind,
    #[serde(default)]
    pub sql: String,
    #[serde(default)]
    pub args: Vec<SqlValue>,
    #[serde(default)]
    pub first_row_only: bool,
}

impl DbRequest {
    pub fn query(sql: &str, args: &[SqlValue]) -> Self {
        Self {
            kind: DbRequestKind::Query,
            sql: sql.to_string(),
            args: args.to_vec(),
            first_row_only: false,
        }
    }

    pub fn begin() -> Self {
        Self::control(DbRequestKind::Begin)
    }

    pub fn commit() -> Self {
        Self::control(DbRequestKind::Commit)
    }

    pub fn rollback() -> Self {
        Self::control(DbRequestKind::Rollback)
    }

    /// Only the first row of the result is wanted
    pub fn first_row_only(mut self) -> Self {
        self.first_row_only = true;
        self
    }

    fn control(kind: DbRequestKind) -> Self {
        Self {
            kind,
            sql: String::new(),
            args: Vec::new(),
            first_row_only: false,
        }
    }
}

/// Fetch the page of an outstanding query starting at `start_index`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub sequence_number: i32,
    pub start_index: i64,
}

/// Discard the server-side result of one query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushRequest {
    pub sequence_number: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSizeRequest {
    pub page_size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnNamesRequest {
    pub sql: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenCollectionRequest {
    pub collection_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslateRequest {
    pub module_index: u32,
    pub message_index: u32,
    #[serde(default)]
    pub args: BTreeMap<String, String>,
}

/// Request body for methods that take no input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}
