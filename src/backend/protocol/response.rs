use super::value::SqlValue;
use serde::{Deserialize, Serialize};

/// One result row: column values in select order
pub type Row = Vec<SqlValue>;

/// A page (slice) of a query result.
///
/// `row_count` is the size of the whole result and is meaningful on the first
/// page of a query; `start_index` is the 0-based offset of `rows[0]` within it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DbResponse {
    pub sequence_number: i32,
    pub start_index: i64,
    pub row_count: i64,
    pub rows: Vec<Row>,
}

impl DbResponse {
    /// Global index one past the last row held by this page
    pub fn end_index(&self) -> i64 {
        self.start_index + self.rows.len() as i64
    }

    pub fn contains(&self, position: i64) -> bool {
        position >= self.start_index && position < self.end_index()
    }
}

/// Error envelope produced by the engine for a failed call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub kind: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_page: Option<String>,
}

/// The raw pair handed back across the engine boundary.
///
/// Exactly one side is expected to be present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackedResult {
    pub ok: Option<Vec<u8>>,
    pub err: Option<Vec<u8>>,
}

impl PackedResult {
    pub fn success(bytes: Vec<u8>) -> Self {
        Self {
            ok: Some(bytes),
            err: None,
        }
    }

    pub fn failure(bytes: Vec<u8>) -> Self {
        Self {
            ok: None,
            err: Some(bytes),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Int64 {
    pub val: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringValue {
    pub val: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringList {
    pub vals: Vec<String>,
}

/// Progress of a long-running engine operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Progress {
    #[default]
    Idle,
    Working {
        stage: String,
        current: u64,
        total: u64,
    },
}
