use serde::{Deserialize, Serialize};

/// A single SQL value as carried on the wire, used both for bind arguments
/// and for the columns of returned rows.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlValue {
    /// SQL NULL (the "unset" case of a row field)
    #[default]
    Null,
    Long(i64),
    Double(f64),
    String(String),
    Blob(#[serde(with = "serde_bytes")] Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Storage class name, as SQLite reports it
    pub fn type_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Long(_) => "integer",
            SqlValue::Double(_) => "real",
            SqlValue::String(_) => "text",
            SqlValue::Blob(_) => "blob",
        }
    }

    /// Rough number of bytes this value occupies in a result page.
    ///
    /// Used by engines to fill pages up to a byte budget.
    pub fn approximate_size(&self) -> u64 {
        match self {
            SqlValue::Null => 1,
            SqlValue::Long(_) | SqlValue::Double(_) => 8,
            SqlValue::String(s) => s.len() as u64,
            SqlValue::Blob(b) => b.len() as u64,
        }
    }

    /// JSON rendering used by the row-as-JSON query path
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            SqlValue::Null => serde_json::Value::Null,
            SqlValue::Long(v) => serde_json::Value::from(*v),
            SqlValue::Double(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            SqlValue::String(s) => serde_json::Value::String(s.clone()),
            SqlValue::Blob(b) => serde_json::Value::from(b.clone()),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Long(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Long(v as i64)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Long(v as i64)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Double(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::String(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::String(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Blob(v)
    }
}

impl From<&[u8]> for SqlValue {
    fn from(v: &[u8]) -> Self {
        SqlValue::Blob(v.to_vec())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}
