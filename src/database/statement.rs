use super::Database;
use crate::backend::protocol::SqlValue;
use crate::cursor::coerce;
use crate::error::{BridgeError, BridgeResult};
use std::collections::BTreeMap;

/// A reusable SQL statement with 1-based positional bindings.
///
/// Nothing is sent to the engine until the statement is executed; unbound
/// positions below the highest bound index are sent as NULL.
pub struct Statement<'db> {
    db: &'db Database,
    sql: String,
    bindings: BTreeMap<usize, SqlValue>,
}

impl<'db> Statement<'db> {
    pub(crate) fn new(db: &'db Database, sql: &str) -> Self {
        Self {
            db,
            sql: sql.to_string(),
            bindings: BTreeMap::new(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn bind(&mut self, index: usize, value: impl Into<SqlValue>) -> BridgeResult<&mut Self> {
        if index == 0 {
            return Err(BridgeError::InvalidArgument(
                "bind indices start at 1".to_string(),
            ));
        }
        self.bindings.insert(index, value.into());
        Ok(self)
    }

    pub fn bind_null(&mut self, index: usize) -> BridgeResult<&mut Self> {
        self.bind(index, SqlValue::Null)
    }

    pub fn bind_long(&mut self, index: usize, value: i64) -> BridgeResult<&mut Self> {
        self.bind(index, value)
    }

    pub fn bind_double(&mut self, index: usize, value: f64) -> BridgeResult<&mut Self> {
        self.bind(index, value)
    }

    pub fn bind_string(&mut self, index: usize, value: &str) -> BridgeResult<&mut Self> {
        self.bind(index, value)
    }

    pub fn bind_blob(&mut self, index: usize, value: &[u8]) -> BridgeResult<&mut Self> {
        self.bind(index, value)
    }

    pub fn clear_bindings(&mut self) {
        self.bindings.clear();
    }

    fn args(&self) -> Vec<SqlValue> {
        let len = self.bindings.keys().next_back().copied().unwrap_or(0);
        (1..=len)
            .map(|i| self.bindings.get(&i).cloned().unwrap_or(SqlValue::Null))
            .collect()
    }

    pub fn execute(&self) -> BridgeResult<()> {
        self.db.exec_sql(&self.sql, &self.args())
    }

    /// Returns the new row id
    pub fn execute_insert(&self) -> BridgeResult<i64> {
        self.db.insert_for_id(&self.sql, &self.args())
    }

    /// Returns the number of changed rows
    pub fn execute_update_delete(&self) -> BridgeResult<i64> {
        self.db.execute(&self.sql, &self.args())
    }

    /// First column of the first row as an integer
    pub fn simple_query_for_long(&self) -> BridgeResult<i64> {
        coerce::as_long(&self.first_value()?)
    }

    /// First column of the first row as text, `None` for NULL
    pub fn simple_query_for_string(&self) -> BridgeResult<Option<String>> {
        coerce::as_string(&self.first_value()?)
    }

    fn first_value(&self) -> BridgeResult<SqlValue> {
        let mut cursor = self.db.query(&self.sql, &self.args())?;
        if !cursor.move_to_first()? {
            return Err(BridgeError::NoRows);
        }
        let value = cursor.get_value(0)?.clone();
        cursor.close()?;
        Ok(value)
    }
}
