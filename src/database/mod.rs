//! SQLite-style database facade over a backend
//!
//! Adds nested transactions, row helpers and compiled statements on top of
//! the raw query methods. Database failures are annotated with the
//! statement that caused them.

pub mod sql_error;
pub mod statement;

pub use sql_error::SqlFailure;
pub use statement::Statement;

use crate::backend::protocol::SqlValue;
use crate::backend::Backend;
use crate::cursor::PagedCursor;
use crate::error::{BridgeError, BridgeResult};
use crate::transaction::Session;
use sql_error::annotate;
use tracing::warn;

/// Conflict resolution for inserts and updates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConflictAlgorithm {
    #[default]
    None,
    Rollback,
    Abort,
    Fail,
    Ignore,
    Replace,
}

impl ConflictAlgorithm {
    fn clause(self) -> &'static str {
        match self {
            ConflictAlgorithm::None => "",
            ConflictAlgorithm::Rollback => " OR ROLLBACK ",
            ConflictAlgorithm::Abort => " OR ABORT ",
            ConflictAlgorithm::Fail => " OR FAIL ",
            ConflictAlgorithm::Ignore => " OR IGNORE ",
            ConflictAlgorithm::Replace => " OR REPLACE ",
        }
    }
}

pub struct Database {
    session: Session,
}

impl Database {
    pub fn new(backend: Backend) -> Self {
        Self {
            session: Session::new(backend),
        }
    }

    pub fn backend(&self) -> &Backend {
        self.session.backend()
    }

    // ==================== Queries ====================

    /// Open a paged cursor over the query result
    pub fn query(&self, sql: &str, args: &[SqlValue]) -> BridgeResult<PagedCursor> {
        PagedCursor::open(self.backend().clone(), sql, args).map_err(|e| annotate(sql, e))
    }

    /// Run a statement, discarding any rows
    pub fn exec_sql(&self, sql: &str, args: &[SqlValue]) -> BridgeResult<()> {
        self.backend()
            .full_query(sql, args)
            .map(|_| ())
            .map_err(|e| annotate(sql, e))
    }

    /// Run a statement and return the number of changed rows
    pub fn execute(&self, sql: &str, args: &[SqlValue]) -> BridgeResult<i64> {
        self.backend()
            .execute_get_rows_affected(sql, args)
            .map_err(|e| annotate(sql, e))
    }

    pub fn insert_for_id(&self, sql: &str, args: &[SqlValue]) -> BridgeResult<i64> {
        self.backend()
            .insert_for_id(sql, args)
            .map_err(|e| annotate(sql, e))
    }

    /// All rows as JSON values
    pub fn full_query(
        &self,
        sql: &str,
        args: &[SqlValue],
    ) -> BridgeResult<Vec<Vec<serde_json::Value>>> {
        self.backend()
            .full_query(sql, args)
            .map_err(|e| annotate(sql, e))
    }

    pub fn compile_statement(&self, sql: &str) -> Statement<'_> {
        Statement::new(self, sql)
    }

    pub fn set_page_size(&self, page_size_bytes: u64) -> BridgeResult<()> {
        self.backend().set_page_size(page_size_bytes)
    }

    // ==================== Row Helpers ====================

    /// Insert a row and return its id
    pub fn insert(
        &self,
        table: &str,
        conflict: ConflictAlgorithm,
        values: &[(&str, SqlValue)],
    ) -> BridgeResult<i64> {
        if values.is_empty() {
            return Err(BridgeError::InvalidArgument(
                "insert requires at least one column".to_string(),
            ));
        }
        let columns: Vec<&str> = values.iter().map(|(c, _)| *c).collect();
        let placeholders = vec!["?"; values.len()].join(",");
        let sql = format!(
            "INSERT{} INTO {}({}) VALUES ({})",
            conflict.clause(),
            table,
            columns.join(","),
            placeholders
        );
        let args: Vec<SqlValue> = values.iter().map(|(_, v)| v.clone()).collect();
        self.insert_for_id(&sql, &args)
    }

    /// Update matching rows and return how many changed
    pub fn update(
        &self,
        table: &str,
        conflict: ConflictAlgorithm,
        values: &[(&str, SqlValue)],
        where_clause: Option<&str>,
        where_args: &[SqlValue],
    ) -> BridgeResult<i64> {
        if values.is_empty() {
            return Err(BridgeError::InvalidArgument(
                "update requires at least one column".to_string(),
            ));
        }
        let assignments: Vec<String> = values.iter().map(|(c, _)| format!("{}=?", c)).collect();
        let mut sql = format!(
            "UPDATE{} {} SET {}",
            conflict.clause(),
            table,
            assignments.join(",")
        );
        if let Some(clause) = where_clause.filter(|c| !c.is_empty()) {
            sql.push_str(" WHERE ");
            sql.push_str(clause);
        }
        let args: Vec<SqlValue> = values
            .iter()
            .map(|(_, v)| v.clone())
            .chain(where_args.iter().cloned())
            .collect();
        self.execute(&sql, &args)
    }

    /// Delete matching rows and return how many were removed
    pub fn delete(
        &self,
        table: &str,
        where_clause: Option<&str>,
        where_args: &[SqlValue],
    ) -> BridgeResult<i64> {
        let mut sql = format!("DELETE FROM {}", table);
        if let Some(clause) = where_clause.filter(|c| !c.is_empty()) {
            sql.push_str(" WHERE ");
            sql.push_str(clause);
        }
        self.execute(&sql, where_args)
    }

    /// Run SQLite's integrity check
    pub fn is_integrity_ok(&self) -> BridgeResult<bool> {
        let rows = self.full_query("pragma integrity_check", &[])?;
        let ok = rows.len() == 1 && rows[0].first().and_then(|v| v.as_str()) == Some("ok");
        if !ok {
            warn!("Integrity check reported {} problem row(s)", rows.len());
        }
        Ok(ok)
    }

    // ==================== Transactions ====================

    pub fn begin_transaction(&mut self) -> BridgeResult<()> {
        self.session.begin()
    }

    pub fn set_transaction_successful(&mut self) -> BridgeResult<()> {
        self.session.mark_successful()
    }

    pub fn end_transaction(&mut self) -> BridgeResult<()> {
        self.session.end()
    }

    pub fn in_transaction(&self) -> bool {
        self.session.in_transaction()
    }

    pub fn transaction_depth(&self) -> usize {
        self.session.depth()
    }

    /// Run `f` inside a (possibly nested) transaction, marking it successful
    /// only when `f` succeeds
    pub fn with_transaction<T>(
        &mut self,
        f: impl FnOnce(&mut Database) -> BridgeResult<T>,
    ) -> BridgeResult<T> {
        self.begin_transaction()?;
        let result = f(self);
        if result.is_ok() {
            self.set_transaction_successful()?;
        }
        let ended = self.end_transaction();
        let value = result?;
        ended?;
        Ok(value)
    }
}
