//! Typed client API over an engine instance

pub mod bootstrap;
pub mod engine;
pub mod handle;
pub mod protocol;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod taxonomy;

pub use bootstrap::Bootstrap;
pub use engine::{Engine, RawHandle, CLOSED_HANDLE};
pub use handle::BackendHandle;
pub use taxonomy::{BackendError, ErrorCategory, ErrorCode};

use crate::error::{BridgeError, BridgeResult};
use crate::transaction::TransactionGuard;
use protocol::{
    ColumnNamesRequest, DbRequest, DbResponse, Empty, FlushRequest, Int64, Method,
    OpenCollectionRequest, PageRequest, PageSizeRequest, Progress, SqlValue, StringList,
    StringValue, TranslateRequest,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Cheaply cloneable handle to an open backend.
///
/// Clones share the same engine instance, mutex and poison state.
#[derive(Clone, Debug)]
pub struct Backend {
    handle: Arc<BackendHandle>,
    recent_pages: usize,
}

impl Backend {
    pub fn from_handle(handle: Arc<BackendHandle>) -> Self {
        Self {
            handle,
            recent_pages: 0,
        }
    }

    /// Number of recently read pages each new cursor keeps
    pub fn with_recent_pages(mut self, recent_pages: usize) -> Self {
        self.recent_pages = recent_pages;
        self
    }

    pub fn recent_pages(&self) -> usize {
        self.recent_pages
    }

    pub fn handle(&self) -> &Arc<BackendHandle> {
        &self.handle
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_open()
    }

    /// Release the engine instance for every clone of this backend
    pub fn close(&self) {
        self.handle.close();
    }

    // ==================== Collection ====================

    pub fn open_collection(&self, path: &str) -> BridgeResult<()> {
        let _: Empty = self.handle.run(
            Method::OpenCollection,
            &OpenCollectionRequest {
                collection_path: path.to_string(),
            },
        )?;
        debug!("Opened collection {}", path);
        Ok(())
    }

    /// Close the collection, discarding every outstanding query first
    pub fn close_collection(&self) -> BridgeResult<()> {
        self.cancel_all_queries()?;
        let _: Empty = self.handle.run(Method::CloseCollection, &Empty {})?;
        debug!("Closed collection");
        Ok(())
    }

    // ==================== Queries ====================

    /// Run a query and return every row as JSON values
    pub fn full_query(
        &self,
        sql: &str,
        args: &[SqlValue],
    ) -> BridgeResult<Vec<Vec<serde_json::Value>>> {
        self.json_query(DbRequest::query(sql, args))
    }

    /// Like `full_query`, but the engine stops after the first row
    pub fn first_row(
        &self,
        sql: &str,
        args: &[SqlValue],
    ) -> BridgeResult<Option<Vec<serde_json::Value>>> {
        let rows = self.json_query(DbRequest::query(sql, args).first_row_only())?;
        Ok(rows.into_iter().next())
    }

    fn json_query(&self, request: DbRequest) -> BridgeResult<Vec<Vec<serde_json::Value>>> {
        let bytes = self.handle.call_method(Method::RunDbCommand, &request)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| BridgeError::Codec(format!("Invalid JSON result: {}", e)))
    }

    pub fn execute_get_rows_affected(&self, sql: &str, args: &[SqlValue]) -> BridgeResult<i64> {
        let Int64 { val } = self
            .handle
            .run(Method::RunDbCommandForRowCount, &DbRequest::query(sql, args))?;
        Ok(val)
    }

    /// Execute an insert and return the new row id
    pub fn insert_for_id(&self, sql: &str, args: &[SqlValue]) -> BridgeResult<i64> {
        let Int64 { val } = self
            .handle
            .run(Method::InsertForId, &DbRequest::query(sql, args))?;
        Ok(val)
    }

    pub fn column_names(&self, sql: &str) -> BridgeResult<Vec<String>> {
        let StringList { vals } = self.handle.run(
            Method::GetColumnNamesFromQuery,
            &ColumnNamesRequest {
                sql: sql.to_string(),
            },
        )?;
        Ok(vals)
    }

    // ==================== Paging ====================

    /// Start a paged query. Its sequence number becomes the active one,
    /// superseding any earlier paged query on this backend.
    pub fn query_first_page(&self, sql: &str, args: &[SqlValue]) -> BridgeResult<DbResponse> {
        let page: DbResponse = self
            .handle
            .run(Method::RunDbCommandProto, &DbRequest::query(sql, args))?;
        self.handle.set_active_query(page.sequence_number);
        trace!(
            "Query {} returned {} rows, first page holds {}",
            page.sequence_number,
            page.row_count,
            page.rows.len()
        );
        Ok(page)
    }

    pub fn next_page(&self, sequence_number: i32, start_index: i64) -> BridgeResult<DbResponse> {
        trace!(
            "Fetching page of query {} at {}",
            sequence_number,
            start_index
        );
        self.handle.run(
            Method::GetNextResultPage,
            &PageRequest {
                sequence_number,
                start_index,
            },
        )
    }

    /// Discard the engine-side result of a query.
    ///
    /// Only acts while `sequence_number` is still the active query; a query
    /// that has already been superseded is left alone. Does not wait for
    /// calls holding the backend mutex.
    pub fn cancel_query(&self, sequence_number: i32) -> BridgeResult<()> {
        self.handle.with_active_query(|active| {
            if *active != Some(sequence_number) {
                trace!(
                    "Skipping flush of query {}, active query is {:?}",
                    sequence_number,
                    active
                );
                return Ok(());
            }
            *active = None;
            trace!("Flushing query {}", sequence_number);
            let _: Empty = self
                .handle
                .run(Method::FlushQuery, &FlushRequest { sequence_number })?;
            Ok(())
        })
    }

    /// Discard every outstanding query result
    pub fn cancel_all_queries(&self) -> BridgeResult<()> {
        self.handle.with_active_query(|active| {
            *active = None;
            let _: Empty = self.handle.run(Method::FlushAllQueries, &Empty {})?;
            Ok(())
        })
    }

    /// Set the engine's result page budget in bytes
    pub fn set_page_size(&self, page_size_bytes: u64) -> BridgeResult<()> {
        let _: Empty = self
            .handle
            .run(Method::SetPageSize, &PageSizeRequest { page_size_bytes })?;
        Ok(())
    }

    // ==================== Transactions ====================

    /// Open an engine transaction, holding the backend mutex until the guard
    /// is finished
    pub fn begin_transaction(&self) -> BridgeResult<TransactionGuard> {
        self.handle.begin_transaction()
    }

    // ==================== Misc ====================

    pub fn translate_string(
        &self,
        module_index: u32,
        message_index: u32,
        args: BTreeMap<String, String>,
    ) -> BridgeResult<String> {
        let StringValue { val } = self.handle.run(
            Method::TranslateString,
            &TranslateRequest {
                module_index,
                message_index,
                args,
            },
        )?;
        Ok(val)
    }

    pub fn latest_progress(&self) -> BridgeResult<Progress> {
        self.handle.run(Method::LatestProgress, &Empty {})
    }

    /// Ask a long-running engine operation to stop
    pub fn set_wants_abort(&self) -> BridgeResult<()> {
        let _: Empty = self.handle.run(Method::SetWantsAbort, &Empty {})?;
        Ok(())
    }
}
