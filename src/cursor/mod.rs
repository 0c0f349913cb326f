//! Forward/backward cursor over a paged query result.
//!
//! The engine keeps the full result and hands it out in pages. A cursor holds
//! one page at a time (plus an optional handful of recently read pages) and
//! fetches another whenever the position leaves it.

pub mod coerce;
pub mod page_cache;

pub use coerce::ColumnType;
pub use page_cache::PageCache;

use crate::backend::protocol::{DbResponse, Row, SqlValue};
use crate::backend::Backend;
use crate::error::{BridgeError, BridgeResult};
use once_cell::unsync::OnceCell;
use tracing::{debug, trace, warn};

/// Position before the first row
pub const BEFORE_FIRST: i64 = -1;

pub struct PagedCursor {
    backend: Backend,
    sql: String,
    sequence_number: i32,
    row_count: i64,
    /// Global row index in `[-1, row_count]`
    position: i64,
    page: DbResponse,
    recent: Option<PageCache>,
    column_names: OnceCell<Vec<String>>,
    pages_fetched: usize,
    closed: bool,
}

impl PagedCursor {
    /// Issue the query and buffer its first page. The cursor starts before
    /// the first row.
    pub fn open(backend: Backend, sql: &str, args: &[SqlValue]) -> BridgeResult<Self> {
        let page = backend.query_first_page(sql, args)?;
        let recent = PageCache::new(backend.recent_pages());
        debug!(
            "Opened cursor for query {} ({} rows)",
            page.sequence_number, page.row_count
        );
        Ok(Self {
            backend,
            sql: sql.to_string(),
            sequence_number: page.sequence_number,
            row_count: page.row_count,
            position: BEFORE_FIRST,
            page,
            recent,
            column_names: OnceCell::new(),
            pages_fetched: 0,
            closed: false,
        })
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn count(&self) -> i64 {
        self.row_count
    }

    pub fn position(&self) -> i64 {
        self.position
    }

    pub fn sequence_number(&self) -> i32 {
        self.sequence_number
    }

    /// Pages fetched from the engine after the first one
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    // ==================== Navigation ====================

    /// Move to an absolute row.
    ///
    /// Targets outside the result are clamped to before-first or after-last
    /// and return `false` without contacting the engine. The clamped value is
    /// what gets recorded: `position()` then reads -1 or `count()`.
    pub fn move_to_position(&mut self, position: i64) -> BridgeResult<bool> {
        self.ensure_open()?;

        if position < 0 {
            self.position = BEFORE_FIRST;
            return Ok(false);
        }
        if position >= self.row_count {
            self.position = self.row_count;
            return Ok(false);
        }

        if !self.page.contains(position) && !self.holds_entire_result() {
            self.load_page(position)?;
        }
        self.position = position;
        Ok(true)
    }

    /// Move relative to the current position
    pub fn move_by(&mut self, offset: i64) -> BridgeResult<bool> {
        self.move_to_position(self.position.saturating_add(offset))
    }

    pub fn move_to_first(&mut self) -> BridgeResult<bool> {
        self.move_to_position(0)
    }

    pub fn move_to_last(&mut self) -> BridgeResult<bool> {
        self.move_to_position(self.row_count - 1)
    }

    pub fn move_to_next(&mut self) -> BridgeResult<bool> {
        self.move_by(1)
    }

    pub fn move_to_previous(&mut self) -> BridgeResult<bool> {
        self.move_by(-1)
    }

    pub fn is_before_first(&self) -> bool {
        self.row_count == 0 || self.position == BEFORE_FIRST
    }

    pub fn is_after_last(&self) -> bool {
        self.row_count == 0 || self.position == self.row_count
    }

    pub fn is_first(&self) -> bool {
        self.row_count != 0 && self.position == 0
    }

    pub fn is_last(&self) -> bool {
        self.row_count != 0 && self.position == self.row_count - 1
    }

    fn holds_entire_result(&self) -> bool {
        self.page.start_index == 0 && self.page.rows.len() as i64 == self.row_count
    }

    fn load_page(&mut self, position: i64) -> BridgeResult<()> {
        if let Some(page) = self.recent.as_mut().and_then(|c| c.take_containing(position)) {
            trace!("Row {} served from recent pages", position);
            self.swap_page(page);
            return Ok(());
        }

        let page = self.backend.next_page(self.sequence_number, position)?;
        self.pages_fetched += 1;

        if page.sequence_number != self.sequence_number {
            warn!(
                "Page for row {} belongs to query {}, cursor reads query {}",
                position, page.sequence_number, self.sequence_number
            );
            return Err(BridgeError::SequenceMismatch {
                expected: self.sequence_number,
                actual: page.sequence_number,
            });
        }
        if !page.contains(position) {
            return Err(BridgeError::MalformedResponse(format!(
                "page starting at {} with {} rows does not hold row {}",
                page.start_index,
                page.rows.len(),
                position
            )));
        }

        self.swap_page(page);
        Ok(())
    }

    fn swap_page(&mut self, page: DbResponse) {
        let previous = std::mem::replace(&mut self.page, page);
        if let Some(cache) = self.recent.as_mut() {
            cache.insert(previous);
        }
    }

    // ==================== Columns ====================

    pub fn column_names(&self) -> BridgeResult<&[String]> {
        self.ensure_open()?;
        self.column_names
            .get_or_try_init(|| self.backend.column_names(&self.sql))
            .map(Vec::as_slice)
    }

    pub fn column_count(&self) -> BridgeResult<usize> {
        Ok(self.column_names()?.len())
    }

    /// Index of the named column, `None` when absent
    pub fn column_index(&self, name: &str) -> BridgeResult<Option<usize>> {
        Ok(self.column_names()?.iter().position(|c| c == name))
    }

    pub fn column_index_or_err(&self, name: &str) -> BridgeResult<usize> {
        self.column_index(name)?
            .ok_or_else(|| BridgeError::ColumnNotFound(name.to_string()))
    }

    pub fn column_name(&self, index: usize) -> BridgeResult<&str> {
        let names = self.column_names()?;
        names
            .get(index)
            .map(String::as_str)
            .ok_or(BridgeError::ColumnIndexOutOfBounds {
                index,
                count: names.len(),
            })
    }

    // ==================== Values ====================

    fn current_row(&self) -> BridgeResult<&Row> {
        self.ensure_open()?;
        let offset = self.position - self.page.start_index;
        let size = self.page.rows.len();
        if offset < 0 || offset as usize >= size {
            return Err(BridgeError::CursorIndexOutOfBounds {
                index: offset,
                size,
            });
        }
        Ok(&self.page.rows[offset as usize])
    }

    /// Raw value of `column` in the current row
    pub fn get_value(&self, column: usize) -> BridgeResult<&SqlValue> {
        let row = self.current_row()?;
        row.get(column).ok_or(BridgeError::ColumnIndexOutOfBounds {
            index: column,
            count: row.len(),
        })
    }

    pub fn get_type(&self, column: usize) -> BridgeResult<ColumnType> {
        self.get_value(column).map(ColumnType::from)
    }

    pub fn is_null(&self, column: usize) -> BridgeResult<bool> {
        Ok(self.get_value(column)?.is_null())
    }

    pub fn get_long(&self, column: usize) -> BridgeResult<i64> {
        coerce::as_long(self.get_value(column)?)
    }

    /// Truncating
    pub fn get_int(&self, column: usize) -> BridgeResult<i32> {
        Ok(self.get_long(column)? as i32)
    }

    pub fn get_short(&self, column: usize) -> BridgeResult<i16> {
        Ok(self.get_long(column)? as i16)
    }

    pub fn get_double(&self, column: usize) -> BridgeResult<f64> {
        coerce::as_double(self.get_value(column)?)
    }

    pub fn get_float(&self, column: usize) -> BridgeResult<f32> {
        Ok(self.get_double(column)? as f32)
    }

    pub fn get_string(&self, column: usize) -> BridgeResult<Option<String>> {
        coerce::as_string(self.get_value(column)?)
    }

    pub fn get_blob(&self, column: usize) -> BridgeResult<Option<Vec<u8>>> {
        coerce::as_blob(self.get_value(column)?)
    }

    // ==================== Lifecycle ====================

    /// Release the engine-side result. Idempotent.
    pub fn close(&mut self) -> BridgeResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Some(cache) = self.recent.as_mut() {
            cache.clear();
        }
        self.backend.cancel_query(self.sequence_number)
    }

    fn ensure_open(&self) -> BridgeResult<()> {
        if self.closed {
            Err(BridgeError::CursorClosed)
        } else {
            Ok(())
        }
    }
}

impl Drop for PagedCursor {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            debug!("Failed to release query {}: {}", self.sequence_number, e);
        }
    }
}

impl std::fmt::Debug for PagedCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagedCursor")
            .field("sequence_number", &self.sequence_number)
            .field("row_count", &self.row_count)
            .field("position", &self.position)
            .field("page_start", &self.page.start_index)
            .field("page_rows", &self.page.rows.len())
            .field("closed", &self.closed)
            .finish()
    }
}
