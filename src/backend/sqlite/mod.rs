//! Reference engine backed by SQLite
//!
//! Implements the engine boundary in-process with rusqlite. Each instance
//! owns at most one open collection and one outstanding paged result. Panics
//! raised while serving a call are caught and reported as fatal errors.

mod results;

use super::engine::{Engine, RawHandle};
use super::protocol::{
    decode_message, encode_message, BackendInit, ColumnNamesRequest, DbRequest, DbRequestKind,
    DbResponse, Empty, ErrorEnvelope, FlushRequest, Int64, Method, OpenCollectionRequest,
    PackedResult, PageRequest, PageSizeRequest, Progress, Row, SqlValue, StringList, StringValue,
    TranslateRequest,
};
use super::taxonomy::ErrorCode;
use parking_lot::Mutex;
use results::ResultCache;
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{params_from_iter, Connection, InterruptHandle, ToSql};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

/// Default result page budget (2 MiB)
pub const DEFAULT_PAGE_SIZE_BYTES: u64 = 2 * 1024 * 1024;

/// Path that opens a private in-memory collection
pub const IN_MEMORY: &str = ":memory:";

type CallResult = Result<Vec<u8>, ErrorEnvelope>;

pub struct SqliteEngine {
    instances: Mutex<HashMap<RawHandle, Arc<Instance>>>,
    next_handle: AtomicI64,
}

struct Instance {
    languages: Vec<String>,
    collection: Mutex<Option<Connection>>,
    results: Mutex<ResultCache>,
    page_size: AtomicU64,
    /// Interrupts whatever statement the open collection is running
    interrupt: Mutex<Option<InterruptHandle>>,
}

impl SqliteEngine {
    pub fn new() -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
            next_handle: AtomicI64::new(1),
        }
    }

    /// Number of live instances
    pub fn instance_count(&self) -> usize {
        self.instances.lock().len()
    }

    fn instance(&self, handle: RawHandle) -> Option<Arc<Instance>> {
        self.instances.lock().get(&handle).cloned()
    }
}

impl Default for SqliteEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for SqliteEngine {
    fn open(&self, init: &[u8]) -> Option<PackedResult> {
        let init: BackendInit = match decode_message(init) {
            Ok(init) => init,
            Err(e) => {
                return Some(pack(Err(envelope(ErrorCode::ProtoError, e.to_string()))));
            }
        };

        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
        let instance = Instance {
            languages: init.preferred_langs,
            collection: Mutex::new(None),
            results: Mutex::new(ResultCache::new()),
            page_size: AtomicU64::new(DEFAULT_PAGE_SIZE_BYTES),
            interrupt: Mutex::new(None),
        };
        self.instances.lock().insert(handle, Arc::new(instance));
        debug!("SQLite engine opened instance {}", handle);
        Some(pack(respond(&Int64 { val: handle })))
    }

    fn close(&self, handle: RawHandle) {
        if self.instances.lock().remove(&handle).is_some() {
            debug!("SQLite engine closed instance {}", handle);
        }
    }

    fn run_method(
        &self,
        handle: RawHandle,
        service: u32,
        method: u32,
        input: &[u8],
    ) -> Option<PackedResult> {
        let Some(instance) = self.instance(handle) else {
            return Some(pack(Err(envelope(
                ErrorCode::InvalidInput,
                format!("unknown backend handle {}", handle),
            ))));
        };
        let Some(method) = Method::from_ids(service, method) else {
            return Some(pack(Err(envelope(
                ErrorCode::InvalidInput,
                format!("unknown method {}.{}", service, method),
            ))));
        };

        let outcome =
            panic::catch_unwind(AssertUnwindSafe(|| instance.dispatch(method, input)));
        let result = outcome.unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            error!("SQLite engine panicked in {}: {}", method, message);
            Err(envelope(ErrorCode::Panic, message))
        });
        Some(pack(result))
    }
}

impl Instance {
    fn dispatch(&self, method: Method, input: &[u8]) -> CallResult {
        match method {
            Method::TranslateString => {
                let req: TranslateRequest = request(input)?;
                respond(&StringValue {
                    val: self.translate(&req),
                })
            }
            Method::LatestProgress => respond(&Progress::Idle),
            Method::SetWantsAbort => {
                let _: Empty = request(input)?;
                if let Some(interrupt) = self.interrupt.lock().as_ref() {
                    debug!("Interrupting running statement");
                    interrupt.interrupt();
                }
                respond(&Empty {})
            }
            Method::OpenCollection => {
                let req: OpenCollectionRequest = request(input)?;
                self.open_collection(&req.collection_path)?;
                respond(&Empty {})
            }
            Method::CloseCollection => {
                let _: Empty = request(input)?;
                self.close_collection()?;
                respond(&Empty {})
            }
            Method::RunDbCommand => {
                let req: DbRequest = request(input)?;
                self.run_json(&req)
            }
            Method::RunDbCommandProto => {
                let req: DbRequest = request(input)?;
                let rows = self.with_collection(|conn| query_rows(conn, &req))?;
                let page_size = self.page_size.load(Ordering::SeqCst);
                respond(&self.results.lock().store(rows, page_size))
            }
            Method::RunDbCommandForRowCount => {
                let req: DbRequest = request(input)?;
                let changed = self.with_collection(|conn| {
                    conn.execute(&req.sql, params_from_iter(req.args.iter()))
                })?;
                respond(&Int64 {
                    val: changed as i64,
                })
            }
            Method::InsertForId => {
                let req: DbRequest = request(input)?;
                let id = self.with_collection(|conn| {
                    conn.execute(&req.sql, params_from_iter(req.args.iter()))?;
                    Ok(conn.last_insert_rowid())
                })?;
                respond(&Int64 { val: id })
            }
            Method::GetNextResultPage => {
                let req: PageRequest = request(input)?;
                let page: DbResponse = self
                    .results
                    .lock()
                    .page(req.start_index)
                    .ok_or_else(|| {
                        envelope(
                            ErrorCode::InvalidInput,
                            format!("query {} has no outstanding result", req.sequence_number),
                        )
                    })?;
                respond(&page)
            }
            Method::FlushQuery => {
                let req: FlushRequest = request(input)?;
                self.results.lock().flush(req.sequence_number);
                respond(&Empty {})
            }
            Method::FlushAllQueries => {
                let _: Empty = request(input)?;
                self.results.lock().clear();
                respond(&Empty {})
            }
            Method::SetPageSize => {
                let req: PageSizeRequest = request(input)?;
                self.page_size
                    .store(req.page_size_bytes.max(1), Ordering::SeqCst);
                respond(&Empty {})
            }
            Method::GetColumnNamesFromQuery => {
                let req: ColumnNamesRequest = request(input)?;
                let vals = self.with_collection(|conn| {
                    let stmt = conn.prepare(&req.sql)?;
                    let names: Vec<String> =
                        stmt.column_names().into_iter().map(str::to_string).collect();
                    Ok(names)
                })?;
                respond(&StringList { vals })
            }
        }
    }

    fn translate(&self, req: &TranslateRequest) -> String {
        let lang = self.languages.first().map(String::as_str).unwrap_or("en");
        let mut text = format!("{}:{}.{}", lang, req.module_index, req.message_index);
        for (key, value) in &req.args {
            text.push_str(&format!(" {}={}", key, value));
        }
        text
    }

    fn open_collection(&self, path: &str) -> Result<(), ErrorEnvelope> {
        let mut collection = self.collection.lock();
        if collection.is_some() {
            return Err(envelope(ErrorCode::InvalidInput, "CollectionAlreadyOpen"));
        }
        let conn = if path == IN_MEMORY {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .map_err(db_error)?;
        *self.interrupt.lock() = Some(conn.get_interrupt_handle());
        *collection = Some(conn);
        Ok(())
    }

    fn close_collection(&self) -> Result<(), ErrorEnvelope> {
        let conn = self
            .collection
            .lock()
            .take()
            .ok_or_else(|| envelope(ErrorCode::InvalidInput, "CollectionNotOpen"))?;
        self.interrupt.lock().take();
        self.results.lock().clear();
        conn.close().map_err(|(_, e)| db_error(e))
    }

    fn with_collection<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, ErrorEnvelope> {
        let collection = self.collection.lock();
        let conn = collection
            .as_ref()
            .ok_or_else(|| envelope(ErrorCode::InvalidInput, "CollectionNotOpen"))?;
        f(conn).map_err(db_error)
    }

    /// Transaction control and row-as-JSON queries
    fn run_json(&self, req: &DbRequest) -> CallResult {
        let json = match req.kind {
            DbRequestKind::Begin => {
                self.with_collection(|conn| conn.execute_batch("begin"))?;
                serde_json::Value::Null
            }
            DbRequestKind::Commit => {
                self.with_collection(|conn| {
                    if !conn.is_autocommit() {
                        conn.execute_batch("commit")?;
                    }
                    Ok(())
                })?;
                serde_json::Value::Null
            }
            DbRequestKind::Rollback => {
                self.with_collection(|conn| {
                    if !conn.is_autocommit() {
                        conn.execute_batch("rollback")?;
                    }
                    Ok(())
                })?;
                serde_json::Value::Null
            }
            DbRequestKind::Query => {
                let rows = self.with_collection(|conn| query_rows(conn, req))?;
                serde_json::Value::Array(
                    rows.iter()
                        .map(|row| {
                            serde_json::Value::Array(row.iter().map(SqlValue::to_json).collect())
                        })
                        .collect(),
                )
            }
        };
        serde_json::to_vec(&json).map_err(|e| envelope(ErrorCode::JsonError, e.to_string()))
    }
}

fn query_rows(conn: &Connection, req: &DbRequest) -> rusqlite::Result<Vec<Row>> {
    let mut stmt = conn.prepare(&req.sql)?;
    let column_count = stmt.column_count();
    let mut rows = stmt.query(params_from_iter(req.args.iter()))?;

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(column_count);
        for i in 0..column_count {
            values.push(from_value_ref(row.get_ref(i)?));
        }
        out.push(values);
        if req.first_row_only {
            break;
        }
    }
    Ok(out)
}

fn from_value_ref(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) => SqlValue::Long(i),
        ValueRef::Real(f) => SqlValue::Double(f),
        ValueRef::Text(t) => SqlValue::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(Value::Null),
            SqlValue::Long(v) => ToSqlOutput::Owned(Value::Integer(*v)),
            SqlValue::Double(v) => ToSqlOutput::Owned(Value::Real(*v)),
            SqlValue::String(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            SqlValue::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

fn request<T: DeserializeOwned>(input: &[u8]) -> Result<T, ErrorEnvelope> {
    decode_message(input).map_err(|e| envelope(ErrorCode::ProtoError, e.to_string()))
}

fn respond<T: Serialize>(msg: &T) -> CallResult {
    encode_message(msg).map_err(|e| envelope(ErrorCode::ProtoError, e.to_string()))
}

fn envelope(code: ErrorCode, message: impl Into<String>) -> ErrorEnvelope {
    ErrorEnvelope {
        kind: code.as_i32(),
        message: message.into(),
        help_page: None,
    }
}

/// Database errors carry their sub-kind in the message, the way clients
/// expect to find it.
fn db_error(err: rusqlite::Error) -> ErrorEnvelope {
    if let rusqlite::Error::SqliteFailure(e, _) = &err {
        if e.code == rusqlite::ErrorCode::OperationInterrupted {
            return envelope(ErrorCode::Interrupted, err.to_string());
        }
    }
    let kind = match &err {
        rusqlite::Error::SqliteFailure(e, _) => match e.code {
            rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked => "Locked",
            rusqlite::ErrorCode::DatabaseCorrupt | rusqlite::ErrorCode::NotADatabase => "Corrupt",
            _ => "Other",
        },
        _ => "Other",
    };
    envelope(
        ErrorCode::DbError,
        format!("DbError {{ info: \"{:?}\", kind: {} }}", err, kind),
    )
}

fn pack(result: CallResult) -> PackedResult {
    match result {
        Ok(bytes) => PackedResult::success(bytes),
        Err(envelope) => match encode_message(&envelope) {
            Ok(bytes) => PackedResult::failure(bytes),
            // an envelope that cannot be encoded leaves the caller with nothing
            Err(_) => PackedResult::default(),
        },
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "engine panicked".to_string()
    }
}
