//! Common test utilities for sqlbridge tests
//!
//! Provides shared helpers for:
//! - Opening backends on the SQLite reference engine
//! - A scripted engine whose replies are chosen per test
//! - A counting wrapper that records which methods reached the engine
//! - Seeding tables

#![allow(dead_code)]

use parking_lot::Mutex;
use serde::Serialize;
use sqlbridge::backend::protocol::{encode_message, ErrorEnvelope, Int64, Method, PackedResult};
use sqlbridge::backend::{Engine, ErrorCode, RawHandle};
use sqlbridge::{Backend, Bootstrap, Database, SqliteEngine};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

pub const LANGS: &[&str] = &["en"];

pub fn langs() -> Vec<String> {
    LANGS.iter().map(|l| l.to_string()).collect()
}

// ==================== SQLite Helpers ====================

/// Backend on a fresh engine with an in-memory collection open
pub fn open_memory_backend() -> Backend {
    let bootstrap = Bootstrap::new(SqliteEngine::new());
    let backend = bootstrap.open(&langs()).expect("Failed to open backend");
    backend
        .open_collection(":memory:")
        .expect("Failed to open collection");
    backend
}

/// Backend on a collection file inside a temp dir
pub fn open_file_backend() -> (Backend, TempDir) {
    let tmp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = tmp_dir.path().join("collection.db");
    let bootstrap = Bootstrap::new(SqliteEngine::new());
    let backend = bootstrap.open(&langs()).expect("Failed to open backend");
    backend
        .open_collection(path.to_str().unwrap())
        .expect("Failed to open collection");
    (backend, tmp_dir)
}

/// Backend whose engine counts calls per method
pub fn open_counted_backend() -> (Backend, Arc<CountingEngine>) {
    let engine = Arc::new(CountingEngine::new());
    let bootstrap = Bootstrap::from_arc(engine.clone());
    let backend = bootstrap.open(&langs()).expect("Failed to open backend");
    backend
        .open_collection(":memory:")
        .expect("Failed to open collection");
    (backend, engine)
}

/// Create `nums(n integer)` holding 0..count
pub fn seed_numbers(db: &Database, count: i64) {
    db.exec_sql("create table nums (n integer not null)", &[])
        .unwrap();
    let inserted = db
        .execute(
            "with recursive c(x) as (select 0 union all select x + 1 from c where x < ?) \
             insert into nums select x from c",
            &[(count - 1).into()],
        )
        .unwrap();
    assert_eq!(inserted, count);
}

/// Create `items(id integer primary key, name text unique, qty integer)`
pub fn seed_items(db: &Database) {
    db.exec_sql(
        "create table items (id integer primary key, name text unique, qty integer)",
        &[],
    )
    .unwrap();
}

pub fn count_rows(db: &Database, table: &str) -> i64 {
    let rows = db
        .full_query(&format!("select count(*) from {}", table), &[])
        .unwrap();
    rows[0][0].as_i64().unwrap()
}

// ==================== Counting Engine ====================

/// SQLite engine that records how often each method was invoked
pub struct CountingEngine {
    inner: SqliteEngine,
    counts: Mutex<HashMap<Method, usize>>,
}

impl CountingEngine {
    pub fn new() -> Self {
        Self {
            inner: SqliteEngine::new(),
            counts: Mutex::new(HashMap::new()),
        }
    }

    pub fn count(&self, method: Method) -> usize {
        self.counts.lock().get(&method).copied().unwrap_or(0)
    }

    pub fn reset(&self) {
        self.counts.lock().clear();
    }
}

impl Engine for CountingEngine {
    fn open(&self, init: &[u8]) -> Option<PackedResult> {
        self.inner.open(init)
    }

    fn close(&self, handle: RawHandle) {
        self.inner.close(handle)
    }

    fn run_method(
        &self,
        handle: RawHandle,
        service: u32,
        method: u32,
        input: &[u8],
    ) -> Option<PackedResult> {
        if let Some(m) = Method::from_ids(service, method) {
            *self.counts.lock().entry(m).or_insert(0) += 1;
        }
        self.inner.run_method(handle, service, method, input)
    }
}

// ==================== Scripted Engine ====================

type Handler = dyn Fn(Method, &[u8]) -> Option<PackedResult> + Send + Sync;

/// Engine whose every reply comes from a test-supplied closure
pub struct ScriptedEngine {
    handler: Box<Handler>,
    calls: Mutex<Vec<Method>>,
    closed: Mutex<Vec<RawHandle>>,
}

pub const SCRIPTED_HANDLE: RawHandle = 7;

impl ScriptedEngine {
    pub fn new(
        handler: impl Fn(Method, &[u8]) -> Option<PackedResult> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
            closed: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Method> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn closed_handles(&self) -> Vec<RawHandle> {
        self.closed.lock().clone()
    }
}

impl Engine for ScriptedEngine {
    fn open(&self, _init: &[u8]) -> Option<PackedResult> {
        ok(&Int64 {
            val: SCRIPTED_HANDLE,
        })
    }

    fn close(&self, handle: RawHandle) {
        self.closed.lock().push(handle);
    }

    fn run_method(
        &self,
        _handle: RawHandle,
        service: u32,
        method: u32,
        input: &[u8],
    ) -> Option<PackedResult> {
        let method = Method::from_ids(service, method).expect("unknown method ids");
        self.calls.lock().push(method);
        (self.handler)(method, input)
    }
}

/// Backend on a scripted engine
pub fn open_scripted(engine: &Arc<ScriptedEngine>) -> Backend {
    Bootstrap::from_arc(engine.clone())
        .open(&langs())
        .expect("Failed to open scripted backend")
}

pub fn ok<T: Serialize>(msg: &T) -> Option<PackedResult> {
    Some(PackedResult::success(encode_message(msg).unwrap()))
}

pub fn fail(code: ErrorCode, message: &str) -> Option<PackedResult> {
    let envelope = ErrorEnvelope {
        kind: code.as_i32(),
        message: message.to_string(),
        help_page: None,
    };
    Some(PackedResult::failure(encode_message(&envelope).unwrap()))
}
