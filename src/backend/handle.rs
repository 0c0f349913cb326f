//! Owner of one engine instance.
//!
//! All non-exempt calls are serialized through a reentrant mutex, so the
//! thread holding a transaction may keep issuing calls while every other
//! thread waits. Exempt calls skip the mutex entirely.

use super::engine::{Engine, RawHandle, CLOSED_HANDLE};
use super::protocol::{
    decode_message, decode_reply, encode_message, BackendInit, DbRequest, Int64, Method, Reply,
};
use super::taxonomy::BackendError;
use crate::error::{BridgeError, BridgeResult};
use crate::transaction::TransactionGuard;
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, ReentrantMutex};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

pub struct BackendHandle {
    engine: Arc<dyn Engine>,
    raw: AtomicI64,
    lock: Arc<ReentrantMutex<()>>,
    /// Set once by the first fatal error and never cleared
    poison: OnceCell<String>,
    /// Sequence number of the most recent paged query, if it is still live
    active_query: Mutex<Option<i32>>,
}

impl BackendHandle {
    /// Create an engine instance. Any failure here is fatal.
    pub(crate) fn open(engine: Arc<dyn Engine>, languages: &[String]) -> BridgeResult<Self> {
        let init = encode_message(&BackendInit {
            preferred_langs: languages.to_vec(),
        })?;

        let bytes = match decode_reply(engine.open(&init))? {
            Reply::Success(bytes) => bytes,
            Reply::Failure(envelope) => {
                error!("Engine failed to open: {}", envelope.message);
                return Err(BackendError::fatal(envelope.message).into());
            }
        };

        let Int64 { val: raw } = decode_message(&bytes)?;
        if raw == CLOSED_HANDLE {
            return Err(BridgeError::MalformedResponse(
                "engine returned a null handle".to_string(),
            ));
        }

        debug!("Opened backend handle {} (langs: {:?})", raw, languages);
        Ok(Self {
            engine,
            raw: AtomicI64::new(raw),
            lock: Arc::new(ReentrantMutex::new(())),
            poison: OnceCell::new(),
            active_query: Mutex::new(None),
        })
    }

    pub fn is_open(&self) -> bool {
        self.raw.load(Ordering::SeqCst) != CLOSED_HANDLE
    }

    pub fn is_poisoned(&self) -> bool {
        self.poison.get().is_some()
    }

    /// Raw engine handle, zero once closed
    pub fn raw(&self) -> RawHandle {
        self.raw.load(Ordering::SeqCst)
    }

    /// Release the engine instance. Waits for any in-flight locked call and
    /// is a no-op when already closed.
    pub fn close(&self) {
        let _guard = self.lock.lock();
        let raw = self.raw.swap(CLOSED_HANDLE, Ordering::SeqCst);
        if raw == CLOSED_HANDLE {
            return;
        }
        *self.active_query.lock() = None;
        debug!("Closing backend handle {}", raw);
        self.engine.close(raw);
    }

    /// Invoke a method by its wire ids. Unknown ids are treated as
    /// non-exempt.
    pub fn call(&self, service: u32, method: u32, payload: &[u8]) -> BridgeResult<Vec<u8>> {
        let exempt = Method::from_ids(service, method).is_some_and(Method::is_exempt);
        if exempt {
            self.invoke(service, method, payload)
        } else {
            let _guard = self.lock.lock();
            self.invoke(service, method, payload)
        }
    }

    /// Encode `request` and invoke `method`, returning the raw success bytes
    pub fn call_method<Req: Serialize>(
        &self,
        method: Method,
        request: &Req,
    ) -> BridgeResult<Vec<u8>> {
        let payload = encode_message(request)?;
        let (service, id) = method.ids();
        self.call(service, id, &payload)
    }

    /// Encode `request`, invoke `method` and decode the typed response
    pub fn run<Req, Resp>(&self, method: Method, request: &Req) -> BridgeResult<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let bytes = self.call_method(method, request)?;
        decode_message(&bytes)
    }

    /// Acquire the backend mutex and open an engine transaction.
    ///
    /// The returned guard keeps the mutex held until it is committed, rolled
    /// back or dropped.
    pub fn begin_transaction(self: &Arc<Self>) -> BridgeResult<TransactionGuard> {
        let lock = self.lock.lock_arc();
        self.run_db_control(DbRequest::begin())?;
        debug!("Began transaction on handle {}", self.raw());
        Ok(TransactionGuard::new(Arc::clone(self), lock))
    }

    /// Send a begin/commit/rollback request. The JSON result is discarded.
    pub(crate) fn run_db_control(&self, request: DbRequest) -> BridgeResult<()> {
        self.call_method(Method::RunDbCommand, &request)?;
        Ok(())
    }

    pub(crate) fn set_active_query(&self, sequence_number: i32) {
        *self.active_query.lock() = Some(sequence_number);
    }

    pub fn active_query(&self) -> Option<i32> {
        *self.active_query.lock()
    }

    /// Run `f` with the active-query slot locked. Used so that cancellation
    /// decides and acts on the same sequence number.
    pub(crate) fn with_active_query<T>(&self, f: impl FnOnce(&mut Option<i32>) -> T) -> T {
        let mut active = self.active_query.lock();
        f(&mut active)
    }

    fn invoke(&self, service: u32, method: u32, payload: &[u8]) -> BridgeResult<Vec<u8>> {
        let raw = self.raw.load(Ordering::SeqCst);
        if raw == CLOSED_HANDLE {
            return Err(BridgeError::Closed);
        }
        if let Some(reason) = self.poison.get() {
            return Err(BackendError::fatal(format!(
                "backend unusable after fatal error: {}",
                reason
            ))
            .into());
        }

        trace!("Calling {}.{} on handle {}", service, method, raw);
        let result = self.engine.run_method(raw, service, method, payload);
        match decode_reply(result) {
            Ok(Reply::Success(bytes)) => Ok(bytes),
            Ok(Reply::Failure(envelope)) => {
                let err = BackendError::from(envelope);
                if err.is_fatal() && self.poison.set(err.message.clone()).is_ok() {
                    error!(
                        "Backend handle {} poisoned by fatal error in {}.{}: {}",
                        raw, service, method, err.message
                    );
                }
                Err(err.into())
            }
            Err(e) => {
                warn!("Malformed response from {}.{}: {}", service, method, e);
                Err(e)
            }
        }
    }
}

impl Drop for BackendHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for BackendHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendHandle")
            .field("raw", &self.raw())
            .field("poisoned", &self.is_poisoned())
            .finish()
    }
}
