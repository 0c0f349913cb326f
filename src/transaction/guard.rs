use crate::backend::handle::BackendHandle;
use crate::backend::protocol::DbRequest;
use crate::error::BridgeResult;
use parking_lot::lock_api::ArcReentrantMutexGuard;
use parking_lot::{RawMutex, RawThreadId};
use std::sync::Arc;
use tracing::{debug, warn};

type HeldLock = ArcReentrantMutexGuard<RawMutex, RawThreadId, ()>;

/// An open engine transaction.
///
/// Holds the backend mutex for its whole lifetime: other threads' ordinary
/// calls block until the guard is committed, rolled back or dropped, while
/// the owning thread keeps full access. The guard cannot leave the thread
/// that created it. Dropping an unfinished guard rolls back.
pub struct TransactionGuard {
    handle: Arc<BackendHandle>,
    lock: Option<HeldLock>,
}

impl TransactionGuard {
    pub(crate) fn new(handle: Arc<BackendHandle>, lock: HeldLock) -> Self {
        Self {
            handle,
            lock: Some(lock),
        }
    }

    /// Commit and release the backend mutex. The mutex is released even when
    /// the commit fails.
    pub fn commit(mut self) -> BridgeResult<()> {
        debug!("Committing transaction on handle {}", self.handle.raw());
        self.finish(DbRequest::commit())
    }

    /// Roll back and release the backend mutex
    pub fn rollback(mut self) -> BridgeResult<()> {
        debug!("Rolling back transaction on handle {}", self.handle.raw());
        self.finish(DbRequest::rollback())
    }

    fn finish(&mut self, request: DbRequest) -> BridgeResult<()> {
        let result = self.handle.run_db_control(request);
        self.lock.take();
        result
    }
}

impl Drop for TransactionGuard {
    fn drop(&mut self) {
        if self.lock.is_none() {
            return;
        }
        warn!(
            "Transaction guard on handle {} dropped without commit or rollback, rolling back",
            self.handle.raw()
        );
        if let Err(e) = self.finish(DbRequest::rollback()) {
            warn!("Implicit rollback failed: {}", e);
        }
    }
}

impl std::fmt::Debug for TransactionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionGuard")
            .field("handle", &self.handle.raw())
            .field("active", &self.lock.is_some())
            .finish()
    }
}
