use super::guard::TransactionGuard;
use crate::backend::Backend;
use crate::error::{BridgeError, BridgeResult};
use tracing::{debug, warn};

/// State of one nesting level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionFrame {
    pub marked_successful: bool,
    /// Set when a nested frame ended without succeeding
    pub failed: bool,
}

impl SessionFrame {
    pub fn is_successful(&self) -> bool {
        self.marked_successful && !self.failed
    }
}

/// Nested transaction bookkeeping on top of a single engine transaction.
///
/// Only the outermost `begin` opens a real transaction and only the matching
/// outermost `end` commits or rolls it back. A nested frame that ends without
/// succeeding marks its parent failed, which forces the final rollback.
pub struct Session {
    backend: Backend,
    frames: Vec<SessionFrame>,
    guard: Option<TransactionGuard>,
}

impl Session {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            frames: Vec::new(),
            guard: None,
        }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Push a frame, opening the engine transaction on the outermost one
    pub fn begin(&mut self) -> BridgeResult<()> {
        if self.frames.is_empty() {
            self.guard = Some(self.backend.begin_transaction()?);
        }
        self.frames.push(SessionFrame::default());
        debug!("Session frame pushed (depth {})", self.frames.len());
        Ok(())
    }

    /// Mark the innermost frame successful
    pub fn mark_successful(&mut self) -> BridgeResult<()> {
        let frame = self
            .frames
            .last_mut()
            .ok_or_else(|| BridgeError::Transaction("No active transaction".to_string()))?;
        frame.marked_successful = true;
        Ok(())
    }

    /// Pop the innermost frame; the last pop commits or rolls back
    pub fn end(&mut self) -> BridgeResult<()> {
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| BridgeError::Transaction("No active transaction".to_string()))?;

        if let Some(parent) = self.frames.last_mut() {
            if !frame.is_successful() {
                parent.failed = true;
            }
            debug!(
                "Session frame popped (depth {}, successful: {})",
                self.frames.len(),
                frame.is_successful()
            );
            return Ok(());
        }

        let guard = self.guard.take().ok_or_else(|| {
            BridgeError::Transaction("Session has frames but no open transaction".to_string())
        })?;
        if frame.is_successful() {
            guard.commit()
        } else {
            guard.rollback()
        }
    }

    pub fn in_transaction(&self) -> bool {
        !self.frames.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// The innermost frame, if any
    pub fn current_frame(&self) -> Option<&SessionFrame> {
        self.frames.last()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.frames.is_empty() {
            warn!(
                "Session dropped with {} open frame(s), transaction will be rolled back",
                self.frames.len()
            );
        }
    }
}
