//! Cooperative cancellation shared between the UI and the update worker.

use crate::error::{Result, UpdateError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cloneable flag checked by the orchestrator between steps.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// New, un-cancelled flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(UpdateError::Cancelled)` once cancellation was requested.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Cancelled`] if [`CancelFlag::cancel`] was called.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(UpdateError::Cancelled)
        } else {
            Ok(())
        }
    }
}
