//! Serialization of platform credential ceremonies.
//!
//! The platform credential API cannot service two concurrent ceremonies, so
//! the agent holds one process-wide flag per agent instance. Acquisition is a
//! single compare-exchange, strictly before any suspension point, and release
//! rides on `Drop` so every exit path (success, error, early return, panic)
//! clears the flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

use crate::error::{AgentError, Result};

/// Flag guarding credential ceremonies against overlap.
#[derive(Clone, Default)]
pub struct CeremonyGuard {
    locked: Arc<AtomicBool>,
}

impl CeremonyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the ceremony flag.
    ///
    /// Returns [`AgentError::OperationInProgress`] when a ceremony already
    /// holds it; the caller must then bail out before any network activity.
    pub fn try_acquire(&self) -> Result<CeremonyPermit> {
        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Acquire)
            .is_ok()
        {
            Ok(CeremonyPermit {
                locked: Arc::clone(&self.locked),
            })
        } else {
            warn!("Credential ceremony already in progress, rejecting overlapping call");
            Err(AgentError::OperationInProgress)
        }
    }

    /// Whether a ceremony currently holds the flag.
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }
}

/// Proof of an exclusive ceremony slot; releases the flag when dropped.
pub struct CeremonyPermit {
    locked: Arc<AtomicBool>,
}

impl Drop for CeremonyPermit {
    fn drop(&mut self) {
        self.locked.store(false, Ordering::Release);
    }
}
