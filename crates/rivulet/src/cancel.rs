use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::NormalizeError;

/// Cooperative cancellation flag shared between the coordinator and its
/// workers.
///
/// Clone is cheap and shares state. Workers check it at the top of every
/// record's emit loop; the coordinator checks it once more before the
/// commit rename, the last safe point.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Error out of the current operation if cancellation was requested.
    pub fn checkpoint(&self) -> Result<(), NormalizeError> {
        if self.is_cancelled() {
            Err(NormalizeError::Cancelled)
        } else {
            Ok(())
        }
    }
}
