//! Cooperative cancellation for exports
//!
//! The export checks its token between annotations and gives up early once the token
//! has been cancelled, discarding whatever it had produced so far.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Cancellation flag shared between the export and whoever may abort it
///
/// # Example
///
/// ```
/// use pdf_engine::CancellationToken;
///
/// let token = CancellationToken::new();
/// let export_token = token.clone();
///
/// token.cancel();
/// assert!(export_token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel this token and every clone of it. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
