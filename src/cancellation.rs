//! Cooperative cancellation for operations that perform I/O or crypto.
//! Every operation that performs I/O accepts a cancellation token; a
//! cancellation observed mid-operation leaves the log's in-memory state
//! unmutated beyond what it had already durably admitted.
//!
//! This crate is synchronous, so a token is just a shared flag checked at
//! the suspension points section 5 names (block-store reads/writes,
//! signature operations) rather than a future that can be polled away.
//! Cloning shares the same underlying flag: whichever clone calls
//! [`CancellationToken::cancel`] cancels every clone, including the one
//! an in-flight `append`/`join`/`fetch` call is holding.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> CancellationToken {
        CancellationToken(Arc::new(AtomicBool::new(false)))
    }

    /// Signals cancellation. Idempotent: cancelling twice is a no-op.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
