//! Total order over entries.
//!
//! A partial order falls out of the DAG (`next` edges); the log needs a
//! *total* order for `values()`, `toString`, and size-bound truncation.
//! `last_write_wins` composes three comparisons, stopping at the first
//! that is decisive, so that two entries created by different writers who
//! never saw each other's work still land in the same relative position
//! on every replica.

use crate::entry::Entry;
use std::cmp::Ordering;
use std::sync::Arc;

/// A total-order comparator over entries. Callers may inject their own;
/// the engine only assumes it is total, antisymmetric, and transitive —
/// it never inspects the comparator's internals.
pub type SortFn = Arc<dyn Fn(&Entry, &Entry) -> Ordering + Send + Sync>;

/// The default comparator: clock time, then clock id, then hash. Each
/// step only runs if the previous one was a tie, so two entries with
/// distinct clock times never fall through to a hash comparison.
pub fn last_write_wins(a: &Entry, b: &Entry) -> Ordering {
    a.clock()
        .time()
        .cmp(&b.clock().time())
        .then_with(|| a.clock().id().cmp(b.clock().id()))
        .then_with(|| a.hash().cmp(b.hash()))
}

/// [`last_write_wins`] wrapped as a [`SortFn`] for use as a `Log`'s
/// default comparator.
pub fn last_write_wins_fn() -> SortFn {
    Arc::new(last_write_wins)
}
