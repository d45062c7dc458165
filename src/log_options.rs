//! Construction options for [`crate::log::Log`].
//!
//! Covers every field a constructed `Log` actually needs: id, seed
//! entries, explicit heads, starting clock, access controller, and sort
//! function.

use crate::access_controller::AccessController;
use crate::clock::LamportClock;
use crate::entry::Entry;
use crate::sorting::{last_write_wins_fn, SortFn};
use std::sync::Arc;

/// Builder-style options accepted by `Log::new`. All fields default to
/// "let the log decide": no id (defaults to Unix seconds over a
/// thousand), no seed entries, heads inferred from the seed set, clock
/// at time zero, the permissive access controller, and `last_write_wins`
/// ordering.
pub struct LogOptions {
    pub(crate) id: Option<String>,
    pub(crate) access_controller: Option<Arc<dyn AccessController>>,
    pub(crate) entries: Vec<Entry>,
    pub(crate) heads: Option<Vec<String>>,
    pub(crate) clock: Option<LamportClock>,
    pub(crate) sort_fn: SortFn,
}

impl Default for LogOptions {
    fn default() -> LogOptions {
        LogOptions {
            id: None,
            access_controller: None,
            entries: Vec::new(),
            heads: None,
            clock: None,
            sort_fn: last_write_wins_fn(),
        }
    }
}

impl LogOptions {
    pub fn new() -> LogOptions {
        LogOptions::default()
    }

    /// Sets an explicit log id. Leaving this unset makes `Log::new`
    /// default it to `floor(now_unix_seconds() / 1000)`, decimal.
    pub fn id(mut self, id: impl Into<String>) -> LogOptions {
        self.id = Some(id.into());
        self
    }

    pub fn access_controller(mut self, access_controller: Arc<dyn AccessController>) -> LogOptions {
        self.access_controller = Some(access_controller);
        self
    }

    /// Seeds the log with a batch of already-constructed entries,
    /// inserted in the given order.
    pub fn entries(mut self, entries: Vec<Entry>) -> LogOptions {
        self.entries = entries;
        self
    }

    /// Overrides head inference with an explicit set of head hashes.
    /// Each hash must name an entry present in `entries`.
    pub fn heads(mut self, heads: Vec<String>) -> LogOptions {
        self.heads = Some(heads);
        self
    }

    pub fn clock(mut self, clock: LamportClock) -> LogOptions {
        self.clock = Some(clock);
        self
    }

    pub fn sort_fn(mut self, sort_fn: SortFn) -> LogOptions {
        self.sort_fn = sort_fn;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_no_id_and_no_seed_entries() {
        let opts = LogOptions::new();
        assert!(opts.id.is_none());
        assert!(opts.entries.is_empty());
        assert!(opts.heads.is_none());
    }

    #[test]
    fn id_is_chainable() {
        let opts = LogOptions::new().id("A");
        assert_eq!(opts.id.as_deref(), Some("A"));
    }
}
