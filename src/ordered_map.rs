//! Insertion-ordered, hash-keyed entry container.
//!
//! Backs `Log::entries`, `Log::heads`, and every view derived from them
//! (`values`, `heads`, `tails`). Insertion order is preserved so that a log
//! seeded from an ordered batch of entries reproduces that batch's order
//! when no sort is applied, while still supporting deterministic sorted
//! iteration via [`OrderedEntryMap::sorted`].

use crate::entry::Entry;
use crate::sorting::SortFn;
use indexmap::IndexMap;

/// A `hash -> Entry` map that remembers insertion order. O(1) membership
/// and get; iteration order is insertion order unless explicitly sorted.
#[derive(Clone, Debug, Default)]
pub struct OrderedEntryMap {
    by_hash: IndexMap<String, Entry>,
}

impl OrderedEntryMap {
    pub fn new() -> OrderedEntryMap {
        OrderedEntryMap { by_hash: IndexMap::new() }
    }

    pub fn with_capacity(cap: usize) -> OrderedEntryMap {
        OrderedEntryMap { by_hash: IndexMap::with_capacity(cap) }
    }

    /// Inserts `entry` keyed by its hash. Returns `true` if this hash was
    /// not already present (i.e. this was a genuine insertion, not a
    /// duplicate join of an entry we already hold).
    pub fn insert(&mut self, entry: Entry) -> bool {
        let hash = entry.hash().to_owned();
        self.by_hash.insert(hash, entry).is_none()
    }

    pub fn get(&self, hash: &str) -> Option<&Entry> {
        self.by_hash.get(hash)
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.by_hash.contains_key(hash)
    }

    pub fn remove(&mut self, hash: &str) -> Option<Entry> {
        self.by_hash.shift_remove(hash)
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.by_hash.keys()
    }

    /// Entries in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &Entry> {
        self.by_hash.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Entry)> {
        self.by_hash.iter()
    }

    /// Entries ordered by `sort_fn`, ascending (`Log::values`) or
    /// descending (`Log::heads`).
    pub fn sorted(&self, sort_fn: &SortFn, descending: bool) -> Vec<&Entry> {
        let mut entries: Vec<&Entry> = self.by_hash.values().collect();
        entries.sort_by(|a, b| sort_fn(a, b));
        if descending {
            entries.reverse();
        }
        entries
    }

    /// Rebuilds a fresh map containing only the given hashes, preserving
    /// the original relative insertion order of those that survive. Used
    /// by `Log::join`'s size-bound truncation.
    pub fn retain_hashes<'a>(&self, hashes: impl IntoIterator<Item = &'a str>) -> OrderedEntryMap {
        let wanted: std::collections::HashSet<&str> = hashes.into_iter().collect();
        let mut out = OrderedEntryMap::with_capacity(wanted.len());
        for (hash, entry) in self.by_hash.iter() {
            if wanted.contains(hash.as_str()) {
                out.by_hash.insert(hash.clone(), entry.clone());
            }
        }
        out
    }
}
