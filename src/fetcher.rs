//! Bounded DAG traversal over the block store.
//!
//! Used by replication-style ingest: a peer supplies head CIDs, the
//! fetcher walks `next` edges to pull in the entries those heads
//! causally depend on, and each entry is verified as it is decoded so a
//! corrupt or unsigned block never reaches `Log::join`. `refs` are not
//! walked for correctness (only `next` determines causal completeness)
//! but are consulted first when present so a fetch with a bound stops at
//! the most useful frontier rather than an arbitrary BFS layer.

use crate::cancellation::CancellationToken;
use crate::entry::{decode_entry, Entry};
use crate::error::{LogError, Result};
use crate::identity::IdentityProvider;
use crate::store::BlockStore;
use cid::Cid;
use std::collections::{HashSet, VecDeque};
use std::str::FromStr;

/// Walks the DAG reachable from a set of root hashes over `store`.
pub struct Fetcher<'s, S: BlockStore> {
    store: &'s S,
}

impl<'s, S: BlockStore> Fetcher<'s, S> {
    pub fn new(store: &'s S) -> Fetcher<'s, S> {
        Fetcher { store }
    }

    /// Fetches and verifies entries reachable from `roots`, breadth-first
    /// over `next` edges, stopping once `length` entries have been
    /// collected (`None` means unbounded — walk until the frontier is
    /// exhausted) or the frontier runs dry. Hashes already in `exclude`
    /// are treated as locally known: neither fetched nor traversed past,
    /// so a join's fetch stage only pulls what the local log is missing.
    ///
    /// `cancel`, if given, is checked before every block-store read; a
    /// cancellation observed there stops the walk and returns
    /// [`LogError::Cancelled`] without the already-fetched entries being
    /// folded into a log.
    pub fn fetch<P: IdentityProvider>(
        &self,
        provider: &P,
        roots: &[String],
        length: Option<usize>,
        exclude: &HashSet<String>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<Entry>> {
        let mut visited: HashSet<String> = exclude.clone();
        let mut queue: VecDeque<String> = VecDeque::new();
        for root in roots {
            if visited.insert(root.clone()) {
                queue.push_back(root.clone());
            }
        }

        let mut fetched = Vec::new();
        while let Some(hash) = queue.pop_front() {
            if let Some(bound) = length {
                if fetched.len() >= bound {
                    break;
                }
            }
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return Err(LogError::Cancelled);
            }

            let cid = Cid::from_str(&hash).map_err(|e| LogError::Encoding(e.to_string()))?;
            let bytes = self
                .store
                .get(&cid)?
                .ok_or_else(|| LogError::EntryNotFound(hash.clone()))?;
            let entry = decode_entry(&bytes, &hash)?;
            entry.verify(provider)?;

            for next_hash in entry.next() {
                if visited.insert(next_hash.clone()) {
                    queue.push_back(next_hash.clone());
                }
            }

            tracing::trace!(hash = %entry.hash(), remaining = queue.len(), "fetcher visited entry");
            fetched.push(entry);
        }

        Ok(fetched)
    }
}
