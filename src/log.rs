//! The CRDT itself: tip tracking, causal merge, authorization, and
//! deterministic iteration.
//!
//! State lives behind a `parking_lot::Mutex` rather than requiring `&mut
//! self` for `append`/`join`: the log is a single-writer structure that
//! must still be reachable from multiple threads, serializing concurrent
//! append/join with a per-log exclusive lock, which in Rust is naturally
//! expressed as `Arc<Log<_, _>>` shared across writers rather than `&mut`
//! borrowing. Heads are kept as a set of hash keys into `entries`, never
//! as a second copy of the `Entry` itself, so `append`/`join` stay
//! allocation-light instead of reference counting entries twice.

use crate::access_controller::{AccessController, CanAppendContext, PermissiveAccessController};
use crate::cancellation::CancellationToken;
use crate::clock::LamportClock;
use crate::entry::{create_entry, Entry, EntryOrHash};
use crate::error::{LogError, Result};
use crate::fetcher::Fetcher;
use crate::identity::{Identity, IdentityProvider};
use crate::log_options::LogOptions;
use crate::ordered_map::OrderedEntryMap;
use crate::sorting::SortFn;
use crate::store::BlockStore;
use cid::Cid;
use indexmap::IndexSet;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Default cap on `refs` samples when the caller does not specify a
/// positive `pointer_count`.
const DEFAULT_REF_CAP: usize = 64;

struct LogInner {
    entries: OrderedEntryMap,
    heads: IndexSet<String>,
    nexts_index: HashMap<String, HashSet<String>>,
    clock: LamportClock,
}

/// The append-only, join-convergent operation log. Generic over the block
/// store and identity provider it was constructed with, matching `Entry`'s
/// construction/verification helpers.
pub struct Log<S: BlockStore, P: IdentityProvider> {
    id: String,
    identity: Identity,
    store: Arc<S>,
    provider: Arc<P>,
    access_controller: Arc<dyn AccessController>,
    sort_fn: SortFn,
    inner: Mutex<LogInner>,
}

fn default_log_id() -> String {
    (SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        / 1000)
        .to_string()
}

/// The on-the-wire shape of `to_multihash`'s snapshot: just enough to
/// rehydrate a log via `new_from_multihash` and the fetcher.
#[derive(Serialize, Deserialize)]
struct LogSnapshot {
    id: String,
    heads: Vec<String>,
}

/// Applies the per-insertion head/next-index update for a single freshly
/// admitted entry.
fn apply_head_maintenance(heads: &mut IndexSet<String>, nexts_index: &mut HashMap<String, HashSet<String>>, entry: &Entry) {
    for parent in entry.next() {
        heads.shift_remove(parent);
        nexts_index.entry(parent.clone()).or_default().insert(entry.hash().to_owned());
    }
    let has_successor = nexts_index.get(entry.hash()).is_some_and(|s| !s.is_empty());
    if !has_successor {
        heads.insert(entry.hash().to_owned());
    }
}

/// Samples `refs` at exponentially increasing distances back from the tip
/// of the log's linearized history: indices `1, 2, 4, 8, ...` into the
/// descending sort order, skipping anything already named in `next`, up
/// to `cap` samples.
fn compute_refs(entries: &OrderedEntryMap, sort_fn: &SortFn, next_hashes: &HashSet<&str>, cap: usize) -> Vec<String> {
    let linear = entries.sorted(sort_fn, true);
    let mut refs = Vec::new();
    let mut distance = 1usize;
    while distance < linear.len() && refs.len() < cap {
        let candidate = linear[distance];
        if !next_hashes.contains(candidate.hash()) {
            refs.push(candidate.hash().to_owned());
        }
        distance *= 2;
    }
    refs
}

/// Recursive "longest chain back to a root" depth used by `to_string`'s
/// tree rendering. An entry with no locally known `next` parents (a root,
/// or a tail whose parents were never fetched) has depth zero.
fn chain_depth(hash: &str, entries: &OrderedEntryMap, cache: &mut HashMap<String, usize>) -> usize {
    if let Some(&cached) = cache.get(hash) {
        return cached;
    }
    let depth = match entries.get(hash) {
        Some(e) if !e.next().is_empty() => 1 + e.next().iter().map(|p| chain_depth(p, entries, cache)).max().unwrap_or(0),
        _ => 0,
    };
    cache.insert(hash.to_owned(), depth);
    depth
}

impl<S: BlockStore, P: IdentityProvider> Log<S, P> {
    /// Constructs a log. `store` and `identity` are optional purely so a
    /// missing one surfaces as a regular error return rather than pushing
    /// that check onto every caller via a wrapper type.
    pub fn new(store: Option<Arc<S>>, identity: Option<Identity>, provider: Arc<P>, options: LogOptions) -> Result<Log<S, P>> {
        let store = store.ok_or(LogError::IpfsNotDefined)?;
        let identity = identity.ok_or(LogError::IdentityNotDefined)?;

        let LogOptions { id, access_controller, entries: seed_entries, heads: explicit_heads, clock: explicit_clock, sort_fn } = options;

        let id = id.unwrap_or_else(default_log_id);
        let access_controller = access_controller.unwrap_or_else(|| Arc::new(PermissiveAccessController) as Arc<dyn AccessController>);

        let mut nexts_index: HashMap<String, HashSet<String>> = HashMap::new();
        for entry in &seed_entries {
            for parent in entry.next() {
                nexts_index.entry(parent.clone()).or_default().insert(entry.hash().to_owned());
            }
        }

        let mut entries = OrderedEntryMap::with_capacity(seed_entries.len());
        for entry in seed_entries {
            entries.insert(entry);
        }

        let heads: IndexSet<String> = match explicit_heads {
            Some(explicit) => explicit.into_iter().filter(|h| entries.contains(h)).collect(),
            None => entries
                .keys()
                .filter(|h| nexts_index.get(h.as_str()).is_none_or(|s| s.is_empty()))
                .cloned()
                .collect(),
        };

        let clock = explicit_clock.unwrap_or_else(|| {
            let max_time = entries.values().map(|e| e.clock().time()).max().unwrap_or(0);
            LamportClock::new(identity.public_key().to_vec()).set_time(max_time)
        });

        tracing::debug!(log_id = %id, entries = entries.len(), heads = heads.len(), "log constructed");

        Ok(Log {
            id,
            identity,
            store,
            provider,
            access_controller,
            sort_fn,
            inner: Mutex::new(LogInner { entries, heads, nexts_index, clock }),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn clock(&self) -> LamportClock {
        self.inner.lock().clock.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    pub fn get(&self, hash: &str) -> Option<Entry> {
        self.inner.lock().entries.get(hash).cloned()
    }

    /// All known entries, ascending by the log's sort order.
    pub fn values(&self) -> Vec<Entry> {
        let inner = self.inner.lock();
        inner.entries.sorted(&self.sort_fn, false).into_iter().cloned().collect()
    }

    /// Current tips, descending by the log's sort order.
    pub fn heads(&self) -> Vec<Entry> {
        let inner = self.inner.lock();
        let mut heads: Vec<&Entry> = inner.heads.iter().filter_map(|h| inner.entries.get(h)).collect();
        heads.sort_by(|a, b| (self.sort_fn)(a, b));
        heads.reverse();
        heads.into_iter().cloned().collect()
    }

    /// Entries whose `next` names a hash this log does not have
    /// (glossary: "Tail").
    pub fn tails(&self) -> Vec<Entry> {
        let inner = self.inner.lock();
        inner
            .entries
            .values()
            .filter(|e| e.next().iter().any(|parent| !inner.entries.contains(parent)))
            .cloned()
            .collect()
    }

    /// Appends `payload` as a new entry. `pointer_count`, if positive,
    /// caps both how many current heads become `next` parents and how
    /// many `refs` are sampled; `None` or a non-positive value takes all
    /// heads and the default ref cap.
    ///
    /// `cancel`, if given, is checked before the entry is signed and
    /// persisted and again immediately before it is admitted into
    /// `entries`: a cancellation observed at either point returns
    /// [`LogError::Cancelled`] with the log's
    /// in-memory state untouched. The block store may still hold the
    /// signed entry's bytes if cancellation landed between persisting it
    /// and admitting it — harmless, since blocks are content-addressed.
    pub fn append(&self, payload: &[u8], pointer_count: Option<usize>, cancel: Option<&CancellationToken>) -> Result<Entry> {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(LogError::Cancelled);
        }

        let mut inner = self.inner.lock();

        let head_entries: Vec<Entry> = {
            let mut heads: Vec<&Entry> = inner.heads.iter().filter_map(|h| inner.entries.get(h)).collect();
            if let Some(limit) = pointer_count.filter(|n| *n > 0) {
                heads.truncate(limit);
            }
            heads.into_iter().cloned().collect()
        };

        let max_head_time = head_entries.iter().map(|e| e.clock().time()).max().unwrap_or(0);
        let new_time = inner.clock.time().max(max_head_time) + 1;
        let entry_clock = LamportClock::new(self.identity.public_key().to_vec()).set_time(new_time);

        let next: Vec<EntryOrHash<'_>> = head_entries.iter().map(EntryOrHash::Entry).collect();
        let next_hashes: HashSet<&str> = head_entries.iter().map(Entry::hash).collect();
        let ref_cap = pointer_count.filter(|n| *n > 0).unwrap_or(DEFAULT_REF_CAP);
        let ref_hashes = compute_refs(&inner.entries, &self.sort_fn, &next_hashes, ref_cap);
        let refs: Vec<EntryOrHash<'_>> = ref_hashes.into_iter().map(EntryOrHash::Hash).collect();

        let entry = create_entry(
            self.store.as_ref(),
            &self.identity,
            self.provider.as_ref(),
            &self.id,
            payload,
            &next,
            &refs,
            Some(entry_clock),
        )?;

        if let Err(e) = self.access_controller.can_append(&entry, self.provider.as_ref(), None) {
            tracing::warn!(log_id = %self.id, hash = %entry.hash(), error = %e, "append denied by access controller");
            return Err(e);
        }

        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(LogError::Cancelled);
        }

        inner.entries.insert(entry.clone());
        apply_head_maintenance(&mut inner.heads, &mut inner.nexts_index, &entry);
        inner.clock.merge(entry.clock());

        tracing::debug!(log_id = %self.id, hash = %entry.hash(), heads = inner.heads.len(), "entry appended");

        Ok(entry)
    }

    /// Merges `other` into this log. `size_bound < 0` means unbounded;
    /// otherwise the log is truncated to its `size_bound` most recent
    /// entries afterwards. Returns the number of entries admitted from
    /// `other` (entries rejected by verification or the access controller
    /// are skipped, not errors).
    ///
    /// `cancel`, if given, is checked once per candidate entry, right
    /// before its (crypto, suspension-point) verification step. A
    /// cancellation observed there stops
    /// admitting further entries and returns [`LogError::Cancelled`];
    /// entries already admitted earlier in the same call remain, the
    /// same partial-progress behavior this loop already has for entries
    /// skipped by verification or the access controller.
    pub fn join(&self, other: &Log<S, P>, size_bound: i64, cancel: Option<&CancellationToken>) -> Result<usize> {
        if self.id != other.id {
            return Err(LogError::LogIdMismatch { ours: self.id.clone(), theirs: other.id.clone() });
        }

        let (other_entries, other_heads, other_clock_time) = {
            let other_inner = other.inner.lock();
            (
                other_inner.entries.values().cloned().collect::<Vec<Entry>>(),
                other_inner.heads.iter().cloned().collect::<Vec<String>>(),
                other_inner.clock.time(),
            )
        };

        let mut inner = self.inner.lock();
        let context = CanAppendContext::new(&other_entries);

        let mut newly_inserted: Vec<Entry> = Vec::new();
        let mut cancelled = false;
        for entry in other_entries {
            if inner.entries.contains(entry.hash()) {
                continue;
            }
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                tracing::warn!(log_id = %self.id, admitted = newly_inserted.len(), "join: cancelled mid-merge");
                cancelled = true;
                break;
            }
            if let Err(e) = entry.verify(self.provider.as_ref()) {
                tracing::warn!(log_id = %self.id, hash = %entry.hash(), error = %e, "join: entry failed verification");
                continue;
            }
            if let Err(e) = self.access_controller.can_append(&entry, self.provider.as_ref(), Some(&context)) {
                tracing::warn!(log_id = %self.id, hash = %entry.hash(), error = %e, "join: entry denied by access controller");
                continue;
            }
            inner.entries.insert(entry.clone());
            newly_inserted.push(entry);
        }

        for entry in &newly_inserted {
            for parent in entry.next() {
                inner.nexts_index.entry(parent.clone()).or_default().insert(entry.hash().to_owned());
            }
        }

        // On cancellation, only fold in what was actually admitted: the
        // peer's advertised heads and clock describe entries beyond what
        // this call verified, so they are left out rather than claimed.
        let mut candidates: IndexSet<String> = inner.heads.iter().cloned().collect();
        if !cancelled {
            candidates.extend(other_heads);
        }
        candidates.extend(newly_inserted.iter().map(|e| e.hash().to_owned()));
        inner.heads = candidates
            .into_iter()
            .filter(|h| inner.entries.contains(h))
            .filter(|h| inner.nexts_index.get(h.as_str()).is_none_or(|s| s.is_empty()))
            .collect();

        if !cancelled {
            inner.clock = LamportClock::new(inner.clock.id().to_vec()).set_time(inner.clock.time().max(other_clock_time));
        }

        let admitted = newly_inserted.len();

        if !cancelled && size_bound >= 0 && inner.entries.len() as i64 > size_bound {
            self.truncate_to(&mut inner, size_bound as usize);
        }

        if cancelled {
            return Err(LogError::Cancelled);
        }

        tracing::debug!(log_id = %self.id, admitted, total = inner.entries.len(), "join completed");

        Ok(admitted)
    }

    /// Keeps only the `bound` most recent entries under the sort order,
    /// dropping orphaned `nexts_index` entries and recomputing `heads`
    /// from what remains.
    fn truncate_to(&self, inner: &mut LogInner, bound: usize) {
        let mut sorted: Vec<Entry> = inner.entries.values().cloned().collect();
        sorted.sort_by(|a, b| (self.sort_fn)(a, b));
        let keep_hashes: HashSet<String> = sorted.into_iter().rev().take(bound).map(|e| e.hash().to_owned()).collect();

        inner.entries = inner.entries.retain_hashes(keep_hashes.iter().map(String::as_str));
        inner.nexts_index.retain(|parent, children| {
            children.retain(|c| keep_hashes.contains(c));
            keep_hashes.contains(parent) && !children.is_empty()
        });
        inner.heads = keep_hashes
            .iter()
            .filter(|h| inner.nexts_index.get(h.as_str()).is_none_or(|s| s.is_empty()))
            .cloned()
            .collect();

        tracing::debug!(log_id = %self.id, retained = inner.entries.len(), "join: size bound truncation applied");
    }

    /// Breadth-first walk of `next` edges from `roots` over the local
    /// entry map. Does not touch the block store: entries not already
    /// present locally are simply absent from the frontier, not fetched.
    pub fn traverse(&self, roots: &[String], amount: Option<usize>) -> Vec<Entry> {
        let inner = self.inner.lock();

        let mut frontier: Vec<&Entry> = roots.iter().filter_map(|h| inner.entries.get(h)).collect();
        frontier.sort_by(|a, b| (self.sort_fn)(a, b));
        frontier.reverse();

        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: std::collections::VecDeque<&Entry> = frontier.into_iter().collect();
        let mut out = Vec::new();

        while let Some(entry) = queue.pop_front() {
            if !visited.insert(entry.hash().to_owned()) {
                continue;
            }
            if let Some(limit) = amount {
                if out.len() >= limit {
                    break;
                }
            }

            let mut children: Vec<&Entry> = entry
                .next()
                .iter()
                .filter_map(|h| inner.entries.get(h))
                .filter(|c| !visited.contains(c.hash()))
                .collect();
            children.sort_by(|a, b| (self.sort_fn)(a, b));
            children.reverse();
            for child in children {
                queue.push_back(child);
            }

            out.push(entry.clone());
        }

        out
    }

    /// Renders the log as a human-readable tree. Named `to_string` (not
    /// `Display::fmt`, which delegates to this with `None`) since it
    /// takes an optional payload formatter argument.
    pub fn to_string(&self, payload_formatter: Option<&dyn Fn(&Entry) -> String>) -> String {
        let inner = self.inner.lock();
        let sorted = inner.entries.sorted(&self.sort_fn, true);
        if sorted.is_empty() {
            return String::new();
        }

        let render = |e: &Entry| payload_formatter.map(|f| f(e)).unwrap_or_else(|| String::from_utf8_lossy(e.payload()).into_owned());

        let mut depth_cache: HashMap<String, usize> = HashMap::new();
        let max_depth = chain_depth(sorted[0].hash(), &inner.entries, &mut depth_cache);

        let mut out = String::new();
        for (i, entry) in sorted.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            if i == 0 {
                out.push_str(&render(entry));
                continue;
            }
            let depth = chain_depth(entry.hash(), &inner.entries, &mut depth_cache);
            let indent = max_depth.saturating_sub(depth).saturating_sub(1) * 2;
            out.push_str(&" ".repeat(indent));
            out.push_str("└─");
            out.push_str(&render(entry));
        }
        out
    }

    /// Serializes `{id, heads}` to the block store and returns its CID.
    pub fn to_multihash(&self) -> Result<Cid> {
        let inner = self.inner.lock();
        let snapshot = LogSnapshot { id: self.id.clone(), heads: inner.heads.iter().cloned().collect() };
        let bytes = serde_ipld_dagcbor::to_vec(&snapshot).map_err(|e| LogError::Encoding(e.to_string()))?;
        self.store.put(&bytes)
    }

    /// Inverse of [`Log::to_multihash`]: reads the snapshot, fetches the
    /// full reachable DAG via [`Fetcher`], and constructs a log from it.
    /// `cancel` is forwarded to both the snapshot read and the fetcher
    /// walk.
    pub fn new_from_multihash(
        store: Arc<S>,
        identity: Identity,
        provider: Arc<P>,
        cid: &Cid,
        options: LogOptions,
        cancel: Option<&CancellationToken>,
    ) -> Result<Log<S, P>> {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(LogError::Cancelled);
        }

        let bytes = store.get(cid)?.ok_or_else(|| LogError::EntryNotFound(cid.to_string()))?;
        let snapshot: LogSnapshot = serde_ipld_dagcbor::from_slice(&bytes).map_err(|e| LogError::Encoding(e.to_string()))?;

        let fetcher = Fetcher::new(store.as_ref());
        let fetched = fetcher.fetch(provider.as_ref(), &snapshot.heads, None, &HashSet::new(), cancel)?;

        let options = options.id(snapshot.id.clone()).entries(fetched).heads(snapshot.heads);
        Log::new(Some(store), Some(identity), provider, options)
    }
}

impl<S: BlockStore, P: IdentityProvider> std::fmt::Display for Log<S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_string(None))
    }
}

impl<S: BlockStore, P: IdentityProvider> std::fmt::Debug for Log<S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Log")
            .field("id", &self.id)
            .field("entries", &inner.entries.len())
            .field("heads", &inner.heads.len())
            .finish()
    }
}

#[cfg(all(test, feature = "test-utils"))]
mod tests {
    use super::*;
    use crate::entry::create_entry;
    use crate::identity::CreateIdentityOptions;
    use crate::store::MemoryBlockStore;
    use crate::test_support::Secp256k1IdentityProvider;

    fn identity_for(provider: &Secp256k1IdentityProvider, id: &str) -> Identity {
        provider.create_identity(&CreateIdentityOptions { id: id.into(), kind: "test".into() }).unwrap()
    }

    fn harness() -> (Arc<MemoryBlockStore>, Arc<Secp256k1IdentityProvider>, Identity) {
        let store = Arc::new(MemoryBlockStore::new());
        let provider = Arc::new(Secp256k1IdentityProvider::new());
        let identity = identity_for(&provider, "userA");
        (store, provider, identity)
    }

    #[test]
    fn missing_store_is_rejected() {
        let (_store, provider, identity) = harness();
        let err = Log::<MemoryBlockStore, _>::new(None, Some(identity), provider, LogOptions::new());
        assert!(matches!(err, Err(LogError::IpfsNotDefined)));
    }

    #[test]
    fn missing_identity_is_rejected() {
        let (store, provider, _identity) = harness();
        let err = Log::new(Some(store), None, provider, LogOptions::new());
        assert!(matches!(err, Err(LogError::IdentityNotDefined)));
    }

    #[test]
    fn id_defaults_to_unix_seconds_over_a_thousand() {
        let (store, provider, identity) = harness();
        let before = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() / 1000;
        let log = Log::new(Some(store), Some(identity), provider, LogOptions::new()).unwrap();
        let after = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() / 1000;
        let parsed: u64 = log.id().parse().unwrap();
        assert!(parsed >= before && parsed <= after);
    }

    #[test]
    fn seeding_preserves_given_order() {
        let (store, provider, identity) = harness();
        let id1 = identity_for(&provider, "userA");
        let id2 = identity_for(&provider, "userB");
        let id3 = identity_for(&provider, "userC");

        let e1 = create_entry(store.as_ref(), &id1, provider.as_ref(), "A", b"entryA", &[], &[], Some(LamportClock::new(id1.public_key().to_vec()).set_time(0))).unwrap();
        let e2 = create_entry(store.as_ref(), &id2, provider.as_ref(), "A", b"entryB", &[], &[], Some(LamportClock::new(id2.public_key().to_vec()).set_time(1))).unwrap();
        let e3 = create_entry(store.as_ref(), &id3, provider.as_ref(), "A", b"entryC", &[], &[], Some(LamportClock::new(id3.public_key().to_vec()).set_time(2))).unwrap();

        let log = Log::new(Some(store), Some(identity), provider, LogOptions::new().id("A").entries(vec![e1, e2, e3])).unwrap();

        let payloads: Vec<Vec<u8>> = log.values().into_iter().map(|e| e.payload().to_vec()).collect();
        assert_eq!(payloads, vec![b"entryA".to_vec(), b"entryB".to_vec(), b"entryC".to_vec()]);
    }

    #[test]
    fn explicit_heads_override_inference() {
        let (store, provider, identity) = harness();
        let e1 = create_entry(store.as_ref(), &identity, provider.as_ref(), "A", b"entryA", &[], &[], None).unwrap();
        let e2 = create_entry(store.as_ref(), &identity, provider.as_ref(), "A", b"entryB", &[], &[], None).unwrap();
        let e3 = create_entry(store.as_ref(), &identity, provider.as_ref(), "A", b"entryC", &[], &[], None).unwrap();
        let e3_hash = e3.hash().to_owned();

        let log = Log::new(
            Some(store),
            Some(identity),
            provider,
            LogOptions::new().id("B").entries(vec![e1, e2, e3]).heads(vec![e3_hash.clone()]),
        )
        .unwrap();

        let heads = log.heads();
        assert_eq!(heads.len(), 1);
        assert_eq!(heads[0].hash(), e3_hash);
    }

    #[test]
    fn heads_are_inferred_when_not_given() {
        let (store, provider, identity) = harness();
        let e1 = create_entry(store.as_ref(), &identity, provider.as_ref(), "A", b"entryA", &[], &[], Some(LamportClock::new(identity.public_key().to_vec()).set_time(0))).unwrap();
        let e2 = create_entry(store.as_ref(), &identity, provider.as_ref(), "A", b"entryB", &[], &[], Some(LamportClock::new(identity.public_key().to_vec()).set_time(1))).unwrap();
        let e3 = create_entry(store.as_ref(), &identity, provider.as_ref(), "A", b"entryC", &[], &[], Some(LamportClock::new(identity.public_key().to_vec()).set_time(2))).unwrap();
        let (h1, h2, h3) = (e1.hash().to_owned(), e2.hash().to_owned(), e3.hash().to_owned());

        let log = Log::new(Some(store), Some(identity), provider, LogOptions::new().id("A").entries(vec![e1, e2, e3])).unwrap();

        let heads: Vec<String> = log.heads().into_iter().map(|e| e.hash().to_owned()).collect();
        assert_eq!(heads.len(), 3);
        assert_eq!(heads, vec![h3, h2, h1]);
    }

    #[test]
    fn default_access_controller_authorizes_anything() {
        let (store, provider, identity) = harness();
        let log = Log::new(Some(store.clone()), Some(identity.clone()), provider.clone(), LogOptions::new()).unwrap();
        let any = create_entry(store.as_ref(), &identity, provider.as_ref(), log.id(), b"any", &[], &[], None).unwrap();
        assert!(log.access_controller.can_append(&any, provider.as_ref(), None).is_ok());
    }

    #[test]
    fn to_string_renders_the_expected_tree() {
        let (store, provider, identity) = harness();
        let log = Log::new(Some(store), Some(identity), provider, LogOptions::new().id("A")).unwrap();
        for payload in ["one", "two", "three", "four", "five"] {
            log.append(payload.as_bytes(), None, None).unwrap();
        }

        let expected = "five\n└─four\n  └─three\n    └─two\n      └─one";
        assert_eq!(log.to_string(None), expected);
    }

    #[test]
    fn append_advances_heads_and_clock() {
        let (store, provider, identity) = harness();
        let log = Log::new(Some(store), Some(identity), provider, LogOptions::new().id("A")).unwrap();

        let e1 = log.append(b"one", None, None).unwrap();
        assert_eq!(log.heads().len(), 1);
        assert_eq!(log.heads()[0].hash(), e1.hash());

        let e2 = log.append(b"two", None, None).unwrap();
        assert_eq!(e2.next(), &[e1.hash().to_owned()]);
        assert!(e2.clock().time() > e1.clock().time());
        assert_eq!(log.heads().len(), 1);
        assert_eq!(log.heads()[0].hash(), e2.hash());
    }

    #[test]
    fn join_is_idempotent() {
        let (store, provider, identity) = harness();
        let log = Log::new(Some(store), Some(identity), provider, LogOptions::new().id("A")).unwrap();
        log.append(b"one", None, None).unwrap();
        log.append(b"two", None, None).unwrap();

        let before: Vec<String> = log.values().into_iter().map(|e| e.hash().to_owned()).collect();
        let admitted = log.join(&log, -1, None).unwrap();
        assert_eq!(admitted, 0);
        let after: Vec<String> = log.values().into_iter().map(|e| e.hash().to_owned()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn join_merges_two_independent_logs() {
        let store = Arc::new(MemoryBlockStore::new());
        let provider = Arc::new(Secp256k1IdentityProvider::new());
        let identity_a = identity_for(&provider, "userA");
        let identity_b = identity_for(&provider, "userB");

        let log_a = Log::new(Some(store.clone()), Some(identity_a), provider.clone(), LogOptions::new().id("A")).unwrap();
        let log_b = Log::new(Some(store.clone()), Some(identity_b), provider.clone(), LogOptions::new().id("A")).unwrap();

        log_a.append(b"a1", None, None).unwrap();
        log_b.append(b"b1", None, None).unwrap();

        let admitted = log_a.join(&log_b, -1, None).unwrap();
        assert_eq!(admitted, 1);
        assert_eq!(log_a.len(), 2);
        assert_eq!(log_a.heads().len(), 2);
    }

    #[test]
    fn append_rejects_a_pre_cancelled_token_without_mutating_the_log() {
        let (store, provider, identity) = harness();
        let log = Log::new(Some(store), Some(identity), provider, LogOptions::new().id("A")).unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let err = log.append(b"one", None, Some(&token));
        assert!(matches!(err, Err(LogError::Cancelled)));
        assert!(log.is_empty());
        assert_eq!(log.heads().len(), 0);
    }

    #[test]
    fn join_stops_early_on_cancellation_but_keeps_already_admitted_entries() {
        let store = Arc::new(MemoryBlockStore::new());
        let provider = Arc::new(Secp256k1IdentityProvider::new());
        let identity_a = identity_for(&provider, "userA");
        let identity_b = identity_for(&provider, "userB");

        let log_a = Log::new(Some(store.clone()), Some(identity_a), provider.clone(), LogOptions::new().id("A")).unwrap();
        let log_b = Log::new(Some(store), Some(identity_b), provider.clone(), LogOptions::new().id("A")).unwrap();
        log_b.append(b"b1", None, None).unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let err = log_a.join(&log_b, -1, Some(&token));
        assert!(matches!(err, Err(LogError::Cancelled)));
        assert!(log_a.is_empty());
    }

    #[test]
    fn join_rejects_mismatched_log_ids() {
        let store = Arc::new(MemoryBlockStore::new());
        let provider = Arc::new(Secp256k1IdentityProvider::new());
        let identity = identity_for(&provider, "userA");

        let log_a = Log::new(Some(store.clone()), Some(identity.clone()), provider.clone(), LogOptions::new().id("A")).unwrap();
        let log_b = Log::new(Some(store), Some(identity), provider, LogOptions::new().id("B")).unwrap();

        let err = log_a.join(&log_b, -1, None);
        assert!(matches!(err, Err(LogError::LogIdMismatch { .. })));
    }

    #[test]
    fn join_applies_size_bound_truncation() {
        let store = Arc::new(MemoryBlockStore::new());
        let provider = Arc::new(Secp256k1IdentityProvider::new());
        let identity = identity_for(&provider, "userA");

        let log_a = Log::new(Some(store.clone()), Some(identity.clone()), provider.clone(), LogOptions::new().id("A")).unwrap();
        for payload in ["one", "two", "three"] {
            log_a.append(payload.as_bytes(), None, None).unwrap();
        }

        let log_b = Log::new(Some(store), Some(identity), provider, LogOptions::new().id("A")).unwrap();
        log_b.join(&log_a, 2, None).unwrap();

        assert_eq!(log_b.len(), 2);
        let payloads: Vec<Vec<u8>> = log_b.values().into_iter().map(|e| e.payload().to_vec()).collect();
        assert_eq!(payloads, vec![b"two".to_vec(), b"three".to_vec()]);
    }

    #[test]
    fn to_multihash_round_trips_through_new_from_multihash() {
        let (store, provider, identity) = harness();
        let log = Log::new(Some(store.clone()), Some(identity.clone()), provider.clone(), LogOptions::new().id("A")).unwrap();
        for payload in ["one", "two", "three"] {
            log.append(payload.as_bytes(), None, None).unwrap();
        }

        let cid = log.to_multihash().unwrap();
        let restored = Log::new_from_multihash(store, identity, provider, &cid, LogOptions::new(), None).unwrap();

        assert_eq!(restored.id(), log.id());
        assert_eq!(restored.len(), log.len());
        assert_eq!(
            restored.values().into_iter().map(|e| e.hash().to_owned()).collect::<Vec<_>>(),
            log.values().into_iter().map(|e| e.hash().to_owned()).collect::<Vec<_>>(),
        );
    }

    #[test]
    fn tails_reports_entries_whose_parent_is_unknown() {
        let (store, provider, identity) = harness();
        let orphan_parent = create_entry(store.as_ref(), &identity, provider.as_ref(), "A", b"missing", &[], &[], None).unwrap();
        let child = create_entry(
            store.as_ref(),
            &identity,
            provider.as_ref(),
            "A",
            b"child",
            &[EntryOrHash::Entry(&orphan_parent)],
            &[],
            None,
        )
        .unwrap();

        let log = Log::new(Some(store), Some(identity), provider, LogOptions::new().id("A").entries(vec![child.clone()])).unwrap();
        let tails = log.tails();
        assert_eq!(tails.len(), 1);
        assert_eq!(tails[0].hash(), child.hash());
    }
}
