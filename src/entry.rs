//! The content-addressed, signed entry format.
//!
//! An [`Entry`] is constructed once and never mutated. Its `hash` is not a
//! field chosen by the writer — it falls out of canonically encoding every
//! other field and hashing the result, which is what makes two entries
//! with identical content indistinguishable no matter which replica
//! produced them.

use crate::clock::LamportClock;
use crate::error::{LogError, Result};
use crate::identity::{Identity, IdentityProvider};
use crate::store::{content_hash, BlockStore};
use serde::{Deserialize, Serialize};

/// Format version. Bumped when the wire schema changes; current entries
/// are always this version.
pub const ENTRY_VERSION: u64 = 1;

/// A parent reference supplied to [`create_entry`]: either an already
/// materialized entry (so its clock can inform the new entry's clock) or
/// a bare hash (e.g. when only the hash is known, as during replication).
#[derive(Clone, Debug)]
pub enum EntryOrHash<'a> {
    Entry(&'a Entry),
    Hash(String),
}

impl<'a> EntryOrHash<'a> {
    pub fn hash(&self) -> String {
        match self {
            EntryOrHash::Entry(e) => e.hash().to_owned(),
            EntryOrHash::Hash(h) => h.clone(),
        }
    }

    fn clock_time(&self) -> Option<u64> {
        match self {
            EntryOrHash::Entry(e) => Some(e.clock().time()),
            EntryOrHash::Hash(_) => None,
        }
    }
}

impl<'a> From<&'a Entry> for EntryOrHash<'a> {
    fn from(e: &'a Entry) -> Self {
        EntryOrHash::Entry(e)
    }
}

/// Canonical on-the-wire shape of an entry. `sig` and `hash` are `None`
/// while the respective encoding step they are excluded from is being
/// produced.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct Wire {
    v: u64,
    id: String,
    #[serde(with = "serde_bytes")]
    payload: Vec<u8>,
    next: Vec<String>,
    refs: Vec<String>,
    clock: LamportClock,
    #[serde(with = "serde_bytes")]
    key: Vec<u8>,
    identity: Identity,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(with = "serde_bytes_opt")]
    #[serde(default)]
    sig: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    hash: Option<String>,
}

/// `serde_bytes` only knows how to handle `Vec<u8>` / `&[u8]` directly;
/// this adapts it to `Option<Vec<u8>>` so `sig` can be cleared during
/// hashing/signing without changing its wire representation when present.
mod serde_bytes_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<Vec<u8>>, s: S) -> std::result::Result<S::Ok, S::Error> {
        match v {
            Some(bytes) => serde_bytes::serialize(bytes, s),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<Vec<u8>>, D::Error> {
        let bytes: Option<serde_bytes::ByteBuf> = Option::deserialize(d)?;
        Ok(bytes.map(|b| b.into_vec()))
    }
}

/// An immutable, signed, content-addressed record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Entry {
    log_id: String,
    payload: Vec<u8>,
    next: Vec<String>,
    refs: Vec<String>,
    clock: LamportClock,
    v: u64,
    identity: Identity,
    sig: Vec<u8>,
    hash: String,
}

impl Entry {
    pub fn log_id(&self) -> &str {
        &self.log_id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn next(&self) -> &[String] {
        &self.next
    }

    pub fn refs(&self) -> &[String] {
        &self.refs
    }

    pub fn clock(&self) -> &LamportClock {
        &self.clock
    }

    pub fn v(&self) -> u64 {
        self.v
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn sig(&self) -> &[u8] {
        &self.sig
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    fn wire(&self, include_sig: bool) -> Wire {
        Wire {
            v: self.v,
            id: self.log_id.clone(),
            payload: self.payload.clone(),
            next: self.next.clone(),
            refs: self.refs.clone(),
            clock: self.clock.clone(),
            key: self.identity.public_key().to_vec(),
            identity: self.identity.clone(),
            sig: if include_sig { Some(self.sig.clone()) } else { None },
            hash: None,
        }
    }

    /// Re-encodes this entry with `sig` present and `hash` cleared, i.e.
    /// the bytes its `hash` should have been computed over.
    fn encoding_for_hash(&self) -> Result<Vec<u8>> {
        serde_ipld_dagcbor::to_vec(&self.wire(true)).map_err(|e| LogError::Encoding(e.to_string()))
    }

    /// Re-encodes this entry with both `sig` and `hash` cleared, i.e. the
    /// bytes its `sig` should have been computed over.
    fn encoding_for_sign(&self) -> Result<Vec<u8>> {
        serde_ipld_dagcbor::to_vec(&self.wire(false)).map_err(|e| LogError::Encoding(e.to_string()))
    }

    /// Recomputes this entry's content hash and checks it against the
    /// `hash` field, then verifies `sig` against `identity.public_key()`.
    /// Both checks must pass for the entry to be admissible (section 4.2,
    /// invariants 1-2 in section 3).
    pub fn verify<P: IdentityProvider>(&self, provider: &P) -> Result<()> {
        let hash_bytes = self.encoding_for_hash()?;
        let expected = content_hash(&hash_bytes).to_string();
        if expected != self.hash {
            tracing::warn!(entry_hash = %self.hash, expected = %expected, "entry hash mismatch");
            return Err(LogError::HashMismatch);
        }

        let sign_bytes = self.encoding_for_sign()?;
        provider.verify(&self.identity, &sign_bytes, &self.sig).map_err(|e| {
            tracing::warn!(entry_hash = %self.hash, "entry signature failed to verify");
            match e {
                LogError::SignatureInvalid => LogError::SignatureInvalid,
                other => other,
            }
        })
    }
}

/// Constructs, signs, hashes, and persists a new entry (section 4.2).
///
/// `clock` is computed automatically from `next` when absent: one tick
/// past the greatest clock time among the supplied parents that are
/// materialized entries (parents supplied only as a bare hash cannot
/// contribute a clock reading and are treated as contributing zero).
#[allow(clippy::too_many_arguments)]
pub fn create_entry<S: BlockStore, P: IdentityProvider>(
    store: &S,
    identity: &Identity,
    provider: &P,
    log_id: &str,
    payload: &[u8],
    next: &[EntryOrHash<'_>],
    refs: &[EntryOrHash<'_>],
    clock: Option<LamportClock>,
) -> Result<Entry> {
    let next_hashes: Vec<String> = next.iter().map(EntryOrHash::hash).collect();
    let ref_hashes: Vec<String> = refs.iter().map(EntryOrHash::hash).collect();

    let clock = clock.unwrap_or_else(|| {
        let max_next_time = next.iter().filter_map(EntryOrHash::clock_time).max().unwrap_or(0);
        LamportClock::new(identity.public_key().to_vec()).set_time(max_next_time + 1)
    });

    let mut entry = Entry {
        log_id: log_id.to_owned(),
        payload: payload.to_vec(),
        next: next_hashes,
        refs: ref_hashes,
        clock,
        v: ENTRY_VERSION,
        identity: identity.clone(),
        sig: Vec::new(),
        hash: String::new(),
    };

    let sign_bytes = entry.encoding_for_sign()?;
    entry.sig = provider.sign(identity, &sign_bytes)?;

    let hash_bytes = entry.encoding_for_hash()?;
    let cid = store.put(&hash_bytes)?;
    entry.hash = cid.to_string();

    tracing::debug!(hash = %entry.hash, log_id, clock_time = entry.clock.time(), "entry created");

    Ok(entry)
}

/// Decodes the bytes persisted under `hash` (the §6.1 hashing encoding,
/// `hash = null`) back into a materialized [`Entry`]. The block store key
/// the bytes were fetched under stands in for the `hash` field the wire
/// encoding omits.
pub fn decode_entry(bytes: &[u8], hash: &str) -> Result<Entry> {
    let wire: Wire = serde_ipld_dagcbor::from_slice(bytes).map_err(|e| LogError::Encoding(e.to_string()))?;
    Ok(Entry {
        log_id: wire.id,
        payload: wire.payload,
        next: wire.next,
        refs: wire.refs,
        clock: wire.clock,
        v: wire.v,
        identity: wire.identity,
        sig: wire.sig.unwrap_or_default(),
        hash: hash.to_owned(),
    })
}

/// Test-only constructor that bypasses signing and hashing entirely, for
/// exercising the ordered map and sort order in isolation from identity
/// and block-store machinery.
#[cfg(test)]
pub(crate) fn entry_for_test(
    hash: &str,
    log_id: &str,
    payload: Vec<u8>,
    next: Vec<String>,
    refs: Vec<String>,
    clock: LamportClock,
    identity: Identity,
) -> Entry {
    Entry {
        log_id: log_id.to_owned(),
        payload,
        next,
        refs,
        clock,
        v: ENTRY_VERSION,
        identity,
        sig: Vec::new(),
        hash: hash.to_owned(),
    }
}
