//! The content-addressed block store: an external collaborator.
//!
//! The log core never interprets block bytes beyond encoding and decoding
//! entries through [`crate::entry`]; it only needs something that can put
//! an opaque blob and get it back by the hash it was given. Production
//! callers plug in a real IPFS client or any other content-addressed
//! store; [`MemoryBlockStore`] (behind `test-utils`) exists so this
//! crate's own tests have something to run against.

use crate::error::{LogError, Result};
use cid::Cid;
use multihash_codetable::{Code, MultihashDigest};

/// Multicodec code for `dag-cbor`, used for every hash this crate mints.
const DAG_CBOR: u64 = 0x71;

/// Computes the content hash implementations of [`BlockStore::put`] must
/// agree on: a dag-cbor CIDv1 wrapping a SHA-256 multihash of `bytes`.
/// Exposed so callers (notably `Entry::verify`) can recompute a hash
/// without touching a store.
pub fn content_hash(bytes: &[u8]) -> Cid {
    let digest = Code::Sha2_256.digest(bytes);
    Cid::new_v1(DAG_CBOR, digest)
}

/// The essential put/get shape a content-addressed store needs. `put`
/// must key the block under
/// [`content_hash`] of `bytes` so that the CID it returns is exactly the
/// one a peer would compute for the same bytes.
pub trait BlockStore {
    fn put(&self, bytes: &[u8]) -> Result<Cid>;
    fn get(&self, cid: &Cid) -> Result<Option<Vec<u8>>>;
}

#[cfg(feature = "test-utils")]
mod memory {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// A minimal, process-local, content-addressed store. Not durable,
    /// not shared across processes: a stand-in for a real IPFS client in
    /// this crate's own tests.
    #[derive(Default)]
    pub struct MemoryBlockStore {
        blocks: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl MemoryBlockStore {
        pub fn new() -> MemoryBlockStore {
            MemoryBlockStore {
                blocks: Mutex::new(HashMap::new()),
            }
        }

        pub fn len(&self) -> usize {
            self.blocks.lock().len()
        }

        pub fn is_empty(&self) -> bool {
            self.blocks.lock().is_empty()
        }
    }

    impl BlockStore for MemoryBlockStore {
        fn put(&self, bytes: &[u8]) -> Result<Cid> {
            let cid = content_hash(bytes);
            self.blocks.lock().insert(cid.to_string(), bytes.to_vec());
            Ok(cid)
        }

        fn get(&self, cid: &Cid) -> Result<Option<Vec<u8>>> {
            Ok(self.blocks.lock().get(&cid.to_string()).cloned())
        }
    }

    impl std::fmt::Debug for MemoryBlockStore {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("MemoryBlockStore").field("len", &self.len()).finish()
        }
    }
}

#[cfg(feature = "test-utils")]
pub use memory::MemoryBlockStore;
