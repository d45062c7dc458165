//! An append-only, immutable, cryptographically-signed, content-addressed
//! operation log designed for distributed, peer-to-peer replication
//! without central coordination.
//!
//! Replicas converge through [`log::Log::join`], which is commutative,
//! associative, and idempotent on the unbounded path, making the log a
//! CRDT over a partially-ordered event set. The block store, keystore,
//! and identity provider are external collaborators expressed as traits
//! ([`store::BlockStore`], [`identity::IdentityProvider`]); this crate
//! owns the entry format, the causal-ordering machinery, and the
//! append/join/traversal engine.

pub mod access_controller;
pub mod cancellation;
pub mod clock;
pub mod entry;
pub mod error;
pub mod fetcher;
pub mod identity;
pub mod log;
pub mod log_options;
pub mod ordered_map;
pub mod sorting;
pub mod store;

#[cfg(feature = "test-utils")]
pub mod test_support;

pub use access_controller::{AccessController, CanAppendContext, PermissiveAccessController};
pub use cancellation::CancellationToken;
pub use clock::LamportClock;
pub use entry::{create_entry, decode_entry, Entry, EntryOrHash, ENTRY_VERSION};
pub use error::{LogError, Result};
pub use fetcher::Fetcher;
pub use identity::{CreateIdentityOptions, Identity, IdentityProvider, Signatures};
pub use log::Log;
pub use log_options::LogOptions;
pub use ordered_map::OrderedEntryMap;
pub use sorting::{last_write_wins, last_write_wins_fn, SortFn};
pub use store::{content_hash, BlockStore};

#[cfg(feature = "test-utils")]
pub use store::MemoryBlockStore;
#[cfg(feature = "test-utils")]
pub use test_support::Secp256k1IdentityProvider;
