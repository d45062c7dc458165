//! The crate's single error type.
//!
//! Every fallible public operation resolves to a [`LogError`] variant named
//! after the stable, language-neutral error identities the log exposes
//! across its bindings (`ERR_IPFS_NOT_DEFINED` and friends). Nothing in the
//! public surface returns a bare `String` or a boxed `dyn Error`.

use thiserror::Error;

/// Errors produced by log construction, append, join, and traversal.
#[derive(Debug, Error)]
pub enum LogError {
    /// `new_log` was called without a block store.
    #[error("ERR_IPFS_NOT_DEFINED: ipfs instance not defined")]
    IpfsNotDefined,

    /// `new_log` was called without an identity.
    #[error("ERR_IDENTITY_NOT_DEFINED: identity not defined")]
    IdentityNotDefined,

    /// `join` was attempted between logs with different `id`s.
    #[error("ERR_LOG_ID_MISMATCH: log ids must be the same, '{ours}' != '{theirs}'")]
    LogIdMismatch { ours: String, theirs: String },

    /// A referenced entry hash could not be resolved, locally or via the fetcher.
    #[error("ERR_ENTRY_NOT_FOUND: could not find entry '{0}'")]
    EntryNotFound(String),

    /// An entry's signature did not verify against its claimed identity.
    #[error("ERR_SIGNATURE_INVALID: entry signature is invalid")]
    SignatureInvalid,

    /// An entry's declared hash did not match the recomputed content hash.
    #[error("ERR_HASH_MISMATCH: entry hash does not match its content")]
    HashMismatch,

    /// The access controller rejected an append.
    #[error("ERR_APPEND_DENIED: {0}")]
    AppendDenied(String),

    /// The underlying block store failed to read or write a block.
    #[error("block store error: {0}")]
    Store(String),

    /// A signing or verification primitive failed outside of a plain
    /// signature mismatch (e.g. malformed key material).
    #[error("identity provider error: {0}")]
    Identity(String),

    /// Canonical encoding of an entry failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The caller-supplied cancellation token fired before the operation
    /// completed. No log state was mutated.
    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, LogError>;
