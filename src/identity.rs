//! Identity materialization and the signing/verification capability contract.
//!
//! An [`Identity`] bundles a public key with a proof linking it to an
//! external id (`signatures`); the log never inspects how that proof was
//! produced, only that an [`IdentityProvider`] will vouch for it. Concrete
//! signing lives behind the trait so the log core stays agnostic of any
//! particular curve or keystore.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// The pair of signatures binding an external id to a public key:
/// `id` signs the external id string, `public_key` signs `id || public_key`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Signatures {
    id: Vec<u8>,
    public_key: Vec<u8>,
}

impl Signatures {
    pub fn new(id: impl Into<Vec<u8>>, public_key: impl Into<Vec<u8>>) -> Signatures {
        Signatures {
            id: id.into(),
            public_key: public_key.into(),
        }
    }

    pub fn id(&self) -> &[u8] {
        &self.id
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }
}

/// A writer's materialized identity: a public key plus a proof linking it
/// to an external id and provider type.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    id: String,
    public_key: Vec<u8>,
    signatures: Signatures,
    #[serde(rename = "type")]
    kind: String,
}

impl Identity {
    pub fn new(
        id: impl Into<String>,
        public_key: impl Into<Vec<u8>>,
        signatures: Signatures,
        kind: impl Into<String>,
    ) -> Identity {
        Identity {
            id: id.into(),
            public_key: public_key.into(),
            signatures,
            kind: kind.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    pub fn signatures(&self) -> &Signatures {
        &self.signatures
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }
}

impl Ord for Identity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl PartialOrd for Identity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Options accepted by [`IdentityProvider::create_identity`].
#[derive(Clone, Debug, Default)]
pub struct CreateIdentityOptions {
    pub id: String,
    pub kind: String,
}

/// The sign/verify/materialize capability a log's writer identity is
/// backed by. Implementations own key material; the log only ever holds
/// the materialized [`Identity`] and calls through this trait to sign new
/// entries or verify entries it did not write.
pub trait IdentityProvider {
    /// Signs `bytes` (the canonical encoding of an entry with `sig` and
    /// `hash` cleared) on behalf of `identity`.
    fn sign(&self, identity: &Identity, bytes: &[u8]) -> Result<Vec<u8>>;

    /// Verifies that `signature` over `bytes` was produced by the holder
    /// of `identity.public_key()`.
    fn verify(&self, identity: &Identity, bytes: &[u8], signature: &[u8]) -> Result<()>;

    /// Materializes a fresh identity per `options`.
    fn create_identity(&self, options: &CreateIdentityOptions) -> Result<Identity>;
}
