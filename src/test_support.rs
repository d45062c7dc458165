//! Reference `IdentityProvider` used by this crate's own tests. Not a
//! production keystore: it keeps every secret key it mints in a
//! process-local map for the remainder of the run. Real callers implement
//! [`crate::identity::IdentityProvider`] against whatever keystore backs
//! their deployment.

use crate::error::{LogError, Result};
use crate::identity::{CreateIdentityOptions, Identity, IdentityProvider, Signatures};
use parking_lot::Mutex;
use rand::rngs::OsRng;
use secp256k1::ecdsa::Signature as EcdsaSignature;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// secp256k1 ECDSA over a SHA-256 digest.
pub struct Secp256k1IdentityProvider {
    secp: Secp256k1<secp256k1::All>,
    keys: Mutex<HashMap<Vec<u8>, SecretKey>>,
}

impl Secp256k1IdentityProvider {
    pub fn new() -> Secp256k1IdentityProvider {
        Secp256k1IdentityProvider {
            secp: Secp256k1::new(),
            keys: Mutex::new(HashMap::new()),
        }
    }

    fn digest(bytes: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hasher.finalize().into()
    }

    fn secret_for(&self, public_key: &[u8]) -> Result<SecretKey> {
        self.keys
            .lock()
            .get(public_key)
            .cloned()
            .ok_or_else(|| LogError::Identity(format!("no secret key held for public key {}", hex::encode(public_key))))
    }
}

impl Default for Secp256k1IdentityProvider {
    fn default() -> Secp256k1IdentityProvider {
        Secp256k1IdentityProvider::new()
    }
}

impl IdentityProvider for Secp256k1IdentityProvider {
    fn sign(&self, identity: &Identity, bytes: &[u8]) -> Result<Vec<u8>> {
        let secret = self.secret_for(identity.public_key())?;
        let message = Message::from_slice(&Self::digest(bytes)).map_err(|e| LogError::Identity(e.to_string()))?;
        Ok(self.secp.sign_ecdsa(&message, &secret).serialize_compact().to_vec())
    }

    fn verify(&self, identity: &Identity, bytes: &[u8], signature: &[u8]) -> Result<()> {
        let public_key = PublicKey::from_slice(identity.public_key()).map_err(|_| LogError::SignatureInvalid)?;
        let message = Message::from_slice(&Self::digest(bytes)).map_err(|_| LogError::SignatureInvalid)?;
        let sig = EcdsaSignature::from_compact(signature).map_err(|_| LogError::SignatureInvalid)?;
        self.secp
            .verify_ecdsa(&message, &sig, &public_key)
            .map_err(|_| LogError::SignatureInvalid)
    }

    /// Mints a fresh keypair and a pair of proof signatures linking the
    /// public key to `options.id`: `signatures.id` over the external id
    /// alone, `signatures.public_key` over `id || public_key`.
    fn create_identity(&self, options: &CreateIdentityOptions) -> Result<Identity> {
        let secret = SecretKey::new(&mut OsRng);
        let public = PublicKey::from_secret_key(&self.secp, &secret);
        let public_bytes = public.serialize().to_vec();

        let id_signature = {
            let message = Message::from_slice(&Self::digest(options.id.as_bytes())).map_err(|e| LogError::Identity(e.to_string()))?;
            self.secp.sign_ecdsa(&message, &secret).serialize_compact().to_vec()
        };
        let public_key_signature = {
            let mut linked = options.id.clone().into_bytes();
            linked.extend_from_slice(&public_bytes);
            let message = Message::from_slice(&Self::digest(&linked)).map_err(|e| LogError::Identity(e.to_string()))?;
            self.secp.sign_ecdsa(&message, &secret).serialize_compact().to_vec()
        };

        self.keys.lock().insert(public_bytes.clone(), secret);

        Ok(Identity::new(
            options.id.clone(),
            public_bytes,
            Signatures::new(id_signature, public_key_signature),
            options.kind.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_identity_signs_and_verifies() {
        let provider = Secp256k1IdentityProvider::new();
        let identity = provider
            .create_identity(&CreateIdentityOptions { id: "userA".into(), kind: "test".into() })
            .unwrap();
        let sig = provider.sign(&identity, b"hello").unwrap();
        assert!(provider.verify(&identity, b"hello", &sig).is_ok());
    }

    #[test]
    fn verify_rejects_a_signature_over_different_bytes() {
        let provider = Secp256k1IdentityProvider::new();
        let identity = provider
            .create_identity(&CreateIdentityOptions { id: "userA".into(), kind: "test".into() })
            .unwrap();
        let sig = provider.sign(&identity, b"hello").unwrap();
        assert!(provider.verify(&identity, b"goodbye", &sig).is_err());
    }

    #[test]
    fn distinct_identities_get_distinct_keys() {
        let provider = Secp256k1IdentityProvider::new();
        let a = provider.create_identity(&CreateIdentityOptions { id: "userA".into(), kind: "test".into() }).unwrap();
        let b = provider.create_identity(&CreateIdentityOptions { id: "userB".into(), kind: "test".into() }).unwrap();
        assert_ne!(a.public_key(), b.public_key());
    }
}
