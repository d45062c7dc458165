//! Pluggable append authorization.
//!
//! The log never hardcodes a notion of "who may write" beyond the default
//! permissive policy; real deployments plug in a capability that consults
//! whatever authority they trust (a contract, a static allow-list, a
//! quorum of existing writers). `CanAppendContext` lets policies that need
//! to reason about entries arriving in the same batch (e.g. "is this
//! writer already represented among the entries being joined right now")
//! see that batch, not just the one entry under review.

use crate::entry::Entry;
use crate::error::Result;
use crate::identity::IdentityProvider;

/// The batch an entry is being admitted alongside, exposed to policies
/// that need co-arrival information `append` alone cannot provide (e.g. a
/// join admitting many entries from a peer in one call).
pub struct CanAppendContext<'a> {
    log_entries: &'a [Entry],
}

impl<'a> CanAppendContext<'a> {
    pub fn new(log_entries: &'a [Entry]) -> CanAppendContext<'a> {
        CanAppendContext { log_entries }
    }

    pub fn log_entries(&self) -> &[Entry] {
        self.log_entries
    }
}

/// The append-authorization capability. Takes `&dyn IdentityProvider`
/// rather than a type parameter so a `Log` can hold one trait object
/// regardless of which concrete identity provider it was built with.
pub trait AccessController: Send + Sync {
    fn can_append(&self, entry: &Entry, provider: &dyn IdentityProvider, context: Option<&CanAppendContext<'_>>) -> Result<()>;
}

/// The default policy: authorizes any writer. Does not consult `provider`
/// or `context` at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct PermissiveAccessController;

impl AccessController for PermissiveAccessController {
    fn can_append(&self, _entry: &Entry, _provider: &dyn IdentityProvider, _context: Option<&CanAppendContext<'_>>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::LamportClock;
    use crate::entry::entry_for_test;
    use crate::identity::{CreateIdentityOptions, Identity, Signatures};
    use crate::error::LogError;

    struct DenyAll;
    impl AccessController for DenyAll {
        fn can_append(&self, _entry: &Entry, _provider: &dyn IdentityProvider, _context: Option<&CanAppendContext<'_>>) -> Result<()> {
            Err(LogError::AppendDenied("nobody may write".into()))
        }
    }

    struct NoopProvider;
    impl IdentityProvider for NoopProvider {
        fn sign(&self, _identity: &Identity, _bytes: &[u8]) -> Result<Vec<u8>> {
            unimplemented!()
        }
        fn verify(&self, _identity: &Identity, _bytes: &[u8], _signature: &[u8]) -> Result<()> {
            unimplemented!()
        }
        fn create_identity(&self, _options: &CreateIdentityOptions) -> Result<Identity> {
            unimplemented!()
        }
    }

    fn entry() -> Entry {
        let identity = Identity::new("u", vec![1], Signatures::new(vec![], vec![]), "test");
        entry_for_test("h", "log", b"x".to_vec(), vec![], vec![], LamportClock::new("u").set_time(1), identity)
    }

    #[test]
    fn default_policy_authorizes_any_writer() {
        let acl = PermissiveAccessController;
        assert!(acl.can_append(&entry(), &NoopProvider, None).is_ok());
    }

    #[test]
    fn a_denying_policy_rejects() {
        let acl = DenyAll;
        assert!(acl.can_append(&entry(), &NoopProvider, None).is_err());
    }

    #[test]
    fn context_exposes_the_co_arriving_batch() {
        let batch = vec![entry(), entry()];
        let ctx = CanAppendContext::new(&batch);
        assert_eq!(ctx.log_entries().len(), 2);
    }
}
