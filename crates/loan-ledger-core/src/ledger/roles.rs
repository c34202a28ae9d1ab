//! Capability checks gating every mutating ledger operation.
//!
//! Roles are a set-valued mapping from identity to capability, consulted at
//! the top of each operation; there is no inheritance between capabilities.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::LedgerError;
use crate::types::AccountId;
use crate::LedgerResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// May create and start loans, and consume nonces while validating
    /// signed instructions.
    Originator,
    /// May submit repayments and post-expiry claims.
    Repayer,
    /// May withdraw the ledger's accumulated fee balances.
    FeeClaimer,
    /// May grant/revoke capabilities and adjust the fee policy.
    Admin,
}

#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    grants: HashMap<AccountId, HashSet<Capability>>,
}

impl Capabilities {
    pub fn grant(&mut self, account: AccountId, capability: Capability) {
        self.grants.entry(account).or_default().insert(capability);
    }

    pub fn revoke(&mut self, account: &AccountId, capability: Capability) {
        if let Some(set) = self.grants.get_mut(account) {
            set.remove(&capability);
        }
    }

    pub fn has(&self, account: &AccountId, capability: Capability) -> bool {
        self.grants
            .get(account)
            .is_some_and(|set| set.contains(&capability))
    }

    pub fn require(&self, caller: &AccountId, capability: Capability) -> LedgerResult<()> {
        if self.has(caller, capability) {
            Ok(())
        } else {
            Err(LedgerError::MissingCapability {
                caller: caller.clone(),
                capability,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_revoke() {
        let mut caps = Capabilities::default();
        let alice = AccountId::new("alice");

        assert!(caps.require(&alice, Capability::Repayer).is_err());

        caps.grant(alice.clone(), Capability::Repayer);
        caps.grant(alice.clone(), Capability::FeeClaimer);
        assert!(caps.require(&alice, Capability::Repayer).is_ok());
        assert!(caps.has(&alice, Capability::FeeClaimer));
        // No inheritance between capabilities.
        assert!(!caps.has(&alice, Capability::Admin));

        caps.revoke(&alice, Capability::Repayer);
        let err = caps.require(&alice, Capability::Repayer).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::MissingCapability {
                capability: Capability::Repayer,
                ..
            }
        ));
    }
}
