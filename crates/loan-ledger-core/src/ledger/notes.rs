//! Claim-note registries.
//!
//! Borrower and lender notes are unique, transferable receipts. The current
//! holder lookup is the sole authorization predicate for repay, claim, and
//! rollover-counterparty actions; loan identity is never coupled to a fixed
//! borrower or lender address.

use std::collections::BTreeMap;

use crate::error::LedgerError;
use crate::types::{AccountId, NoteId};
use crate::LedgerResult;

/// One registry instance per note kind; borrower and lender registries are
/// fully independent.
#[derive(Debug, Clone, Default)]
pub struct NoteRegistry {
    holders: BTreeMap<NoteId, AccountId>,
    next_id: u64,
}

impl NoteRegistry {
    pub fn mint(&mut self, to: AccountId) -> NoteId {
        self.next_id += 1;
        let note = NoteId(self.next_id);
        self.holders.insert(note, to);
        note
    }

    pub fn burn(&mut self, note: NoteId) -> LedgerResult<AccountId> {
        self.holders
            .remove(&note)
            .ok_or(LedgerError::NotNoteHolder {
                caller: AccountId::new("<none>"),
                note,
            })
    }

    pub fn holder(&self, note: NoteId) -> LedgerResult<&AccountId> {
        self.holders.get(&note).ok_or(LedgerError::NotNoteHolder {
            caller: AccountId::new("<none>"),
            note,
        })
    }

    pub fn is_holder(&self, note: NoteId, account: &AccountId) -> bool {
        self.holders.get(&note) == Some(account)
    }

    /// Hand the note to `to`. Only the current holder may transfer it.
    pub fn transfer(&mut self, caller: &AccountId, note: NoteId, to: AccountId) -> LedgerResult<()> {
        if !self.is_holder(note, caller) {
            return Err(LedgerError::NotNoteHolder {
                caller: caller.clone(),
                note,
            });
        }
        self.holders.insert(note, to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mint_transfer_burn() {
        let mut notes = NoteRegistry::default();
        let alice = AccountId::new("alice");
        let bob = AccountId::new("bob");

        let note = notes.mint(alice.clone());
        assert_eq!(notes.holder(note).unwrap(), &alice);

        // Only the holder may transfer.
        let err = notes.transfer(&bob, note, bob.clone()).unwrap_err();
        assert!(matches!(err, LedgerError::NotNoteHolder { .. }));

        notes.transfer(&alice, note, bob.clone()).unwrap();
        assert!(notes.is_holder(note, &bob));

        let last_holder = notes.burn(note).unwrap();
        assert_eq!(last_holder, bob);
        assert!(notes.holder(note).is_err());
    }

    #[test]
    fn test_ids_are_monotonic_per_registry() {
        let mut notes = NoteRegistry::default();
        let a = notes.mint(AccountId::new("x"));
        let b = notes.mint(AccountId::new("y"));
        assert!(b > a);
    }
}
