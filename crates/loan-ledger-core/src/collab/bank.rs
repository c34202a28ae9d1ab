//! In-memory reference implementation of the asset collaborators, used by
//! the test suite and by embedders that want a self-contained ledger.

use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};

use crate::collab::{AssetTransfer, EscrowVault};
use crate::error::LedgerError;
use crate::types::{AccountId, AssetId, CollateralRef, Money};
use crate::LedgerResult;

/// Balances, allowances toward the ledger custody account, and unique-token
/// ownership, all in memory.
#[derive(Debug, Clone)]
pub struct InMemoryBank {
    /// Account holding pulled funds and accrued fees on the ledger's behalf.
    custody: AccountId,
    /// Account standing in for the escrow vault's collateral custody.
    vault: AccountId,
    balances: HashMap<(AssetId, AccountId), Money>,
    allowances: HashMap<(AssetId, AccountId), Money>,
    unique_owners: HashMap<CollateralRef, AccountId>,
    unique_approvals: HashSet<CollateralRef>,
}

impl InMemoryBank {
    pub fn new(custody: impl Into<AccountId>, vault: impl Into<AccountId>) -> Self {
        InMemoryBank {
            custody: custody.into(),
            vault: vault.into(),
            balances: HashMap::new(),
            allowances: HashMap::new(),
            unique_owners: HashMap::new(),
            unique_approvals: HashSet::new(),
        }
    }

    pub fn custody(&self) -> &AccountId {
        &self.custody
    }

    pub fn vault(&self) -> &AccountId {
        &self.vault
    }

    pub fn mint(&mut self, asset: &AssetId, account: &AccountId, amount: Money) {
        *self
            .balances
            .entry((asset.clone(), account.clone()))
            .or_default() += amount;
    }

    /// Grant the ledger custody an allowance to pull `amount` from `owner`.
    pub fn approve(&mut self, asset: &AssetId, owner: &AccountId, amount: Money) {
        self.allowances
            .insert((asset.clone(), owner.clone()), amount);
    }

    pub fn mint_unique(&mut self, collateral: &CollateralRef, owner: &AccountId) {
        self.unique_owners.insert(collateral.clone(), owner.clone());
    }

    /// Pre-approve the escrow deposit of `collateral` by its current owner.
    pub fn approve_unique(&mut self, collateral: &CollateralRef) {
        self.unique_approvals.insert(collateral.clone());
    }

    pub fn balance_of(&self, asset: &AssetId, account: &AccountId) -> Money {
        self.balances
            .get(&(asset.clone(), account.clone()))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn allowance_of(&self, asset: &AssetId, owner: &AccountId) -> Money {
        self.allowances
            .get(&(asset.clone(), owner.clone()))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn owner_of(&self, collateral: &CollateralRef) -> Option<&AccountId> {
        self.unique_owners.get(collateral)
    }

    fn move_funds(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        to: &AccountId,
        amount: Money,
    ) -> LedgerResult<()> {
        let balance = self.balance_of(asset, from);
        if balance < amount {
            return Err(LedgerError::TransferFailed {
                reason: format!("{from} holds {balance} {asset}, needs {amount}"),
            });
        }
        *self
            .balances
            .entry((asset.clone(), from.clone()))
            .or_default() -= amount;
        *self
            .balances
            .entry((asset.clone(), to.clone()))
            .or_default() += amount;
        Ok(())
    }
}

impl AssetTransfer for InMemoryBank {
    fn transfer_in(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        amount: Money,
    ) -> LedgerResult<()> {
        // Custody moving its own funds back (unwind path) needs no allowance.
        if *from != self.custody {
            let allowance = self.allowance_of(asset, from);
            if allowance < amount {
                return Err(LedgerError::TransferFailed {
                    reason: format!(
                        "allowance of {allowance} {asset} from {from} is below {amount}"
                    ),
                });
            }
            self.allowances
                .insert((asset.clone(), from.clone()), allowance - amount);
        }
        let custody = self.custody.clone();
        self.move_funds(asset, from, &custody, amount)
    }

    fn transfer_out(&mut self, asset: &AssetId, to: &AccountId, amount: Money) -> LedgerResult<()> {
        let custody = self.custody.clone();
        self.move_funds(asset, &custody, to, amount)
    }

    fn move_unique(
        &mut self,
        collateral: &CollateralRef,
        from: &AccountId,
        to: &AccountId,
    ) -> LedgerResult<()> {
        match self.unique_owners.get(collateral) {
            Some(owner) if owner == from => {}
            Some(owner) => {
                return Err(LedgerError::TransferFailed {
                    reason: format!("{collateral} is owned by {owner}, not {from}"),
                })
            }
            None => {
                return Err(LedgerError::TransferFailed {
                    reason: format!("{collateral} does not exist"),
                })
            }
        }
        if *from != self.vault && *from != self.custody && !self.unique_approvals.contains(collateral)
        {
            return Err(LedgerError::TransferFailed {
                reason: format!("{collateral} is not approved for escrow"),
            });
        }
        self.unique_approvals.remove(collateral);
        self.unique_owners.insert(collateral.clone(), to.clone());
        Ok(())
    }
}

impl EscrowVault for InMemoryBank {
    fn deposit(&mut self, collateral: &CollateralRef, from: &AccountId) -> LedgerResult<()> {
        let vault = self.vault.clone();
        self.move_unique(collateral, from, &vault)
    }

    fn release(&mut self, collateral: &CollateralRef, to: &AccountId) -> LedgerResult<()> {
        let vault = self.vault.clone();
        self.move_unique(collateral, &vault, to)
    }
}
