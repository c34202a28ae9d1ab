//! Collaborator seams: asset transfer, escrow custody, and signed-message
//! verification. The ledger core calls these as black boxes and never looks
//! inside them.

pub mod bank;
pub mod verify;

pub use bank::InMemoryBank;
pub use verify::{MemoryVerifier, RolloverAuthorization, PROTOCOL_VERSION};

use crate::types::{AccountId, AssetId, CollateralRef, Money};
use crate::LedgerResult;

/// Fungible and unique asset movement. `transfer_in` pulls toward the
/// ledger's custody, `transfer_out` pays out of it. Implementations must
/// fail loudly on insufficient balance or allowance, never truncate.
pub trait AssetTransfer {
    fn transfer_in(&mut self, asset: &AssetId, from: &AccountId, amount: Money)
        -> LedgerResult<()>;

    fn transfer_out(&mut self, asset: &AssetId, to: &AccountId, amount: Money)
        -> LedgerResult<()>;

    fn move_unique(
        &mut self,
        collateral: &CollateralRef,
        from: &AccountId,
        to: &AccountId,
    ) -> LedgerResult<()>;
}

/// Opaque holder of collateral tokens. Deposit requires the owner's
/// pre-approval; release hands the token to whoever the ledger names.
/// The vault's delegated-call allow-list lives outside the core; the core
/// only answers `LoanLedger::can_call_on`.
pub trait EscrowVault {
    fn deposit(&mut self, collateral: &CollateralRef, from: &AccountId) -> LedgerResult<()>;

    fn release(&mut self, collateral: &CollateralRef, to: &AccountId) -> LedgerResult<()>;
}

/// Boolean oracle over a typed, structured authorization message. The
/// ledger checks deadlines and nonces itself; the verifier only attests
/// that `claimed_signer` signed this exact message.
pub trait AuthorizationVerifier {
    fn verify(&self, message: &RolloverAuthorization, claimed_signer: &AccountId) -> bool;
}

enum Step {
    In {
        asset: AssetId,
        from: AccountId,
        amount: Money,
    },
    Out {
        asset: AssetId,
        to: AccountId,
        amount: Money,
    },
    Deposit {
        collateral: CollateralRef,
        from: AccountId,
    },
    Release {
        collateral: CollateralRef,
        to: AccountId,
    },
}

/// Compensation journal for multi-transfer operations.
///
/// Each step is executed immediately and recorded; the first failure
/// unwinds every completed step in reverse order and surfaces the original
/// error, so a failed operation leaves no partial transfers behind. Unwind
/// itself is best-effort: the collaborator moved the assets once, so the
/// reverse movements are expected to succeed.
pub struct TransferBatch<'a, B: AssetTransfer + EscrowVault> {
    bank: &'a mut B,
    journal: Vec<Step>,
}

impl<'a, B: AssetTransfer + EscrowVault> TransferBatch<'a, B> {
    pub fn new(bank: &'a mut B) -> Self {
        TransferBatch {
            bank,
            journal: Vec::new(),
        }
    }

    pub fn transfer_in(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        amount: Money,
    ) -> LedgerResult<()> {
        if amount.is_zero() {
            return Ok(());
        }
        match self.bank.transfer_in(asset, from, amount) {
            Ok(()) => {
                self.journal.push(Step::In {
                    asset: asset.clone(),
                    from: from.clone(),
                    amount,
                });
                Ok(())
            }
            Err(e) => {
                self.unwind();
                Err(e)
            }
        }
    }

    pub fn transfer_out(
        &mut self,
        asset: &AssetId,
        to: &AccountId,
        amount: Money,
    ) -> LedgerResult<()> {
        if amount.is_zero() {
            return Ok(());
        }
        match self.bank.transfer_out(asset, to, amount) {
            Ok(()) => {
                self.journal.push(Step::Out {
                    asset: asset.clone(),
                    to: to.clone(),
                    amount,
                });
                Ok(())
            }
            Err(e) => {
                self.unwind();
                Err(e)
            }
        }
    }

    pub fn deposit(&mut self, collateral: &CollateralRef, from: &AccountId) -> LedgerResult<()> {
        match self.bank.deposit(collateral, from) {
            Ok(()) => {
                self.journal.push(Step::Deposit {
                    collateral: collateral.clone(),
                    from: from.clone(),
                });
                Ok(())
            }
            Err(e) => {
                self.unwind();
                Err(e)
            }
        }
    }

    pub fn release(&mut self, collateral: &CollateralRef, to: &AccountId) -> LedgerResult<()> {
        match self.bank.release(collateral, to) {
            Ok(()) => {
                self.journal.push(Step::Release {
                    collateral: collateral.clone(),
                    to: to.clone(),
                });
                Ok(())
            }
            Err(e) => {
                self.unwind();
                Err(e)
            }
        }
    }

    /// All transfers landed; the caller may now mutate ledger state.
    pub fn commit(mut self) {
        self.journal.clear();
    }

    fn unwind(&mut self) {
        for step in self.journal.drain(..).rev() {
            let result = match step {
                Step::In {
                    asset,
                    from,
                    amount,
                } => self.bank.transfer_out(&asset, &from, amount),
                Step::Out { asset, to, amount } => self.bank.transfer_in(&asset, &to, amount),
                Step::Deposit { collateral, from } => self.bank.release(&collateral, &from),
                Step::Release { collateral, to } => self.bank.deposit(&collateral, &to),
            };
            if let Err(e) = result {
                log::error!("transfer unwind step failed, collaborator state may drift: {e}");
            }
        }
    }
}
