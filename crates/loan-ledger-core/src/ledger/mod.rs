//! The Loan Ledger: authoritative record of every loan and the only
//! component allowed to move a loan between states.
//!
//! All mutating operations are capability-gated and atomic: amounts are
//! computed first, collaborator transfers run through a compensating
//! [`TransferBatch`], and ledger state is only touched once every transfer
//! has landed. The state-machine guard is the concurrency control; a lost
//! race becomes a deterministic "invalid loan state" rejection.

pub mod installments;
pub mod notes;
pub mod roles;

use log::{debug, info};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

use crate::accrual;
use crate::collab::{AssetTransfer, AuthorizationVerifier, EscrowVault, TransferBatch};
use crate::error::LedgerError;
use crate::events::LedgerEvent;
use crate::fees::{FeeClass, FeePolicy};
use crate::types::{
    AccountId, AssetId, CollateralRef, Loan, LoanId, LoanState, LoanTerms, Money, Nonce,
    Timestamp,
};
use crate::LedgerResult;

use notes::NoteRegistry;
use roles::{Capabilities, Capability};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NonceState {
    Used,
    Cancelled,
}

/// The loan ledger state machine, generic over its collaborators.
pub struct LoanLedger<B, V>
where
    B: AssetTransfer + EscrowVault,
    V: AuthorizationVerifier,
{
    /// Identity bound into structured authorization messages.
    pub(crate) identity: String,
    pub(crate) bank: B,
    pub(crate) verifier: V,
    pub(crate) fee_policy: FeePolicy,
    pub(crate) caps: Capabilities,
    pub(crate) loans: BTreeMap<LoanId, Loan>,
    pub(crate) next_loan_id: u64,
    pub(crate) borrower_notes: NoteRegistry,
    pub(crate) lender_notes: NoteRegistry,
    nonces: HashMap<(AccountId, Nonce), NonceState>,
    pub(crate) fee_balances: HashMap<AssetId, Money>,
    pub(crate) events: Vec<LedgerEvent>,
}

impl<B, V> LoanLedger<B, V>
where
    B: AssetTransfer + EscrowVault,
    V: AuthorizationVerifier,
{
    /// A fresh ledger. `admin` receives the Admin capability and hands out
    /// everything else from there.
    pub fn new(identity: impl Into<String>, admin: AccountId, bank: B, verifier: V) -> Self {
        let mut caps = Capabilities::default();
        caps.grant(admin, Capability::Admin);
        LoanLedger {
            identity: identity.into(),
            bank,
            verifier,
            fee_policy: FeePolicy::default(),
            caps,
            loans: BTreeMap::new(),
            next_loan_id: 0,
            borrower_notes: NoteRegistry::default(),
            lender_notes: NoteRegistry::default(),
            nonces: HashMap::new(),
            fee_balances: HashMap::new(),
            events: Vec::new(),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn bank(&self) -> &B {
        &self.bank
    }

    /// The asset collaborator is external state; tests and embedders reach
    /// it directly for minting and approvals.
    pub fn bank_mut(&mut self) -> &mut B {
        &mut self.bank
    }

    pub fn verifier_mut(&mut self) -> &mut V {
        &mut self.verifier
    }

    pub fn fee_policy(&self) -> &FeePolicy {
        &self.fee_policy
    }

    pub fn fee_balance(&self, asset: &AssetId) -> Money {
        self.fee_balances
            .get(asset)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn get_loan(&self, loan_id: LoanId) -> LedgerResult<&Loan> {
        self.loans
            .get(&loan_id)
            .ok_or(LedgerError::UnknownLoan(loan_id))
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }

    // --- administration -----------------------------------------------------

    pub fn grant(
        &mut self,
        caller: &AccountId,
        account: &AccountId,
        capability: Capability,
    ) -> LedgerResult<()> {
        self.caps.require(caller, Capability::Admin)?;
        self.caps.grant(account.clone(), capability);
        Ok(())
    }

    pub fn revoke(
        &mut self,
        caller: &AccountId,
        account: &AccountId,
        capability: Capability,
    ) -> LedgerResult<()> {
        self.caps.require(caller, Capability::Admin)?;
        self.caps.revoke(account, capability);
        Ok(())
    }

    pub fn set_fee_rate(
        &mut self,
        caller: &AccountId,
        class: FeeClass,
        bps: Decimal,
    ) -> LedgerResult<()> {
        self.caps.require(caller, Capability::Admin)?;
        self.fee_policy.set_rate(class, bps)
    }

    // --- note transfers -----------------------------------------------------

    pub fn transfer_borrower_note(
        &mut self,
        caller: &AccountId,
        note: crate::types::NoteId,
        to: AccountId,
    ) -> LedgerResult<()> {
        self.borrower_notes.transfer(caller, note, to)
    }

    pub fn transfer_lender_note(
        &mut self,
        caller: &AccountId,
        note: crate::types::NoteId,
        to: AccountId,
    ) -> LedgerResult<()> {
        self.lender_notes.transfer(caller, note, to)
    }

    // --- loan lifecycle -----------------------------------------------------

    /// Record a new loan in state Created. Rejects terms violating the
    /// installment invariant, an already-expired duration, or collateral
    /// referenced by another non-terminal loan.
    pub fn create_loan(&mut self, caller: &AccountId, terms: LoanTerms) -> LedgerResult<LoanId> {
        self.caps.require(caller, Capability::Originator)?;
        terms.validate()?;
        if let Some(existing) = self
            .loans
            .values()
            .find(|l| !l.state.is_terminal() && l.terms.collateral == terms.collateral)
        {
            return Err(LedgerError::CollateralInUse {
                collateral: terms.collateral.clone(),
                loan: existing.id,
            });
        }

        self.next_loan_id += 1;
        let id = LoanId(self.next_loan_id);
        let balance = terms.principal;
        let collateral = terms.collateral.clone();
        self.loans.insert(
            id,
            Loan {
                id,
                terms,
                state: LoanState::Created,
                borrower_note: None,
                lender_note: None,
                balance,
                balance_paid: Decimal::ZERO,
                start: 0,
                installments_paid: 0,
            },
        );
        debug!("{id} created against {collateral}");
        self.events.push(LedgerEvent::LoanCreated {
            loan: id,
            collateral,
        });
        Ok(id)
    }

    /// Escrow the collateral, advance the principal net of the origination
    /// fee, mint both claim notes, and activate the loan.
    pub fn start_loan(
        &mut self,
        caller: &AccountId,
        lender: &AccountId,
        borrower: &AccountId,
        loan_id: LoanId,
        now: Timestamp,
    ) -> LedgerResult<()> {
        self.caps.require(caller, Capability::Originator)?;
        let loan = self.get_loan(loan_id)?;
        if loan.state != LoanState::Created {
            return Err(invalid_state(loan));
        }
        if let Some(deadline) = loan.terms.deadline {
            if now > deadline {
                return Err(LedgerError::AuthorizationExpired { deadline, now });
            }
        }
        let terms = loan.terms.clone();
        let fee = self.fee_policy.quote(FeeClass::Origination, terms.principal);

        let mut batch = TransferBatch::new(&mut self.bank);
        batch.deposit(&terms.collateral, borrower)?;
        batch.transfer_in(&terms.payable_currency, lender, terms.principal)?;
        batch.transfer_out(&terms.payable_currency, borrower, terms.principal - fee)?;
        batch.commit();

        let borrower_note = self.borrower_notes.mint(borrower.clone());
        let lender_note = self.lender_notes.mint(lender.clone());
        *self
            .fee_balances
            .entry(terms.payable_currency.clone())
            .or_default() += fee;

        let loan = self
            .loans
            .get_mut(&loan_id)
            .ok_or(LedgerError::UnknownLoan(loan_id))?;
        loan.state = LoanState::Active;
        loan.start = now;
        loan.borrower_note = Some(borrower_note);
        loan.lender_note = Some(lender_note);

        info!("{loan_id} started: {lender} -> {borrower}, fee {fee}");
        self.events.push(LedgerEvent::LoanStarted {
            loan: loan_id,
            lender: lender.clone(),
            borrower: borrower.clone(),
            principal: terms.principal,
            origination_fee: fee,
        });
        Ok(())
    }

    /// Repay a bullet loan in one lump sum: outstanding balance plus the
    /// full-term interest, pulled from the caller, paid to the lender-note
    /// holder. Only valid up to and including expiry.
    pub fn repay(&mut self, caller: &AccountId, loan_id: LoanId, now: Timestamp) -> LedgerResult<()> {
        self.caps.require(caller, Capability::Repayer)?;
        let loan = self.get_loan(loan_id)?;
        if loan.state != LoanState::Active {
            return Err(invalid_state(loan));
        }
        if !loan.is_bullet() {
            return Err(LedgerError::InvalidTerms {
                field: "num_installments".into(),
                reason: "loan is repaid in installments; use the installment entry points".into(),
            });
        }
        if now > loan.terms.expiry(loan.start) {
            return Err(LedgerError::LoanExpired { loan: loan_id });
        }

        let terms = loan.terms.clone();
        let due = accrual::bullet_close_amount(&terms, loan.balance);
        let (borrower_note, lender_note) = active_notes(loan)?;
        let borrower_holder = self.borrower_notes.holder(borrower_note)?.clone();
        let lender_holder = self.lender_notes.holder(lender_note)?.clone();

        let mut batch = TransferBatch::new(&mut self.bank);
        batch.transfer_in(&terms.payable_currency, caller, due)?;
        batch.transfer_out(&terms.payable_currency, &lender_holder, due)?;
        batch.release(&terms.collateral, &borrower_holder)?;
        batch.commit();

        self.finish_repaid(loan_id, due)?;
        Ok(())
    }

    /// After expiry, hand the collateral to the lender-note holder.
    pub fn claim(&mut self, caller: &AccountId, loan_id: LoanId, now: Timestamp) -> LedgerResult<()> {
        self.caps.require(caller, Capability::Repayer)?;
        let loan = self.get_loan(loan_id)?;
        if loan.state != LoanState::Active {
            return Err(invalid_state(loan));
        }
        if now < loan.terms.expiry(loan.start) {
            return Err(LedgerError::LoanNotExpired { loan: loan_id });
        }

        let collateral = loan.terms.collateral.clone();
        let (borrower_note, lender_note) = active_notes(loan)?;
        let lender_holder = self.lender_notes.holder(lender_note)?.clone();

        let mut batch = TransferBatch::new(&mut self.bank);
        batch.release(&collateral, &lender_holder)?;
        batch.commit();

        self.borrower_notes.burn(borrower_note)?;
        self.lender_notes.burn(lender_note)?;
        let loan = self
            .loans
            .get_mut(&loan_id)
            .ok_or(LedgerError::UnknownLoan(loan_id))?;
        loan.state = LoanState::Claimed;

        info!("{loan_id} claimed by {lender_holder}");
        self.events.push(LedgerEvent::LoanClaimed { loan: loan_id });
        Ok(())
    }

    /// Withdraw the ledger's accumulated fee balance of `asset`. Returns the
    /// amount withdrawn; a zero balance is not an error.
    pub fn claim_fees(&mut self, caller: &AccountId, asset: &AssetId) -> LedgerResult<Money> {
        self.caps.require(caller, Capability::FeeClaimer)?;
        let amount = self.fee_balance(asset);
        if amount.is_zero() {
            return Ok(amount);
        }
        self.bank.transfer_out(asset, caller, amount)?;
        self.fee_balances.insert(asset.clone(), Decimal::ZERO);
        info!("fees of {amount} {asset} claimed by {caller}");
        self.events.push(LedgerEvent::FeesClaimed {
            asset: asset.clone(),
            to: caller.clone(),
            amount,
        });
        Ok(amount)
    }

    // --- replay protection --------------------------------------------------

    /// Consume a signer's nonce while validating a signed instruction.
    pub fn consume_nonce(
        &mut self,
        caller: &AccountId,
        signer: &AccountId,
        nonce: Nonce,
    ) -> LedgerResult<()> {
        self.caps.require(caller, Capability::Originator)?;
        self.mark_nonce_used(signer, nonce)
    }

    /// A signer voiding one of their own nonces. A cancelled nonce can never
    /// subsequently be consumed.
    pub fn cancel_nonce(&mut self, signer: &AccountId, nonce: Nonce) -> LedgerResult<()> {
        if self.nonces.contains_key(&(signer.clone(), nonce)) {
            return Err(LedgerError::NonceUsed {
                signer: signer.clone(),
                nonce,
            });
        }
        self.nonces
            .insert((signer.clone(), nonce), NonceState::Cancelled);
        self.events.push(LedgerEvent::NonceCancelled {
            signer: signer.clone(),
            nonce,
        });
        Ok(())
    }

    pub fn is_nonce_available(&self, signer: &AccountId, nonce: Nonce) -> bool {
        !self.nonces.contains_key(&(signer.clone(), nonce))
    }

    pub(crate) fn mark_nonce_used(&mut self, signer: &AccountId, nonce: Nonce) -> LedgerResult<()> {
        if self.nonces.contains_key(&(signer.clone(), nonce)) {
            return Err(LedgerError::NonceUsed {
                signer: signer.clone(),
                nonce,
            });
        }
        self.nonces.insert((signer.clone(), nonce), NonceState::Used);
        Ok(())
    }

    // --- queries ------------------------------------------------------------

    /// True only if `caller` currently holds the borrower note of an Active
    /// loan referencing this collateral. Consulted by the escrow vault to
    /// authorize delegated calls.
    pub fn can_call_on(&self, caller: &AccountId, collateral: &CollateralRef) -> bool {
        self.loans.values().any(|loan| {
            loan.state == LoanState::Active
                && loan.terms.collateral == *collateral
                && loan
                    .borrower_note
                    .is_some_and(|note| self.borrower_notes.is_holder(note, caller))
        })
    }

    // --- internals ----------------------------------------------------------

    /// Terminal bookkeeping shared by every repayment path: burn both notes,
    /// zero the balance, record the payment, emit `LoanRepaid`.
    pub(crate) fn finish_repaid(&mut self, loan_id: LoanId, paid: Money) -> LedgerResult<()> {
        let loan = self.get_loan(loan_id)?;
        let (borrower_note, lender_note) = active_notes(loan)?;
        self.borrower_notes.burn(borrower_note)?;
        self.lender_notes.burn(lender_note)?;

        let loan = self
            .loans
            .get_mut(&loan_id)
            .ok_or(LedgerError::UnknownLoan(loan_id))?;
        loan.balance = Decimal::ZERO;
        loan.balance_paid += paid;
        loan.state = LoanState::Repaid;

        info!("{loan_id} repaid");
        self.events.push(LedgerEvent::LoanRepaid { loan: loan_id });
        Ok(())
    }
}

pub(crate) fn invalid_state(loan: &Loan) -> LedgerError {
    LedgerError::InvalidState {
        loan: loan.id,
        state: loan.state,
    }
}

pub(crate) fn active_notes(loan: &Loan) -> LedgerResult<(crate::types::NoteId, crate::types::NoteId)> {
    match (loan.borrower_note, loan.lender_note) {
        (Some(b), Some(l)) => Ok((b, l)),
        _ => Err(invalid_state(loan)),
    }
}
