//! Rollover settlement.
//!
//! A rollover atomically closes an Active loan and opens a replacement
//! against the same collateral, which never leaves escrow. One counterparty
//! submits the call carrying the other's signed authorization; the
//! settlement calculator decides who pays whom so that, whatever the
//! direction of the flows, the ledger retains exactly the rollover fee.

use log::info;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::accrual;
use crate::collab::{
    AssetTransfer, AuthorizationVerifier, EscrowVault, RolloverAuthorization, TransferBatch,
    PROTOCOL_VERSION,
};
use crate::error::LedgerError;
use crate::events::LedgerEvent;
use crate::fees::FeeClass;
use crate::ledger::{active_notes, invalid_state, LoanLedger};
use crate::types::{AccountId, Loan, LoanId, LoanState, LoanTerms, Money, Timestamp};
use crate::LedgerResult;

// ---------------------------------------------------------------------------
// Settlement calculator
// ---------------------------------------------------------------------------

/// Net flows of a rollover settlement, computed before anything moves.
///
/// Signs encode direction: positive `borrower_net` is paid out to the
/// borrower, negative is pulled from them; positive `lender_pull` is pulled
/// from the incoming lender, negative is paid to them (only possible when
/// the lender is unchanged and the new principal undershoots the close
/// amount).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolloverAmounts {
    /// Full amount required to close the old loan at the rollover instant.
    pub old_close_amount: Money,
    /// Fee retained by the ledger, quoted on the old principal.
    pub rollover_fee: Money,
    pub borrower_net: Money,
    pub lender_pull: Money,
    /// Paid to the old lender-note holder; zero when the lender carries over.
    pub old_lender_payout: Money,
}

impl RolloverAmounts {
    /// Inflows minus outflows. Equals `rollover_fee` for every settlement.
    pub fn net_retained(&self) -> Money {
        let inflows = self.lender_pull.max(Decimal::ZERO) + (-self.borrower_net).max(Decimal::ZERO);
        let outflows = self.old_lender_payout
            + (-self.lender_pull).max(Decimal::ZERO)
            + self.borrower_net.max(Decimal::ZERO);
        inflows - outflows
    }
}

/// Settle a rollover of `old_close_amount` into `new_principal`.
///
/// The borrower's position is always `new_principal - old_close_amount -
/// rollover_fee`. When the incoming lender already holds the old lender
/// note, their two legs are netted into a single flow instead of a
/// round-trip through custody.
pub fn rollover_amounts(
    old_close_amount: Money,
    new_principal: Money,
    rollover_fee: Money,
    same_lender: bool,
) -> RolloverAmounts {
    let borrower_net = new_principal - old_close_amount - rollover_fee;
    if same_lender {
        RolloverAmounts {
            old_close_amount,
            rollover_fee,
            borrower_net,
            lender_pull: new_principal - old_close_amount,
            old_lender_payout: Decimal::ZERO,
        }
    } else {
        RolloverAmounts {
            old_close_amount,
            rollover_fee,
            borrower_net,
            lender_pull: new_principal,
            old_lender_payout: old_close_amount,
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger entry point
// ---------------------------------------------------------------------------

impl<B, V> LoanLedger<B, V>
where
    B: AssetTransfer + EscrowVault,
    V: AuthorizationVerifier,
{
    /// Atomically replace `old_loan_id` with a loan on `new_terms`, funded
    /// by `new_lender`, without the collateral ever leaving escrow.
    ///
    /// The caller must be one side of the new loan: the current
    /// borrower-note holder or the incoming lender. `authorization` must be
    /// the other side's signed instruction for exactly these terms; its
    /// nonce is consumed on success and only on success.
    pub fn rollover_loan(
        &mut self,
        caller: &AccountId,
        old_loan_id: LoanId,
        new_terms: LoanTerms,
        new_lender: &AccountId,
        authorization: &RolloverAuthorization,
        now: Timestamp,
    ) -> LedgerResult<LoanId> {
        let old = self.get_loan(old_loan_id)?;
        if old.state != LoanState::Active {
            return Err(invalid_state(old));
        }
        new_terms.validate()?;
        // The replacement loan starts here; its terms carry the same
        // originating-signature deadline start_loan enforces.
        if let Some(deadline) = new_terms.deadline {
            if now > deadline {
                return Err(LedgerError::AuthorizationExpired { deadline, now });
            }
        }
        if new_terms.collateral != old.terms.collateral {
            return Err(LedgerError::RolloverMismatch {
                field: "collateral".into(),
            });
        }
        if new_terms.payable_currency != old.terms.payable_currency {
            return Err(LedgerError::RolloverMismatch {
                field: "payable_currency".into(),
            });
        }
        if authorization.loan != old_loan_id {
            return Err(LedgerError::AuthorizationMismatch {
                reason: format!("authorization names {}, not {old_loan_id}", authorization.loan),
            });
        }
        if authorization.terms != new_terms {
            return Err(LedgerError::AuthorizationMismatch {
                reason: "authorized terms differ from the submitted terms".into(),
            });
        }
        if authorization.ledger != self.identity {
            return Err(LedgerError::AuthorizationMismatch {
                reason: format!("authorization is bound to ledger '{}'", authorization.ledger),
            });
        }
        if authorization.version != PROTOCOL_VERSION {
            return Err(LedgerError::AuthorizationMismatch {
                reason: format!(
                    "protocol version {} is not {PROTOCOL_VERSION}",
                    authorization.version
                ),
            });
        }
        if let Some(deadline) = authorization.deadline {
            if now > deadline {
                return Err(LedgerError::AuthorizationExpired { deadline, now });
            }
        }

        let (old_borrower_note, old_lender_note) = active_notes(old)?;
        let borrower_holder = self.borrower_notes.holder(old_borrower_note)?.clone();
        let old_lender_holder = self.lender_notes.holder(old_lender_note)?.clone();

        // Whoever submits, the other side of the new loan must have signed.
        let signer = if *caller == borrower_holder {
            new_lender.clone()
        } else if caller == new_lender {
            borrower_holder.clone()
        } else {
            return Err(LedgerError::NotCounterparty {
                caller: caller.clone(),
            });
        };
        if !self.verifier.verify(authorization, &signer) {
            return Err(LedgerError::InvalidSignature { signer });
        }
        if !self.is_nonce_available(&signer, authorization.nonce) {
            return Err(LedgerError::NonceUsed {
                signer,
                nonce: authorization.nonce,
            });
        }

        let old_terms = old.terms.clone();
        let old_close = accrual::close_amount(
            &old_terms,
            old.balance,
            old.start,
            now,
            old.installments_paid,
        )?;
        let fee = self.fee_policy.quote(FeeClass::Rollover, old_terms.principal);
        let same_lender = *new_lender == old_lender_holder;
        let amounts = rollover_amounts(old_close, new_terms.principal, fee, same_lender);

        let currency = old_terms.payable_currency.clone();
        let mut batch = TransferBatch::new(&mut self.bank);
        // Pulls land before payouts so every unwind goes out of custody.
        if amounts.lender_pull > Decimal::ZERO {
            batch.transfer_in(&currency, new_lender, amounts.lender_pull)?;
        }
        if amounts.borrower_net < Decimal::ZERO {
            batch.transfer_in(&currency, &borrower_holder, -amounts.borrower_net)?;
        }
        batch.transfer_out(&currency, &old_lender_holder, amounts.old_lender_payout)?;
        if amounts.lender_pull < Decimal::ZERO {
            batch.transfer_out(&currency, new_lender, -amounts.lender_pull)?;
        }
        if amounts.borrower_net > Decimal::ZERO {
            batch.transfer_out(&currency, &borrower_holder, amounts.borrower_net)?;
        }
        batch.commit();

        // The nonce is consumed only once the settlement has landed; a
        // failed transfer leaves the authorization reusable.
        self.mark_nonce_used(&signer, authorization.nonce)?;
        *self.fee_balances.entry(currency).or_default() += fee;
        self.finish_repaid(old_loan_id, old_close)?;

        self.next_loan_id += 1;
        let new_id = LoanId(self.next_loan_id);
        let borrower_note = self.borrower_notes.mint(borrower_holder.clone());
        let lender_note = self.lender_notes.mint(new_lender.clone());
        let principal = new_terms.principal;
        self.loans.insert(
            new_id,
            Loan {
                id: new_id,
                terms: new_terms,
                state: LoanState::Active,
                borrower_note: Some(borrower_note),
                lender_note: Some(lender_note),
                balance: principal,
                balance_paid: Decimal::ZERO,
                start: now,
                installments_paid: 0,
            },
        );

        info!("{old_loan_id} rolled over into {new_id}, fee {fee}");
        self.events.push(LedgerEvent::LoanStarted {
            loan: new_id,
            lender: new_lender.clone(),
            borrower: borrower_holder,
            principal,
            origination_fee: Decimal::ZERO,
        });
        self.events.push(LedgerEvent::LoanRolledOver {
            old_loan: old_loan_id,
            new_loan: new_id,
            rollover_fee: fee,
        });
        Ok(new_id)
    }
}
