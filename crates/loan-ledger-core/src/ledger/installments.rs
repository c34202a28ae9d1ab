//! Installment servicing entry points.
//!
//! Wraps the accrual engine with the capability, state, and transfer
//! plumbing. All payments are pulled from the caller and paid to the current
//! lender-note holder; principal reductions shrink the outstanding balance,
//! which in turn shrinks every later interest figure. These entry points
//! stay usable past expiry while the loan is Active; overdue periods keep
//! accruing until a close or a claim lands.

use rust_decimal::Decimal;

use crate::accrual::{self, InstallmentSnapshot};
use crate::collab::{AssetTransfer, AuthorizationVerifier, EscrowVault, TransferBatch};
use crate::error::LedgerError;
use crate::events::LedgerEvent;
use crate::types::{AccountId, LoanId, LoanState, Money, Timestamp};
use crate::LedgerResult;

use super::roles::Capability;
use super::{active_notes, invalid_state, LoanLedger};

impl<B, V> LoanLedger<B, V>
where
    B: AssetTransfer + EscrowVault,
    V: AuthorizationVerifier,
{
    /// Accrual snapshot for an Active installment loan at `now`.
    pub fn installment_snapshot(
        &self,
        loan_id: LoanId,
        now: Timestamp,
    ) -> LedgerResult<InstallmentSnapshot> {
        let loan = self.get_loan(loan_id)?;
        if loan.state != LoanState::Active {
            return Err(invalid_state(loan));
        }
        accrual::installment_snapshot(
            &loan.terms,
            loan.balance,
            loan.start,
            now,
            loan.installments_paid,
        )
    }

    /// Total required to close the loan outright at `now`, bullet or
    /// installment.
    pub fn amount_to_close(&self, loan_id: LoanId, now: Timestamp) -> LedgerResult<Money> {
        let loan = self.get_loan(loan_id)?;
        if loan.state != LoanState::Active {
            return Err(invalid_state(loan));
        }
        accrual::close_amount(
            &loan.terms,
            loan.balance,
            loan.start,
            now,
            loan.installments_paid,
        )
    }

    /// Pull the minimum payment due (interest plus late fees, missed periods
    /// included) and mark the loan serviced through the period in progress.
    /// Returns the amount pulled; when nothing is due this is a no-op
    /// returning zero.
    pub fn repay_minimum(
        &mut self,
        caller: &AccountId,
        loan_id: LoanId,
        now: Timestamp,
    ) -> LedgerResult<Money> {
        self.caps.require(caller, Capability::Repayer)?;
        let snapshot = self.installment_snapshot(loan_id, now)?;
        self.pay_installment(caller, loan_id, snapshot.min_payment_due, &snapshot)
    }

    /// Pull `amount`, which must cover at least the minimum due; anything
    /// above it retires principal. Paying interest, fees, and the entire
    /// balance closes the loan and releases the collateral.
    pub fn repay_part(
        &mut self,
        caller: &AccountId,
        loan_id: LoanId,
        amount: Money,
        now: Timestamp,
    ) -> LedgerResult<Money> {
        self.caps.require(caller, Capability::Repayer)?;
        let snapshot = self.installment_snapshot(loan_id, now)?;
        if amount < snapshot.min_payment_due {
            return Err(LedgerError::InsufficientPayment {
                required: snapshot.min_payment_due,
                provided: amount,
            });
        }
        let balance = self.get_loan(loan_id)?.balance;
        if amount > snapshot.min_payment_due + balance {
            return Err(LedgerError::ExcessivePayment {
                owed: snapshot.min_payment_due + balance,
                provided: amount,
            });
        }
        self.pay_installment(caller, loan_id, amount, &snapshot)
    }

    /// Repay the full close amount at `now` and release the collateral.
    /// Returns the amount pulled.
    pub fn close_loan(
        &mut self,
        caller: &AccountId,
        loan_id: LoanId,
        now: Timestamp,
    ) -> LedgerResult<Money> {
        self.caps.require(caller, Capability::Repayer)?;
        let snapshot = self.installment_snapshot(loan_id, now)?;
        self.pay_installment(caller, loan_id, snapshot.full_close_amount, &snapshot)
    }

    /// Shared settlement: pull `amount` from the caller, pay the lender-note
    /// holder, apply the principal portion, and close the loan if the
    /// balance reaches zero.
    fn pay_installment(
        &mut self,
        caller: &AccountId,
        loan_id: LoanId,
        amount: Money,
        snapshot: &InstallmentSnapshot,
    ) -> LedgerResult<Money> {
        if amount.is_zero() {
            return Ok(Decimal::ZERO);
        }
        let loan = self.get_loan(loan_id)?;
        let terms = loan.terms.clone();
        let balance = loan.balance;
        let (borrower_note, lender_note) = active_notes(loan)?;
        let borrower_holder = self.borrower_notes.holder(borrower_note)?.clone();
        let lender_holder = self.lender_notes.holder(lender_note)?.clone();

        let principal_portion = amount - snapshot.min_payment_due;
        let closing = principal_portion == balance;

        let mut batch = TransferBatch::new(&mut self.bank);
        batch.transfer_in(&terms.payable_currency, caller, amount)?;
        batch.transfer_out(&terms.payable_currency, &lender_holder, amount)?;
        if closing {
            batch.release(&terms.collateral, &borrower_holder)?;
        }
        batch.commit();

        let installments_paid = snapshot.periods_elapsed + 1;
        {
            let loan = self
                .loans
                .get_mut(&loan_id)
                .ok_or(LedgerError::UnknownLoan(loan_id))?;
            loan.installments_paid = installments_paid;
        }
        self.events.push(LedgerEvent::InstallmentPaid {
            loan: loan_id,
            amount,
            late_fees: snapshot.late_fees,
            principal_portion,
            installments_paid,
        });

        if closing {
            self.finish_repaid(loan_id, amount)?;
        } else {
            let loan = self
                .loans
                .get_mut(&loan_id)
                .ok_or(LedgerError::UnknownLoan(loan_id))?;
            loan.balance -= principal_portion;
            loan.balance_paid += amount;
        }
        Ok(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::tests::{acct, punk, setup, usd, TestLedger};
    use crate::types::LoanTerms;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn installment_terms() -> LoanTerms {
        LoanTerms {
            duration_secs: 36_000,
            principal: dec!(100),
            interest_rate_bps: dec!(1000),
            collateral: punk(),
            payable_currency: usd(),
            num_installments: 4,
            deadline: None,
        }
    }

    /// Started installment loan plus a funded, approved controller account.
    fn started(ledger: &mut TestLedger) -> LoanId {
        let id = ledger
            .create_loan(&acct("origin"), installment_terms())
            .unwrap();
        ledger
            .start_loan(&acct("origin"), &acct("lender"), &acct("borrower"), id, 0)
            .unwrap();
        let controller = acct("controller");
        ledger.bank_mut().mint(&usd(), &controller, dec!(500));
        ledger.bank_mut().approve(&usd(), &controller, dec!(500));
        id
    }

    // -----------------------------------------------------------------------
    // 1. Minimum payments period by period, then close (Scenario D shape)
    // -----------------------------------------------------------------------
    #[test]
    fn test_minimum_payments_then_close() {
        let mut ledger = setup();
        let id = started(&mut ledger);
        let controller = acct("controller");

        // Period 0: 100 * 2.5% = 2.5, no late fees.
        let paid = ledger.repay_minimum(&controller, id, 1_000).unwrap();
        assert_eq!(paid, dec!(2.5));
        let loan = ledger.get_loan(id).unwrap();
        assert_eq!(loan.balance, dec!(100));
        assert_eq!(loan.installments_paid, 1);

        // Period 1 opens; another plain 2.5.
        let paid = ledger.repay_minimum(&controller, id, 10_000).unwrap();
        assert_eq!(paid, dec!(2.5));
        assert_eq!(ledger.get_loan(id).unwrap().installments_paid, 2);

        // Close during period 2: balance plus one period of interest.
        assert_eq!(ledger.amount_to_close(id, 20_000).unwrap(), dec!(102.5));
        let paid = ledger.close_loan(&controller, id, 20_000).unwrap();
        assert_eq!(paid, dec!(102.5));

        let loan = ledger.get_loan(id).unwrap();
        assert_eq!(loan.state, crate::types::LoanState::Repaid);
        assert_eq!(loan.balance, Decimal::ZERO);
        assert_eq!(loan.balance_paid, dec!(107.5));
        assert_eq!(ledger.bank().owner_of(&punk()), Some(&acct("borrower")));
        // Lender received principal plus every interest payment.
        assert_eq!(
            ledger.bank().balance_of(&usd(), &acct("lender")),
            dec!(900) + dec!(107.5)
        );
    }

    // -----------------------------------------------------------------------
    // 2. Catch-up: counter jumps to the period in progress
    // -----------------------------------------------------------------------
    #[test]
    fn test_catch_up_payment_covers_missed_periods() {
        let mut ledger = setup();
        let id = started(&mut ledger);
        let controller = acct("controller");

        // Period 1 in progress with period 0 missed.
        let snap = ledger.installment_snapshot(id, 10_000).unwrap();
        assert_eq!(snap.installments_missed, 1);
        assert!(snap.late_fees > Decimal::ZERO);

        ledger.repay_minimum(&controller, id, 10_000).unwrap();
        assert_eq!(ledger.get_loan(id).unwrap().installments_paid, 2);

        // Immediately asking again in the same period finds nothing due.
        let paid = ledger.repay_minimum(&controller, id, 10_500).unwrap();
        assert_eq!(paid, Decimal::ZERO);
        // No event and no counter change for the no-op.
        assert_eq!(ledger.get_loan(id).unwrap().installments_paid, 2);
    }

    // -----------------------------------------------------------------------
    // 3. Partial principal retirement shrinks later interest
    // -----------------------------------------------------------------------
    #[test]
    fn test_repay_part_reduces_balance_and_interest() {
        let mut ledger = setup();
        let id = started(&mut ledger);
        let controller = acct("controller");

        // 2.5 due plus 60 of principal.
        let paid = ledger.repay_part(&controller, id, dec!(62.5), 1_000).unwrap();
        assert_eq!(paid, dec!(62.5));
        let loan = ledger.get_loan(id).unwrap();
        assert_eq!(loan.balance, dec!(40));
        assert_eq!(loan.state, crate::types::LoanState::Active);

        // Next period accrues on 40: 40 * 2.5% = 1.
        let snap = ledger.installment_snapshot(id, 10_000).unwrap();
        assert_eq!(snap.min_payment_due, dec!(1));
    }

    #[test]
    fn test_repay_part_below_minimum_rejected() {
        let mut ledger = setup();
        let id = started(&mut ledger);
        let err = ledger
            .repay_part(&acct("controller"), id, dec!(2), 1_000)
            .unwrap_err();
        match err {
            LedgerError::InsufficientPayment { required, provided } => {
                assert_eq!(required, dec!(2.5));
                assert_eq!(provided, dec!(2));
            }
            other => panic!("expected InsufficientPayment, got {other:?}"),
        }
    }

    #[test]
    fn test_repay_part_overpayment_rejected() {
        let mut ledger = setup();
        let id = started(&mut ledger);
        let err = ledger
            .repay_part(&acct("controller"), id, dec!(102.51), 1_000)
            .unwrap_err();
        match err {
            LedgerError::ExcessivePayment { owed, provided } => {
                assert_eq!(owed, dec!(102.5));
                assert_eq!(provided, dec!(102.51));
            }
            other => panic!("expected ExcessivePayment, got {other:?}"),
        }
    }

    // -----------------------------------------------------------------------
    // 4. repay_part covering the whole balance closes the loan
    // -----------------------------------------------------------------------
    #[test]
    fn test_repay_part_full_balance_closes() {
        let mut ledger = setup();
        let id = started(&mut ledger);
        let controller = acct("controller");

        ledger
            .repay_part(&controller, id, dec!(102.5), 1_000)
            .unwrap();
        let loan = ledger.get_loan(id).unwrap();
        assert_eq!(loan.state, crate::types::LoanState::Repaid);
        assert_eq!(ledger.bank().owner_of(&punk()), Some(&acct("borrower")));

        // InstallmentPaid precedes LoanRepaid in the stream.
        let events = ledger.take_events();
        let n = events.len();
        assert!(matches!(
            events[n - 2],
            LedgerEvent::InstallmentPaid {
                principal_portion, ..
            } if principal_portion == dec!(100)
        ));
        assert!(matches!(events[n - 1], LedgerEvent::LoanRepaid { loan } if loan == id));
    }

    // -----------------------------------------------------------------------
    // 5. Delinquency past expiry is still curable while Active
    // -----------------------------------------------------------------------
    #[test]
    fn test_overdue_loan_closable_past_expiry() {
        let mut ledger = setup();
        let id = started(&mut ledger);
        let controller = acct("controller");

        // Past the full duration with nothing paid; late fees piled up.
        let snap = ledger.installment_snapshot(id, 40_000).unwrap();
        assert_eq!(snap.installments_missed, 4);
        assert!(snap.late_fees > Decimal::ZERO);

        let paid = ledger.close_loan(&controller, id, 40_000).unwrap();
        assert!(paid > dec!(100));
        assert_eq!(
            ledger.get_loan(id).unwrap().state,
            crate::types::LoanState::Repaid
        );
    }

    // -----------------------------------------------------------------------
    // 6. Bullet loans are rejected by every installment entry point
    // -----------------------------------------------------------------------
    #[test]
    fn test_bullet_loan_rejected() {
        let mut ledger = setup();
        let id = crate::ledger::tests::started_bullet(&mut ledger);
        let controller = acct("controller");

        let err = ledger.repay_minimum(&controller, id, 1_000).unwrap_err();
        assert!(matches!(err, LedgerError::NoInstallments));
        let err = ledger.close_loan(&controller, id, 1_000).unwrap_err();
        assert!(matches!(err, LedgerError::NoInstallments));
        // amount_to_close still answers for bullets.
        assert_eq!(ledger.amount_to_close(id, 1_000).unwrap(), dec!(101));
    }

    // -----------------------------------------------------------------------
    // 7. Failed pull leaves loan untouched
    // -----------------------------------------------------------------------
    #[test]
    fn test_failed_pull_is_atomic() {
        let mut ledger = setup();
        let id = started(&mut ledger);
        let controller = acct("controller");
        // One fixed-point unit below the 2.5 due.
        ledger
            .bank_mut()
            .approve(&usd(), &controller, dec!(2.499999999999999999));

        let err = ledger.repay_minimum(&controller, id, 1_000).unwrap_err();
        assert!(matches!(err, LedgerError::TransferFailed { .. }));
        let loan = ledger.get_loan(id).unwrap();
        assert_eq!(loan.installments_paid, 0);
        assert_eq!(loan.balance_paid, Decimal::ZERO);

        ledger.bank_mut().approve(&usd(), &controller, dec!(2.5));
        assert_eq!(ledger.repay_minimum(&controller, id, 1_000).unwrap(), dec!(2.5));
    }
}
