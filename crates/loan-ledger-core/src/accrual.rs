//! Installment Accrual Engine.
//!
//! Pure computation over a loan's terms, start time, current time, and
//! payment history. Nothing here is persisted: every query and every payment
//! recomputes the snapshot, so "pay the minimum" and "close the loan" always
//! agree on the interest and late-fee figures at a given instant.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::types::{floor_to_unit, LoanTerms, Money, Timestamp, BPS_DIVISOR};
use crate::LedgerResult;

/// Late-fee surcharge per missed period, in basis points of the running
/// compounded balance.
pub const LATE_FEE_BPS: Decimal = dec!(50);

/// Derived accrual figures for an installment loan at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentSnapshot {
    /// Index of the period in progress, clamped to the final scheduled
    /// period once the loan duration has fully elapsed.
    pub period_index: u64,
    /// Scheduled periods that have fully elapsed since start. Keeps growing
    /// past the schedule; overdue periods accrue like missed ones.
    pub periods_elapsed: u64,
    /// Fully elapsed periods without a recorded payment. The period in
    /// progress is due, not missed.
    pub installments_missed: u64,
    /// Interest component of the minimum payment, missed periods included.
    pub min_interest_due: Money,
    /// Component attributable purely to delinquency.
    pub late_fees: Money,
    /// Exactly what `repay_minimum` pulls: interest plus late fees.
    pub min_payment_due: Money,
    /// Outstanding balance plus everything accrued to date.
    pub full_close_amount: Money,
}

/// Compute the accrual snapshot for an installment loan.
///
/// For every missed period, interest at the per-period rate and a late fee
/// of [`LATE_FEE_BPS`] are assessed on a running balance which then grows by
/// both, so each missed period raises the effective base of the next. The
/// period in progress accrues interest on the final compounded balance, with
/// no late fee. Errors with `NoInstallments` on a bullet loan and with
/// `InvalidTerms` when the duration is shorter than one second per period.
pub fn installment_snapshot(
    terms: &LoanTerms,
    balance: Money,
    start: Timestamp,
    now: Timestamp,
    installments_paid: u64,
) -> LedgerResult<InstallmentSnapshot> {
    if terms.num_installments == 0 {
        return Err(LedgerError::NoInstallments);
    }

    let period_len = terms.duration_secs / terms.num_installments;
    if period_len == 0 {
        return Err(LedgerError::InvalidTerms {
            field: "num_installments".into(),
            reason: "duration is shorter than one second per installment period".into(),
        });
    }
    let elapsed = now.saturating_sub(start);
    let periods_elapsed = elapsed / period_len;
    let period_index = periods_elapsed.min(terms.num_installments - 1);
    let installments_missed = periods_elapsed.saturating_sub(installments_paid);

    let mut min_interest_due = Decimal::ZERO;
    let mut late_fees = Decimal::ZERO;

    // installments_paid past periods_elapsed means the current period was
    // already covered by a catch-up payment; nothing is due until the next
    // period opens.
    if installments_paid <= periods_elapsed {
        let per_period_rate =
            terms.interest_rate_bps / BPS_DIVISOR / Decimal::from(terms.num_installments);
        let late_rate = LATE_FEE_BPS / BPS_DIVISOR;

        let mut compounded = balance;
        for _ in 0..installments_missed {
            let interest = compounded * per_period_rate;
            let fee = compounded * late_rate;
            min_interest_due += interest;
            late_fees += fee;
            compounded += interest + fee;
        }
        min_interest_due += compounded * per_period_rate;

        min_interest_due = floor_to_unit(min_interest_due);
        late_fees = floor_to_unit(late_fees);
    }

    let min_payment_due = min_interest_due + late_fees;

    Ok(InstallmentSnapshot {
        period_index,
        periods_elapsed,
        installments_missed,
        min_interest_due,
        late_fees,
        min_payment_due,
        full_close_amount: balance + min_payment_due,
    })
}

/// Amount required to close a bullet loan: outstanding balance plus the
/// full-term interest, owed regardless of when repayment lands.
pub fn bullet_close_amount(terms: &LoanTerms, balance: Money) -> Money {
    balance + floor_to_unit(terms.full_interest())
}

/// Amount required to close any loan outright at `now`.
pub fn close_amount(
    terms: &LoanTerms,
    balance: Money,
    start: Timestamp,
    now: Timestamp,
    installments_paid: u64,
) -> LedgerResult<Money> {
    if terms.num_installments == 0 {
        return Ok(bullet_close_amount(terms, balance));
    }
    let snapshot = installment_snapshot(terms, balance, start, now, installments_paid)?;
    Ok(snapshot.full_close_amount)
}
