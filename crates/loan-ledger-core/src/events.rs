//! Ledger events, journalled per operation and drained by callers.

use serde::{Deserialize, Serialize};

use crate::types::{AccountId, AssetId, CollateralRef, LoanId, Money, Nonce};

/// Events emitted by the loan ledger. One entry per notification named in
/// an operation's contract, pushed in the contract's order within a single
/// operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerEvent {
    /// A loan record was created and its collateral reserved.
    LoanCreated {
        loan: LoanId,
        collateral: CollateralRef,
    },

    /// Collateral and principal were escrowed; the loan is live.
    LoanStarted {
        loan: LoanId,
        lender: AccountId,
        borrower: AccountId,
        principal: Money,
        origination_fee: Money,
    },

    /// An installment payment was recorded.
    InstallmentPaid {
        loan: LoanId,
        amount: Money,
        late_fees: Money,
        principal_portion: Money,
        installments_paid: u64,
    },

    /// The loan was fully repaid and collateral returned to the borrower.
    LoanRepaid { loan: LoanId },

    /// The loan defaulted and collateral went to the lender.
    LoanClaimed { loan: LoanId },

    /// Accumulated protocol fees were withdrawn.
    FeesClaimed {
        asset: AssetId,
        to: AccountId,
        amount: Money,
    },

    /// An old loan was atomically replaced by a new one.
    LoanRolledOver {
        old_loan: LoanId,
        new_loan: LoanId,
        rollover_fee: Money,
    },

    /// A signer voided one of their own nonces.
    NonceCancelled { signer: AccountId, nonce: Nonce },
}
