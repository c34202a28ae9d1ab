use thiserror::Error;

use crate::ledger::roles::Capability;
use crate::types::{AccountId, CollateralRef, LoanId, LoanState, Money, Nonce, NoteId, Timestamp};

/// Every failure the ledger can surface. All of these reject the entire
/// operation atomically; none are retryable without corrected inputs.
#[derive(Debug, Error)]
pub enum LedgerError {
    // --- authorization ---
    #[error("{caller} is missing the {capability:?} capability")]
    MissingCapability {
        caller: AccountId,
        capability: Capability,
    },

    #[error("{caller} does not hold {note}")]
    NotNoteHolder { caller: AccountId, note: NoteId },

    #[error("{caller} is neither the borrower-note holder nor the incoming lender")]
    NotCounterparty { caller: AccountId },

    #[error("signature from {signer} did not verify")]
    InvalidSignature { signer: AccountId },

    #[error("authorization does not match the submitted instruction: {reason}")]
    AuthorizationMismatch { reason: String },

    #[error("nonce {nonce} for {signer} was already consumed or cancelled")]
    NonceUsed { signer: AccountId, nonce: Nonce },

    #[error("authorization expired at {deadline}, now {now}")]
    AuthorizationExpired { deadline: Timestamp, now: Timestamp },

    // --- loan state ---
    #[error("unknown loan {0}")]
    UnknownLoan(LoanId),

    #[error("invalid loan state: {loan} is {state}")]
    InvalidState { loan: LoanId, state: LoanState },

    #[error("{loan} has not expired yet")]
    LoanNotExpired { loan: LoanId },

    #[error("{loan} is past expiry")]
    LoanExpired { loan: LoanId },

    // --- terms validation ---
    #[error("invalid terms: {field}: {reason}")]
    InvalidTerms { field: String, reason: String },

    #[error("collateral {collateral} is already in use by {loan}")]
    CollateralInUse {
        collateral: CollateralRef,
        loan: LoanId,
    },

    #[error("rollover terms mismatch: {field} must match the old loan")]
    RolloverMismatch { field: String },

    #[error("no installments on this loan")]
    NoInstallments,

    #[error("payment of {provided} is below the {required} currently due")]
    InsufficientPayment { required: Money, provided: Money },

    #[error("payment of {provided} exceeds the {owed} owed to close the loan")]
    ExcessivePayment { owed: Money, provided: Money },

    // --- asset movement, surfaced verbatim from the collaborator ---
    #[error("asset transfer failed: {reason}")]
    TransferFailed { reason: String },
}
