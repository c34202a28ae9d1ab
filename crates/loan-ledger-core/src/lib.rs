pub mod accrual;
pub mod collab;
pub mod error;
pub mod events;
pub mod fees;
pub mod ledger;
pub mod rollover;
pub mod types;

pub use accrual::{
    bullet_close_amount, close_amount, installment_snapshot, InstallmentSnapshot, LATE_FEE_BPS,
};
pub use collab::{
    AssetTransfer, AuthorizationVerifier, EscrowVault, InMemoryBank, MemoryVerifier,
    RolloverAuthorization, TransferBatch, PROTOCOL_VERSION,
};
pub use error::LedgerError;
pub use events::LedgerEvent;
pub use fees::{FeeClass, FeePolicy};
pub use ledger::roles::Capability;
pub use ledger::LoanLedger;
pub use rollover::{rollover_amounts, RolloverAmounts};
pub use types::*;

/// Standard result type for all ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
