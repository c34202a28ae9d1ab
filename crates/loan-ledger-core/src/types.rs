use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::LedgerError;
use crate::LedgerResult;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed in basis points (1000 = 10%).
pub type Rate = Decimal;

/// Logical time in seconds. The ledger never reads a wall clock; callers
/// pass `now` into every time-sensitive operation.
pub type Timestamp = u64;

/// Basis points divisor
pub const BPS_DIVISOR: Decimal = dec!(10000);

/// Scale of the ledger's fixed-point unit.
pub const UNIT_DECIMALS: u32 = 18;

/// Exclusive upper bound on the installment count of a loan.
pub const MAX_INSTALLMENTS: u64 = 1_000_000;

/// Truncate toward zero at the ledger unit. Fee quotes round down so the
/// protocol never over-collects by a fraction of a unit.
pub fn floor_to_unit(amount: Money) -> Money {
    amount.round_dp_with_strategy(UNIT_DECIMALS, RoundingStrategy::ToZero)
}

/// Identity of an external party (borrower, lender, caller, custody account).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        AccountId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        AccountId(s.to_string())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a fungible asset contract.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        AssetId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AssetId {
    fn from(s: &str) -> Self {
        AssetId(s.to_string())
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a unique collateral token: asset contract plus token id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollateralRef {
    pub asset: AssetId,
    pub token_id: u64,
}

impl CollateralRef {
    pub fn new(asset: impl Into<String>, token_id: u64) -> Self {
        CollateralRef {
            asset: AssetId::new(asset),
            token_id,
        }
    }
}

impl fmt::Display for CollateralRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.asset, self.token_id)
    }
}

/// Monotonically assigned loan identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LoanId(pub u64);

impl fmt::Display for LoanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loan-{}", self.0)
    }
}

/// Identity of a borrower or lender claim note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NoteId(pub u64);

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "note-{}", self.0)
    }
}

/// Single-use replay-protection nonce, scoped to a signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Nonce(pub u64);

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "nonce-{}", self.0)
    }
}

/// Loan lifecycle state. Only moves forward: Created -> Active -> terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanState {
    Created,
    Active,
    Repaid,
    Claimed,
}

impl LoanState {
    pub fn is_terminal(self) -> bool {
        matches!(self, LoanState::Repaid | LoanState::Claimed)
    }
}

impl fmt::Display for LoanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoanState::Created => "created",
            LoanState::Active => "active",
            LoanState::Repaid => "repaid",
            LoanState::Claimed => "claimed",
        };
        f.write_str(s)
    }
}

/// Immutable loan terms, fixed at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanTerms {
    /// Term length in seconds.
    pub duration_secs: u64,
    /// Principal advanced by the lender.
    pub principal: Money,
    /// Full-term interest rate in basis points.
    pub interest_rate_bps: Rate,
    /// The unique token locked in escrow for the life of the loan.
    pub collateral: CollateralRef,
    /// Currency the loan is funded and repaid in.
    pub payable_currency: AssetId,
    /// 0 = bullet loan; otherwise must be even and below `MAX_INSTALLMENTS`.
    pub num_installments: u64,
    /// Expiry of the originating signature, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<Timestamp>,
}

impl LoanTerms {
    /// Validate the terms invariants common to origination and rollover.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.duration_secs == 0 {
            return Err(LedgerError::InvalidTerms {
                field: "duration_secs".into(),
                reason: "loan duration is zero; the loan would be expired at creation".into(),
            });
        }
        if self.principal <= Decimal::ZERO {
            return Err(LedgerError::InvalidTerms {
                field: "principal".into(),
                reason: "principal must be positive".into(),
            });
        }
        if self.interest_rate_bps < Decimal::ZERO {
            return Err(LedgerError::InvalidTerms {
                field: "interest_rate_bps".into(),
                reason: "interest rate cannot be negative".into(),
            });
        }
        if self.num_installments != 0 {
            if self.num_installments % 2 != 0 || self.num_installments >= MAX_INSTALLMENTS {
                return Err(LedgerError::InvalidTerms {
                    field: "num_installments".into(),
                    reason: format!(
                        "installment count must be 0, or even and below {}; got {}",
                        MAX_INSTALLMENTS, self.num_installments
                    ),
                });
            }
            if self.duration_secs / self.num_installments == 0 {
                return Err(LedgerError::InvalidTerms {
                    field: "num_installments".into(),
                    reason: "duration is shorter than one second per installment period".into(),
                });
            }
        }
        Ok(())
    }

    /// Interest owed over the full term: `principal * rate_bps / 10000`.
    pub fn full_interest(&self) -> Money {
        self.principal * self.interest_rate_bps / BPS_DIVISOR
    }

    /// Expiry instant of a loan started at `start`.
    pub fn expiry(&self, start: Timestamp) -> Timestamp {
        start.saturating_add(self.duration_secs)
    }
}

/// The authoritative record of a loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub terms: LoanTerms,
    pub state: LoanState,
    /// Claim note entitling its holder to act as borrower. Minted at start.
    pub borrower_note: Option<NoteId>,
    /// Claim note entitling its holder to act as lender. Minted at start.
    pub lender_note: Option<NoteId>,
    /// Outstanding principal. Never increases; zero only through repayment.
    pub balance: Money,
    /// Cumulative amount paid against this loan (interest, fees, principal).
    pub balance_paid: Money,
    /// Start timestamp, recorded when the loan became Active.
    pub start: Timestamp,
    /// Installment periods serviced so far.
    pub installments_paid: u64,
}

impl Loan {
    pub fn is_bullet(&self) -> bool {
        self.terms.num_installments == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn terms(num_installments: u64) -> LoanTerms {
        LoanTerms {
            duration_secs: 36_000,
            principal: dec!(100),
            interest_rate_bps: dec!(1000),
            collateral: CollateralRef::new("punks", 7),
            payable_currency: AssetId::new("usd"),
            num_installments,
            deadline: None,
        }
    }

    #[test]
    fn test_bullet_terms_validate() {
        assert!(terms(0).validate().is_ok());
        assert!(terms(4).validate().is_ok());
    }

    #[test]
    fn test_odd_installment_count_rejected() {
        for n in [1, 3, 7, 999_999] {
            let err = terms(n).validate().unwrap_err();
            match err {
                LedgerError::InvalidTerms { field, .. } => {
                    assert_eq!(field, "num_installments")
                }
                other => panic!("expected InvalidTerms, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_installment_count_upper_bound() {
        let err = terms(MAX_INSTALLMENTS).validate().unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTerms { .. }));
        // One even step below the bound is fine.
        assert!(terms(MAX_INSTALLMENTS - 2).validate().is_ok());
    }

    #[test]
    fn test_zero_duration_rejected() {
        let mut t = terms(0);
        t.duration_secs = 0;
        let err = t.validate().unwrap_err();
        match err {
            LedgerError::InvalidTerms { field, .. } => assert_eq!(field, "duration_secs"),
            other => panic!("expected InvalidTerms, got {other:?}"),
        }
    }

    #[test]
    fn test_full_interest() {
        // 100 at 1000 bps = 10
        assert_eq!(terms(0).full_interest(), dec!(10));
    }

    #[test]
    fn test_floor_to_unit_rounds_down() {
        let x = Decimal::from_str_exact("1.0000000000000000019").unwrap();
        assert_eq!(
            floor_to_unit(x),
            Decimal::from_str_exact("1.000000000000000001").unwrap()
        );
        assert_eq!(floor_to_unit(dec!(2.5)), dec!(2.5));
    }
}
