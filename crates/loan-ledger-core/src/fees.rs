//! Fee Policy: current basis-point rate per fee class.
//!
//! A pure leaf consumed by the ledger (origination) and the rollover
//! calculator. Mutation is admin-gated at the ledger surface.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::types::{floor_to_unit, Money, Rate, BPS_DIVISOR};
use crate::LedgerResult;

const MAX_FEE_BPS: Decimal = dec!(10000);

/// The classes of protocol fee the ledger levies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeeClass {
    /// Taken out of the principal advanced at loan start.
    Origination,
    /// Retained by the ledger when a loan is rolled over.
    Rollover,
}

/// Current fee schedule in basis points per class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeePolicy {
    origination_bps: Rate,
    rollover_bps: Rate,
}

impl FeePolicy {
    pub fn new(origination_bps: Rate, rollover_bps: Rate) -> LedgerResult<Self> {
        let mut policy = FeePolicy::default();
        policy.set_rate(FeeClass::Origination, origination_bps)?;
        policy.set_rate(FeeClass::Rollover, rollover_bps)?;
        Ok(policy)
    }

    pub fn rate(&self, class: FeeClass) -> Rate {
        match class {
            FeeClass::Origination => self.origination_bps,
            FeeClass::Rollover => self.rollover_bps,
        }
    }

    pub fn set_rate(&mut self, class: FeeClass, bps: Rate) -> LedgerResult<()> {
        if bps < Decimal::ZERO || bps > MAX_FEE_BPS {
            return Err(LedgerError::InvalidTerms {
                field: "fee_bps".into(),
                reason: format!("fee rate must be between 0 and {MAX_FEE_BPS} bps, got {bps}"),
            });
        }
        match class {
            FeeClass::Origination => self.origination_bps = bps,
            FeeClass::Rollover => self.rollover_bps = bps,
        }
        Ok(())
    }

    /// Fee on `amount` at the current rate for `class`, rounded down to the
    /// ledger unit.
    pub fn quote(&self, class: FeeClass, amount: Money) -> Money {
        floor_to_unit(amount * self.rate(class) / BPS_DIVISOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_policy_is_free() {
        let policy = FeePolicy::default();
        assert_eq!(policy.quote(FeeClass::Origination, dec!(1000)), Decimal::ZERO);
        assert_eq!(policy.quote(FeeClass::Rollover, dec!(1000)), Decimal::ZERO);
    }

    #[test]
    fn test_quote_per_class() {
        let policy = FeePolicy::new(dec!(300), dec!(100)).unwrap();
        // 3% of 100 = 3, 1% of 100 = 1
        assert_eq!(policy.quote(FeeClass::Origination, dec!(100)), dec!(3));
        assert_eq!(policy.quote(FeeClass::Rollover, dec!(100)), dec!(1));
    }

    #[test]
    fn test_quote_rounds_down_to_unit() {
        let policy = FeePolicy::new(dec!(1), Decimal::ZERO).unwrap();
        // 1 bps of 0.000000000000000333 would be 3.33e-20; floors to zero.
        let dust = Decimal::from_str_exact("0.000000000000000333").unwrap();
        assert_eq!(policy.quote(FeeClass::Origination, dust), Decimal::ZERO);
    }

    #[test]
    fn test_set_rate_bounds() {
        let mut policy = FeePolicy::default();
        assert!(policy.set_rate(FeeClass::Rollover, dec!(10000)).is_ok());
        let err = policy.set_rate(FeeClass::Rollover, dec!(10001)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTerms { .. }));
        let err = policy.set_rate(FeeClass::Origination, dec!(-1)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTerms { .. }));
        // Failed set leaves the prior rate in place.
        assert_eq!(policy.rate(FeeClass::Rollover), dec!(10000));
        assert_eq!(policy.rate(FeeClass::Origination), Decimal::ZERO);
    }
}
