use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use loan_ledger_core::fees::{FeeClass, FeePolicy};

use crate::input;

#[derive(Debug, Clone, Copy, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeeClassArg {
    Origination,
    Rollover,
}

impl From<FeeClassArg> for FeeClass {
    fn from(class: FeeClassArg) -> Self {
        match class {
            FeeClassArg::Origination => FeeClass::Origination,
            FeeClassArg::Rollover => FeeClass::Rollover,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FeeQuoteInput {
    pub class: FeeClassArg,
    pub rate_bps: Decimal,
    pub amount: Decimal,
}

/// Arguments for a protocol fee quote
#[derive(Args)]
pub struct FeeQuoteArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Fee class
    #[arg(long, value_enum)]
    pub class: Option<FeeClassArg>,

    /// Fee rate in basis points
    #[arg(long)]
    pub rate_bps: Option<Decimal>,

    /// Amount the fee is quoted on
    #[arg(long)]
    pub amount: Option<Decimal>,
}

pub fn run_fee_quote(args: FeeQuoteArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let quote_input: FeeQuoteInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        FeeQuoteInput {
            class: args.class.ok_or("--class is required (or provide --input)")?,
            rate_bps: args
                .rate_bps
                .ok_or("--rate-bps is required (or provide --input)")?,
            amount: args
                .amount
                .ok_or("--amount is required (or provide --input)")?,
        }
    };

    let class: FeeClass = quote_input.class.into();
    let mut policy = FeePolicy::default();
    policy.set_rate(class, quote_input.rate_bps)?;
    let fee = policy.quote(class, quote_input.amount);

    Ok(json!({
        "fee": fee,
        "rate_bps": quote_input.rate_bps,
        "amount": quote_input.amount,
    }))
}
