use clap::Args;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use loan_ledger_core::fees::{FeeClass, FeePolicy};
use loan_ledger_core::rollover::rollover_amounts;

use crate::input;

/// Inputs for a rollover settlement preview. The fee is quoted on the old
/// loan's principal, not its close amount.
#[derive(Debug, Deserialize)]
pub struct RolloverPreviewInput {
    pub old_principal: Decimal,
    pub old_close_amount: Decimal,
    pub new_principal: Decimal,
    #[serde(default)]
    pub rollover_fee_bps: Decimal,
    #[serde(default)]
    pub same_lender: bool,
}

/// Arguments for the rollover settlement preview
#[derive(Args)]
pub struct RolloverPreviewArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Principal of the loan being replaced
    #[arg(long)]
    pub old_principal: Option<Decimal>,

    /// Amount required to close the old loan at the rollover instant
    #[arg(long)]
    pub old_close_amount: Option<Decimal>,

    /// Principal of the replacement loan
    #[arg(long)]
    pub new_principal: Option<Decimal>,

    /// Rollover fee rate in basis points
    #[arg(long, default_value = "0")]
    pub rollover_fee_bps: Decimal,

    /// Net the lender legs: the incoming lender already holds the old note
    #[arg(long, default_value_t = false)]
    pub same_lender: bool,
}

pub fn run_rollover_preview(args: RolloverPreviewArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let preview_input: RolloverPreviewInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        RolloverPreviewInput {
            old_principal: args
                .old_principal
                .ok_or("--old-principal is required (or provide --input)")?,
            old_close_amount: args
                .old_close_amount
                .ok_or("--old-close-amount is required (or provide --input)")?,
            new_principal: args
                .new_principal
                .ok_or("--new-principal is required (or provide --input)")?,
            rollover_fee_bps: args.rollover_fee_bps,
            same_lender: args.same_lender,
        }
    };

    let policy = FeePolicy::new(Decimal::ZERO, preview_input.rollover_fee_bps)?;
    let fee = policy.quote(FeeClass::Rollover, preview_input.old_principal);
    let amounts = rollover_amounts(
        preview_input.old_close_amount,
        preview_input.new_principal,
        fee,
        preview_input.same_lender,
    );

    let mut value = serde_json::to_value(&amounts)?;
    if let Value::Object(ref mut map) = value {
        map.insert("net_retained".into(), json!(amounts.net_retained()));
        map.insert("same_lender".into(), json!(preview_input.same_lender));
    }
    Ok(value)
}
