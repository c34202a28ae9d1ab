use clap::Args;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use loan_ledger_core::accrual;
use loan_ledger_core::types::{CollateralRef, LoanTerms};

use crate::input;

/// Loan figures shared by the accrual commands. Collateral and currency
/// identity have no effect on the arithmetic, so the input format omits
/// them.
#[derive(Debug, Deserialize)]
pub struct AccrualInput {
    /// Term length in seconds.
    pub duration_secs: u64,
    pub principal: Decimal,
    /// Full-term interest rate in basis points.
    pub interest_rate_bps: Decimal,
    /// 0 means a bullet loan.
    #[serde(default)]
    pub num_installments: u64,
    /// Outstanding balance; defaults to the principal.
    #[serde(default)]
    pub balance: Option<Decimal>,
    /// Loan start instant, seconds.
    #[serde(default)]
    pub start: u64,
    /// Evaluation instant, seconds.
    pub now: u64,
    /// Installment periods already serviced.
    #[serde(default)]
    pub installments_paid: u64,
}

impl AccrualInput {
    fn terms(&self) -> LoanTerms {
        LoanTerms {
            duration_secs: self.duration_secs,
            principal: self.principal,
            interest_rate_bps: self.interest_rate_bps,
            collateral: CollateralRef::new("collateral", 0),
            payable_currency: "payable".into(),
            num_installments: self.num_installments,
            deadline: None,
        }
    }

    fn balance(&self) -> Decimal {
        self.balance.unwrap_or(self.principal)
    }
}

/// Arguments for the minimum-payment calculation
#[derive(Args)]
pub struct MinPaymentArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Term length in seconds
    #[arg(long)]
    pub duration_secs: Option<u64>,

    /// Principal advanced at loan start
    #[arg(long)]
    pub principal: Option<Decimal>,

    /// Full-term interest rate in basis points
    #[arg(long, alias = "rate-bps")]
    pub interest_rate_bps: Option<Decimal>,

    /// Number of installments
    #[arg(long)]
    pub num_installments: Option<u64>,

    /// Outstanding balance (defaults to the principal)
    #[arg(long)]
    pub balance: Option<Decimal>,

    /// Loan start instant, seconds
    #[arg(long, default_value_t = 0)]
    pub start: u64,

    /// Evaluation instant, seconds
    #[arg(long)]
    pub now: Option<u64>,

    /// Installment periods already serviced
    #[arg(long, default_value_t = 0)]
    pub installments_paid: u64,
}

/// Arguments for the close-amount calculation
#[derive(Args)]
pub struct CloseAmountArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Term length in seconds
    #[arg(long)]
    pub duration_secs: Option<u64>,

    /// Principal advanced at loan start
    #[arg(long)]
    pub principal: Option<Decimal>,

    /// Full-term interest rate in basis points
    #[arg(long, alias = "rate-bps")]
    pub interest_rate_bps: Option<Decimal>,

    /// Number of installments (0 for a bullet loan)
    #[arg(long, default_value_t = 0)]
    pub num_installments: u64,

    /// Outstanding balance (defaults to the principal)
    #[arg(long)]
    pub balance: Option<Decimal>,

    /// Loan start instant, seconds
    #[arg(long, default_value_t = 0)]
    pub start: u64,

    /// Evaluation instant, seconds
    #[arg(long)]
    pub now: Option<u64>,

    /// Installment periods already serviced
    #[arg(long, default_value_t = 0)]
    pub installments_paid: u64,
}

pub fn run_min_payment(args: MinPaymentArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let accrual_input: AccrualInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        AccrualInput {
            duration_secs: args
                .duration_secs
                .ok_or("--duration-secs is required (or provide --input)")?,
            principal: args
                .principal
                .ok_or("--principal is required (or provide --input)")?,
            interest_rate_bps: args
                .interest_rate_bps
                .ok_or("--interest-rate-bps is required (or provide --input)")?,
            num_installments: args
                .num_installments
                .ok_or("--num-installments is required (or provide --input)")?,
            balance: args.balance,
            start: args.start,
            now: args.now.ok_or("--now is required (or provide --input)")?,
            installments_paid: args.installments_paid,
        }
    };

    let terms = accrual_input.terms();
    terms.validate()?;
    let snapshot = accrual::installment_snapshot(
        &terms,
        accrual_input.balance(),
        accrual_input.start,
        accrual_input.now,
        accrual_input.installments_paid,
    )?;
    Ok(serde_json::to_value(snapshot)?)
}

pub fn run_close_amount(args: CloseAmountArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let accrual_input: AccrualInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        AccrualInput {
            duration_secs: args
                .duration_secs
                .ok_or("--duration-secs is required (or provide --input)")?,
            principal: args
                .principal
                .ok_or("--principal is required (or provide --input)")?,
            interest_rate_bps: args
                .interest_rate_bps
                .ok_or("--interest-rate-bps is required (or provide --input)")?,
            num_installments: args.num_installments,
            balance: args.balance,
            start: args.start,
            now: args.now.ok_or("--now is required (or provide --input)")?,
            installments_paid: args.installments_paid,
        }
    };

    let terms = accrual_input.terms();
    terms.validate()?;
    let close = accrual::close_amount(
        &terms,
        accrual_input.balance(),
        accrual_input.start,
        accrual_input.now,
        accrual_input.installments_paid,
    )?;
    Ok(json!({
        "close_amount": close,
        "balance": accrual_input.balance(),
        "num_installments": accrual_input.num_installments,
    }))
}
