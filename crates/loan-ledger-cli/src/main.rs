mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::accrual::{CloseAmountArgs, MinPaymentArgs};
use commands::fees::FeeQuoteArgs;
use commands::rollover::RolloverPreviewArgs;

/// Collateralized-loan servicing calculations
#[derive(Parser)]
#[command(
    name = "lledger",
    version,
    about = "Collateralized-loan servicing calculations",
    long_about = "A CLI for loan-ledger servicing arithmetic with decimal precision. \
                  Computes installment minimums with compounding late fees, close \
                  amounts, rollover settlement flows, and protocol fee quotes."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Minimum payment due on an installment loan
    MinPayment(MinPaymentArgs),
    /// Amount required to close a loan outright
    CloseAmount(CloseAmountArgs),
    /// Settlement flows for a prospective rollover
    RolloverPreview(RolloverPreviewArgs),
    /// Quote a protocol fee at a basis-point rate
    FeeQuote(FeeQuoteArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::MinPayment(args) => commands::accrual::run_min_payment(args),
        Commands::CloseAmount(args) => commands::accrual::run_close_amount(args),
        Commands::RolloverPreview(args) => commands::rollover::run_rollover_preview(args),
        Commands::FeeQuote(args) => commands::fees::run_fee_quote(args),
        Commands::Version => {
            println!("lledger {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
