mod commands;
mod input;
mod logging;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::carry::AccrueArgs;
use commands::returns::{AllocateArgs, IrrArgs, MetricsArgs};
use commands::waterfall::{CompareArgs, DealByDealArgs, EvaluateArgs, TiersArgs};

/// Tiered distribution waterfalls and carried-interest accrual
#[derive(Parser)]
#[command(
    name = "waterfall",
    version,
    about = "Tiered distribution waterfalls and carried-interest accrual",
    long_about = "A CLI for running fund distribution waterfalls with decimal precision. \
                  Evaluates tiered scenarios, compares exit values, accrues and vests GP \
                  carry, and computes IRR, MOIC, DPI, TVPI and RVPI. Inputs are JSON or \
                  YAML files, or JSON piped on stdin."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log level for diagnostics on stderr (overridden by RUST_LOG)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a full waterfall scenario
    Evaluate(EvaluateArgs),
    /// Evaluate several scenarios side by side
    Compare(CompareArgs),
    /// Run proceeds through a list of tiers
    Tiers(TiersArgs),
    /// Accrue carried interest as of one or more dates
    Accrue(AccrueArgs),
    /// Pro-rate an investor class result to its LPs
    Allocate(AllocateArgs),
    /// Fund performance metrics (IRR, MOIC, DPI, TVPI, RVPI)
    Metrics(MetricsArgs),
    /// IRR of periodic cash flows
    Irr(IrrArgs),
    /// American (deal-by-deal) waterfall with clawback exposure
    DealByDeal(DealByDealArgs),
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
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Evaluate(args) => commands::waterfall::run_evaluate(args),
        Commands::Compare(args) => commands::waterfall::run_compare(args),
        Commands::Tiers(args) => commands::waterfall::run_tiers(args),
        Commands::Accrue(args) => commands::carry::run_accrue(args),
        Commands::Allocate(args) => commands::returns::run_allocate(args),
        Commands::Metrics(args) => commands::returns::run_metrics(args),
        Commands::Irr(args) => commands::returns::run_irr(args),
        Commands::DealByDeal(args) => commands::waterfall::run_deal_by_deal(args),
        Commands::Version => {
            println!("waterfall {}", env!("CARGO_PKG_VERSION"));
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
