use clap::Args;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use fund_waterfall_core::returns::allocation::{InvestorClassResult, LpHolding};
use fund_waterfall_core::returns::performance::{IrrOutcome, PerformanceInput};
use fund_waterfall_core::{allocate_to_lps, calculate_metrics, time_value};

use crate::input;

/// Arguments for fund performance metrics
#[derive(Args)]
pub struct MetricsArgs {
    /// Path to a JSON or YAML file with contributions, distributions and NAV
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_metrics(args: MetricsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let perf_input: PerformanceInput = input::load(args.input.as_deref(), "performance metrics")?;
    let result = calculate_metrics(&perf_input)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for a periodic IRR
#[derive(Args)]
pub struct IrrArgs {
    /// Periodic cash flows (comma-separated, e.g. "-100,30,30,130")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub cash_flows: Vec<Decimal>,
}

pub fn run_irr(args: IrrArgs) -> Result<Value, Box<dyn std::error::Error>> {
    if args.cash_flows.is_empty() {
        return Err("--cash-flows is required".into());
    }
    let irr = IrrOutcome::from_solver(time_value::irr(&args.cash_flows))?;
    Ok(json!({ "irr": irr }))
}

#[derive(Deserialize)]
struct AllocateInput {
    class_result: InvestorClassResult,
    limited_partners: Vec<LpHolding>,
}

/// Arguments for the LP drill-down
#[derive(Args)]
pub struct AllocateArgs {
    /// Path to a JSON or YAML file with `class_result` and `limited_partners`
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_allocate(args: AllocateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let alloc_input: AllocateInput = input::load(args.input.as_deref(), "LP allocation")?;
    let allocations = allocate_to_lps(&alloc_input.class_result, &alloc_input.limited_partners)?;
    Ok(serde_json::to_value(allocations)?)
}
