use clap::Args;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use fund_waterfall_core::scenario::evaluate::WaterfallScenario;
use fund_waterfall_core::waterfall::deal_by_deal::{self, DealByDealInput};
use fund_waterfall_core::waterfall::tiers::{self, TierDefinition};
use fund_waterfall_core::{compare_scenarios, evaluate_scenario};

use crate::input;

/// Arguments for a single scenario evaluation
#[derive(Args)]
pub struct EvaluateArgs {
    /// Path to a JSON or YAML scenario file
    #[arg(long)]
    pub input: Option<String>,

    /// Override the scenario's exit value
    #[arg(long)]
    pub exit_value: Option<Decimal>,
}

pub fn run_evaluate(args: EvaluateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut scenario: WaterfallScenario = input::load(args.input.as_deref(), "scenario evaluation")?;
    if let Some(exit_value) = args.exit_value {
        scenario.exit_value = exit_value;
    }
    let result = evaluate_scenario(&scenario)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for a side-by-side comparison
#[derive(Args)]
pub struct CompareArgs {
    /// Path to a JSON or YAML file holding a list of scenarios
    #[arg(long)]
    pub input: Option<String>,

    /// Re-run the first scenario at each of these exit values instead
    /// (comma-separated, e.g. "50000000,100000000")
    #[arg(long, value_delimiter = ',')]
    pub exit_values: Option<Vec<Decimal>>,
}

pub fn run_compare(args: CompareArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut scenarios: Vec<WaterfallScenario> = input::load(args.input.as_deref(), "comparison")?;

    if let Some(exits) = args.exit_values {
        let base = scenarios
            .first()
            .cloned()
            .ok_or("at least one scenario is required")?;
        scenarios = exits
            .into_iter()
            .map(|exit_value| {
                let mut s = base.clone();
                s.id = format!("{}@{}", base.id, exit_value);
                s.exit_value = exit_value;
                s
            })
            .collect();
    }

    let comparison = compare_scenarios(&scenarios)?;
    Ok(serde_json::to_value(comparison)?)
}

#[derive(Deserialize)]
struct TiersInput {
    tiers: Vec<TierDefinition>,
    proceeds: Decimal,
}

/// Arguments for a bare tier walk
#[derive(Args)]
pub struct TiersArgs {
    /// Path to a JSON or YAML file with `tiers` and `proceeds`
    #[arg(long)]
    pub input: Option<String>,

    /// Override the proceeds to distribute
    #[arg(long)]
    pub proceeds: Option<Decimal>,
}

pub fn run_tiers(args: TiersArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let tiers_input: TiersInput = input::load(args.input.as_deref(), "tier evaluation")?;
    let proceeds = args.proceeds.unwrap_or(tiers_input.proceeds);
    let breakdown = tiers::evaluate_tiers(&tiers_input.tiers, proceeds)?;
    Ok(serde_json::to_value(breakdown)?)
}

/// Arguments for the deal-by-deal waterfall
#[derive(Args)]
pub struct DealByDealArgs {
    /// Path to a JSON or YAML file with `term` and `deals`
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_deal_by_deal(args: DealByDealArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let deal_input: DealByDealInput = input::load(args.input.as_deref(), "deal-by-deal waterfall")?;
    let result = deal_by_deal::evaluate_deal_by_deal(&deal_input)?;
    Ok(serde_json::to_value(result)?)
}
