use chrono::NaiveDate;
use clap::Args;
use serde::Deserialize;
use serde_json::Value;

use fund_waterfall_core::waterfall::carry::CarriedInterestTerm;
use fund_waterfall_core::{accrue_carry, accrue_carry_series, FundCashFlow};

use crate::input;

#[derive(Deserialize)]
struct AccrueInput {
    term: CarriedInterestTerm,
    cash_flows: Vec<FundCashFlow>,
    #[serde(default)]
    as_of_date: Option<NaiveDate>,
    #[serde(default)]
    dates: Vec<NaiveDate>,
}

/// Arguments for carry accrual
#[derive(Args)]
pub struct AccrueArgs {
    /// Path to a JSON or YAML file with `term`, `cash_flows` and a date
    #[arg(long)]
    pub input: Option<String>,

    /// Snapshot date (YYYY-MM-DD); repeat or comma-separate for a series
    #[arg(long, value_delimiter = ',')]
    pub as_of: Option<Vec<NaiveDate>>,
}

pub fn run_accrue(args: AccrueArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let accrue_input: AccrueInput = input::load(args.input.as_deref(), "carry accrual")?;

    let mut dates = args.as_of.unwrap_or_default();
    if dates.is_empty() {
        dates = accrue_input.dates.clone();
    }
    if dates.is_empty() {
        if let Some(date) = accrue_input.as_of_date {
            dates.push(date);
        }
    }

    match dates.as_slice() {
        [] => Err("--as-of <YYYY-MM-DD> or an as_of_date in the input is required".into()),
        [date] => {
            let accrual = accrue_carry(&accrue_input.term, &accrue_input.cash_flows, *date)?;
            Ok(serde_json::to_value(accrual)?)
        }
        many => {
            let series = accrue_carry_series(&accrue_input.term, &accrue_input.cash_flows, many)?;
            Ok(serde_json::to_value(series)?)
        }
    }
}
