use chrono::NaiveDate;
use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;
use serde::Deserialize;

use fund_waterfall_core::returns::allocation::{InvestorClassResult, LpHolding};
use fund_waterfall_core::returns::performance::{IrrOutcome, PerformanceInput};
use fund_waterfall_core::scenario::evaluate::WaterfallScenario;
use fund_waterfall_core::waterfall::carry::CarriedInterestTerm;
use fund_waterfall_core::waterfall::deal_by_deal::DealByDealInput;
use fund_waterfall_core::FundCashFlow;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[napi]
pub fn evaluate_scenario(input_json: String) -> NapiResult<String> {
    let input: WaterfallScenario = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = fund_waterfall_core::evaluate_scenario(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn compare_scenarios(input_json: String) -> NapiResult<String> {
    let input: Vec<WaterfallScenario> =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = fund_waterfall_core::compare_scenarios(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn evaluate_deal_by_deal(input_json: String) -> NapiResult<String> {
    let input: DealByDealInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = fund_waterfall_core::evaluate_deal_by_deal(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Carry
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct AccrueInput {
    term: CarriedInterestTerm,
    cash_flows: Vec<FundCashFlow>,
    as_of_date: NaiveDate,
}

#[derive(Deserialize)]
struct AccrueSeriesInput {
    term: CarriedInterestTerm,
    cash_flows: Vec<FundCashFlow>,
    dates: Vec<NaiveDate>,
}

#[napi]
pub fn accrue_carry(input_json: String) -> NapiResult<String> {
    let input: AccrueInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = fund_waterfall_core::accrue_carry(&input.term, &input.cash_flows, input.as_of_date)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn accrue_carry_series(input_json: String) -> NapiResult<String> {
    let input: AccrueSeriesInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        fund_waterfall_core::accrue_carry_series(&input.term, &input.cash_flows, &input.dates)
            .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Returns
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct AllocateInput {
    class_result: InvestorClassResult,
    limited_partners: Vec<LpHolding>,
}

#[napi]
pub fn allocate_to_lps(input_json: String) -> NapiResult<String> {
    let input: AllocateInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        fund_waterfall_core::allocate_to_lps(&input.class_result, &input.limited_partners)
            .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn calculate_metrics(input_json: String) -> NapiResult<String> {
    let input: PerformanceInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = fund_waterfall_core::calculate_metrics(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

/// Periodic IRR of a JSON array of amounts, e.g. `["-100", "30", "130"]`.
#[napi]
pub fn irr(cash_flows_json: String) -> NapiResult<String> {
    let flows: Vec<Decimal> = serde_json::from_str(&cash_flows_json).map_err(to_napi_error)?;
    let outcome = IrrOutcome::from_solver(fund_waterfall_core::time_value::irr(&flows))
        .map_err(to_napi_error)?;
    serde_json::to_string(&outcome).map_err(to_napi_error)
}
