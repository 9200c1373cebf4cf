//! American (deal-by-deal) waterfall.
//!
//! Every realized deal runs its own synthesized waterfall, so carry earned on
//! winners is never netted against losers. The pooled European waterfall over
//! the same deals gives what the GP would have earned on the whole fund; any
//! excess of American over European carry is the GP's clawback exposure.

use std::collections::HashSet;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::*;
use crate::waterfall::carry::{self, CarriedInterestTerm};
use crate::waterfall::tiers::{self, TierBreakdownResult};
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// A single realized investment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Capital invested in the deal
    pub invested: Money,
    /// Gross proceeds realized at exit
    pub proceeds: Money,
    pub investment_date: NaiveDate,
    pub exit_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealByDealInput {
    pub term: CarriedInterestTerm,
    pub deals: Vec<Deal>,
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealResult {
    pub deal_id: String,
    pub deal_name: String,
    pub invested: Money,
    pub proceeds: Money,
    /// Hurdle compounded on this deal's capital to its exit
    pub preferred_return: Money,
    pub to_lp: Money,
    pub to_gp: Money,
    pub tier_breakdown: Vec<TierBreakdownResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealByDealResult {
    pub deals: Vec<DealResult>,
    pub total_invested: Money,
    pub total_proceeds: Money,
    pub american_to_lp: Money,
    pub american_to_gp: Money,
    /// Whole-fund comparison over the pooled deals
    pub european_to_lp: Money,
    pub european_to_gp: Money,
    pub european_tier_breakdown: Vec<TierBreakdownResult>,
    /// Carry the GP would have to return if the fund were settled on a
    /// whole-fund basis: `max(0, american_to_gp - european_to_gp)`
    pub clawback_exposure: Money,
}

// ---------------------------------------------------------------------------
// Calculation
// ---------------------------------------------------------------------------

pub fn evaluate_deal_by_deal(input: &DealByDealInput) -> EngineResult<DealByDealResult> {
    carry::validate_term(&input.term)?;
    validate_deals(&input.deals)?;

    let deals = input
        .deals
        .iter()
        .map(|deal| evaluate_deal(&input.term, deal))
        .collect::<EngineResult<Vec<_>>>()?;

    let total_invested: Money = input.deals.iter().map(|d| d.invested).sum();
    let total_proceeds: Money = input.deals.iter().map(|d| d.proceeds).sum();
    let american_to_lp: Money = deals.iter().map(|d| d.to_lp).sum();
    let american_to_gp: Money = deals.iter().map(|d| d.to_gp).sum();

    // Pooled hurdle runs every deal's capital to the fund's final exit.
    let final_exit = input
        .deals
        .iter()
        .map(|d| d.exit_date)
        .max()
        .ok_or_else(|| EngineError::invalid("deals", "At least one deal is required"))?;
    let contributions: Vec<(NaiveDate, Money)> = input
        .deals
        .iter()
        .map(|d| (d.investment_date, d.invested))
        .collect();
    let pooled_pref =
        carry::preferred_return_amount(&contributions, input.term.hurdle_rate, final_exit)?;
    let pooled_tiers = carry::synthesize_tiers(&input.term, total_invested, pooled_pref)?;
    let european_tier_breakdown = tiers::evaluate_tiers(&pooled_tiers, total_proceeds)?;
    let european = tiers::summarize(&european_tier_breakdown);

    let clawback_exposure = (american_to_gp - european.to_gp).max(Decimal::ZERO);
    if clawback_exposure > Decimal::ZERO {
        tracing::info!(
            %american_to_gp,
            european_to_gp = %european.to_gp,
            %clawback_exposure,
            "deal-by-deal carry exceeds whole-fund carry"
        );
    }

    Ok(DealByDealResult {
        deals,
        total_invested,
        total_proceeds,
        american_to_lp,
        american_to_gp,
        european_to_lp: european.to_lp,
        european_to_gp: european.to_gp,
        european_tier_breakdown,
        clawback_exposure,
    })
}

fn evaluate_deal(term: &CarriedInterestTerm, deal: &Deal) -> EngineResult<DealResult> {
    let preferred_return = carry::preferred_return_amount(
        &[(deal.investment_date, deal.invested)],
        term.hurdle_rate,
        deal.exit_date,
    )?;
    let tier_list = carry::synthesize_tiers(term, deal.invested, preferred_return)?;
    let tier_breakdown = tiers::evaluate_tiers(&tier_list, deal.proceeds)?;
    let totals = tiers::summarize(&tier_breakdown);

    tracing::debug!(deal_id = %deal.id, to_gp = %totals.to_gp, "deal waterfall evaluated");

    Ok(DealResult {
        deal_id: deal.id.clone(),
        deal_name: deal.name.clone(),
        invested: deal.invested,
        proceeds: deal.proceeds,
        preferred_return,
        to_lp: totals.to_lp,
        to_gp: totals.to_gp,
        tier_breakdown,
    })
}

fn validate_deals(deals: &[Deal]) -> EngineResult<()> {
    if deals.is_empty() {
        return Err(EngineError::invalid("deals", "At least one deal is required"));
    }
    let mut seen = HashSet::new();
    for (i, deal) in deals.iter().enumerate() {
        if deal.id.trim().is_empty() {
            return Err(EngineError::invalid(format!("deals[{i}].id"), "Deal id is required"));
        }
        if !seen.insert(deal.id.as_str()) {
            return Err(EngineError::invalid(
                format!("deals[{i}].id"),
                format!("Duplicate deal id '{}'", deal.id),
            ));
        }
        if deal.invested < Decimal::ZERO {
            return Err(EngineError::invalid(
                format!("deals[{i}].invested"),
                "Invested capital cannot be negative",
            ));
        }
        if deal.proceeds < Decimal::ZERO {
            return Err(EngineError::invalid(
                format!("deals[{i}].proceeds"),
                "Proceeds cannot be negative",
            ));
        }
        if deal.exit_date < deal.investment_date {
            return Err(EngineError::invalid(
                format!("deals[{i}].exit_date"),
                "Exit date precedes investment date",
            ));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
