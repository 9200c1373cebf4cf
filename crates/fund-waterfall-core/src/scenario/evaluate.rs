use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EvaluationStage};
use crate::returns::allocation::{self, InvestorClass, InvestorClassResult, LpAllocation};
use crate::returns::performance::{self, IrrOutcome, IrrUnavailable, PerformanceMetrics};
use crate::time_value;
use crate::types::*;
use crate::waterfall::carry::{self, CarriedInterestTerm, CarryAccrual};
use crate::waterfall::tiers::{self, TierBreakdownResult, TierDefinition};
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// Dates that place a scenario's capital and exit in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioTimeline {
    pub investment_date: NaiveDate,
    pub exit_date: NaiveDate,
}

/// A single what-if: an exit value run through a waterfall.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterfallScenario {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Total proceeds to distribute
    pub exit_value: Money,
    /// Ordered tiers; when empty the waterfall is synthesized from
    /// `carry_term`
    #[serde(default)]
    pub tiers: Vec<TierDefinition>,
    pub investor_classes: Vec<InvestorClass>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carry_term: Option<CarriedInterestTerm>,
    /// Enables dated IRRs and hurdle compounding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<ScenarioTimeline>,
    /// Fund ledger for the carry stage
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub carry_cash_flows: Vec<FundCashFlow>,
    /// Carry snapshot date; defaults to the exit date, then the latest flow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_of_date: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterfallResult {
    pub scenario_id: String,
    pub scenario_name: String,
    pub exit_value: Money,
    pub tier_breakdown: Vec<TierBreakdownResult>,
    pub investor_class_results: Vec<InvestorClassResult>,
    /// LP-net fund metrics: class contributions in, LP distributions out
    pub metrics: PerformanceMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carry: Option<CarryAccrual>,
    /// LP drill-down keyed by class id, for classes that list holdings
    pub lp_allocations: BTreeMap<String, Vec<LpAllocation>>,
    pub total_to_lp: Money,
    pub total_to_gp: Money,
    pub lp_pct_of_total: Percent,
    pub gp_pct_of_total: Percent,
    /// Last stage completed
    pub stage: EvaluationStage,
    pub warnings: Vec<String>,
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

/// Run a scenario through validation, the tier walk, carry accrual,
/// metrics and the LP drill-down, in that order.
///
/// Any failure aborts the run and is wrapped in `StageFailed` naming the
/// stage that failed. IRR failures are not failures: they surface as
/// unavailable IRRs plus a warning.
pub fn evaluate_scenario(scenario: &WaterfallScenario) -> EngineResult<WaterfallResult> {
    let mut warnings = Vec::new();

    let tier_list = at(EvaluationStage::Validated, validate_scenario(scenario))?;
    if scenario.tiers.is_empty() {
        warnings.push("Tiers synthesized from the carry term".to_string());
    }
    tracing::debug!(scenario_id = %scenario.id, tiers = tier_list.len(), "scenario validated");

    let tier_breakdown = at(
        EvaluationStage::TiersEvaluated,
        tiers::evaluate_tiers(&tier_list, scenario.exit_value),
    )?;
    let totals = tiers::summarize(&tier_breakdown);
    tracing::debug!(
        scenario_id = %scenario.id,
        to_lp = %totals.to_lp,
        to_gp = %totals.to_gp,
        "tiers evaluated"
    );

    let carry = at(EvaluationStage::CarryAccrued, carry_stage(scenario))?;
    if let Some(accrual) = &carry {
        tracing::debug!(
            scenario_id = %scenario.id,
            accrued = %accrual.accrued_carry,
            "carry accrued"
        );
    }

    let (investor_class_results, metrics) = at(
        EvaluationStage::MetricsComputed,
        metrics_stage(scenario, &tier_breakdown, totals.to_lp),
    )?;
    // Undated scenarios never have an IRR; only solver failures are news.
    if let IrrOutcome::Unavailable(reason) = &metrics.irr {
        if *reason != IrrUnavailable::NotDated {
            warnings.push(format!("Fund IRR unavailable: {reason:?}"));
        }
    }
    tracing::debug!(scenario_id = %scenario.id, moic = %metrics.moic, "metrics computed");

    let lp_allocations = at(
        EvaluationStage::LpsAllocated,
        lp_stage(scenario, &investor_class_results, &mut warnings),
    )?;
    tracing::debug!(
        scenario_id = %scenario.id,
        classes = lp_allocations.len(),
        "LPs allocated"
    );

    let (lp_pct_of_total, gp_pct_of_total) = if scenario.exit_value > Decimal::ZERO {
        (
            totals.to_lp / scenario.exit_value * dec!(100),
            totals.to_gp / scenario.exit_value * dec!(100),
        )
    } else {
        (Decimal::ZERO, Decimal::ZERO)
    };

    Ok(WaterfallResult {
        scenario_id: scenario.id.clone(),
        scenario_name: scenario.name.clone(),
        exit_value: scenario.exit_value,
        tier_breakdown,
        investor_class_results,
        metrics,
        carry,
        lp_allocations,
        total_to_lp: totals.to_lp,
        total_to_gp: totals.to_gp,
        lp_pct_of_total,
        gp_pct_of_total,
        stage: EvaluationStage::Done,
        warnings,
    })
}

fn at<T>(stage: EvaluationStage, result: EngineResult<T>) -> EngineResult<T> {
    result.map_err(|source| {
        tracing::warn!(%stage, error = %source, "scenario evaluation aborted");
        EngineError::StageFailed {
            stage,
            source: Box::new(source),
        }
    })
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// Validate the scenario and resolve the tier list it will run.
fn validate_scenario(scenario: &WaterfallScenario) -> EngineResult<Vec<TierDefinition>> {
    if scenario.id.trim().is_empty() {
        return Err(EngineError::invalid("id", "Scenario id is required"));
    }
    if scenario.exit_value < Decimal::ZERO {
        return Err(EngineError::invalid(
            "exit_value",
            "Exit value cannot be negative",
        ));
    }
    validate_classes(&scenario.investor_classes)?;

    if let Some(timeline) = &scenario.timeline {
        if timeline.exit_date <= timeline.investment_date {
            return Err(EngineError::invalid(
                "timeline.exit_date",
                "Exit date must fall after the investment date",
            ));
        }
    }
    if let Some(term) = &scenario.carry_term {
        carry::validate_term(term)?;
    }

    let tier_list = if scenario.tiers.is_empty() {
        let Some(term) = &scenario.carry_term else {
            return Err(EngineError::invalid(
                "tiers",
                "Either tiers or a carry term is required",
            ));
        };
        let contributed: Money = scenario.investor_classes.iter().map(|c| c.contributed).sum();
        let preferred = match &scenario.timeline {
            Some(t) => carry::preferred_return_amount(
                &[(t.investment_date, contributed)],
                term.hurdle_rate,
                t.exit_date,
            )?,
            None => Decimal::ZERO,
        };
        carry::synthesize_tiers(term, contributed, preferred)?
    } else {
        scenario.tiers.clone()
    };

    tiers::validate_tiers(&tier_list)?;
    for (i, tier) in tier_list.iter().enumerate() {
        if let Some(target) = &tier.allocation_target {
            if !scenario.investor_classes.iter().any(|c| &c.id == target) {
                return Err(EngineError::invalid(
                    format!("tiers[{i}].allocation_target"),
                    format!("Unknown investor class '{target}'"),
                ));
            }
        }
    }

    Ok(tier_list)
}

fn validate_classes(classes: &[InvestorClass]) -> EngineResult<()> {
    if classes.is_empty() {
        return Err(EngineError::invalid(
            "investor_classes",
            "At least one investor class is required",
        ));
    }
    let mut seen = HashSet::new();
    for (i, class) in classes.iter().enumerate() {
        if !seen.insert(class.id.as_str()) {
            return Err(EngineError::invalid(
                format!("investor_classes[{i}].id"),
                format!("Duplicate investor class id '{}'", class.id),
            ));
        }
        if class.commitment < Decimal::ZERO {
            return Err(EngineError::invalid(
                format!("investor_classes[{i}].commitment"),
                "Commitment cannot be negative",
            ));
        }
        if class.contributed < Decimal::ZERO {
            return Err(EngineError::invalid(
                format!("investor_classes[{i}].contributed"),
                "Contributed capital cannot be negative",
            ));
        }
    }
    Ok(())
}

fn carry_stage(scenario: &WaterfallScenario) -> EngineResult<Option<CarryAccrual>> {
    let Some(term) = &scenario.carry_term else {
        return Ok(None);
    };
    if scenario.carry_cash_flows.is_empty() {
        return Ok(None);
    }
    let as_of = scenario
        .as_of_date
        .or_else(|| scenario.timeline.map(|t| t.exit_date))
        .or_else(|| scenario.carry_cash_flows.iter().map(|cf| cf.date).max());
    match as_of {
        Some(date) => carry::accrue_carry(term, &scenario.carry_cash_flows, date).map(Some),
        None => Ok(None),
    }
}

fn metrics_stage(
    scenario: &WaterfallScenario,
    breakdown: &[TierBreakdownResult],
    total_to_lp: Money,
) -> EngineResult<(Vec<InvestorClassResult>, PerformanceMetrics)> {
    let classes = &scenario.investor_classes;
    let returned = allocation::distribute_to_classes(breakdown, classes)?;

    let class_results = classes
        .iter()
        .zip(returned)
        .map(|(class, returned)| {
            let irr = dated_irr(scenario.timeline, class.contributed, returned)?;
            Ok(allocation::class_result(class, returned, irr))
        })
        .collect::<EngineResult<Vec<_>>>()?;

    let contributed: Money = classes.iter().map(|c| c.contributed).sum();
    let metrics = match scenario.timeline {
        Some(t) => performance::metrics(
            &[CashFlow::new(t.investment_date, contributed)],
            &[CashFlow::new(t.exit_date, total_to_lp)],
            Decimal::ZERO,
        )?,
        None => {
            let ratios = performance::multiples(contributed, total_to_lp, Decimal::ZERO)?;
            PerformanceMetrics::from_parts(
                IrrOutcome::Unavailable(IrrUnavailable::NotDated),
                ratios,
                contributed,
                total_to_lp,
                Decimal::ZERO,
            )
        }
    };

    Ok((class_results, metrics))
}

/// Two-flow IRR for a class: capital out at investment, proceeds back at exit.
fn dated_irr(
    timeline: Option<ScenarioTimeline>,
    invested: Money,
    returned: Money,
) -> EngineResult<IrrOutcome> {
    let Some(t) = timeline else {
        return Ok(IrrOutcome::Unavailable(IrrUnavailable::NotDated));
    };
    IrrOutcome::from_solver(time_value::xirr(&[
        (t.investment_date, -invested),
        (t.exit_date, returned),
    ]))
}

fn lp_stage(
    scenario: &WaterfallScenario,
    class_results: &[InvestorClassResult],
    warnings: &mut Vec<String>,
) -> EngineResult<BTreeMap<String, Vec<LpAllocation>>> {
    let mut out = BTreeMap::new();
    for (class, result) in scenario.investor_classes.iter().zip(class_results) {
        if class.limited_partners.is_empty() {
            continue;
        }
        if allocation::ownership_is_normalized(&class.limited_partners) {
            warnings.push(format!(
                "LP ownership in class '{}' sums to {}; normalized",
                class.id,
                allocation::ownership_total(&class.limited_partners)
            ));
        }
        let lps = allocation::allocate_to_lps(result, &class.limited_partners)?;
        out.insert(class.id.clone(), lps);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
