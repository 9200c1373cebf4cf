//! Fund performance metrics: IRR, MOIC, DPI, TVPI, RVPI.
//!
//! IRR failures (no sign change, no convergence) never abort the
//! calculation. They are reported as [`IrrOutcome::Unavailable`] alongside
//! the multiples, which do not depend on the solver.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::time_value;
use crate::types::*;
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Why an IRR could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IrrUnavailable {
    /// Flows never change sign, so no rate zeroes the NPV
    NoSignChange,
    /// Solver hit its iteration cap
    DidNotConverge { iterations: u32 },
    /// No dates were supplied, so flows cannot be placed in time
    NotDated,
}

/// IRR result; `Unavailable` must be rendered as "not computable", never as 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IrrOutcome {
    Computed(Rate),
    Unavailable(IrrUnavailable),
}

impl IrrOutcome {
    pub fn rate(&self) -> Option<Rate> {
        match self {
            IrrOutcome::Computed(r) => Some(*r),
            IrrOutcome::Unavailable(_) => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, IrrOutcome::Computed(_))
    }

    /// Convert a solver result, keeping non-IRR errors as errors.
    pub fn from_solver(result: EngineResult<Rate>) -> EngineResult<Self> {
        match result {
            Ok(rate) => Ok(IrrOutcome::Computed(rate)),
            Err(EngineError::NoSignChange) => {
                Ok(IrrOutcome::Unavailable(IrrUnavailable::NoSignChange))
            }
            Err(EngineError::DidNotConverge { iterations, .. }) => Ok(IrrOutcome::Unavailable(
                IrrUnavailable::DidNotConverge { iterations },
            )),
            Err(other) => Err(other),
        }
    }
}

/// Input for the performance calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceInput {
    /// Capital calls, as positive amounts
    pub contributions: Vec<CashFlow>,
    /// Distributions to investors, as positive amounts
    pub distributions: Vec<CashFlow>,
    /// Current net asset value of unrealized holdings
    pub current_nav: Money,
    /// Date the NAV is struck; defaults to the latest flow date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valuation_date: Option<NaiveDate>,
}

/// MOIC, DPI, RVPI and TVPI for a set of totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Multiples {
    pub moic: Multiple,
    pub dpi: Multiple,
    pub tvpi: Multiple,
    pub rvpi: Multiple,
}

/// Full performance output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub irr: IrrOutcome,
    pub moic: Multiple,
    pub dpi: Multiple,
    pub tvpi: Multiple,
    pub rvpi: Multiple,
    pub total_contributions: Money,
    pub total_distributions: Money,
    pub current_nav: Money,
}

impl PerformanceMetrics {
    pub fn from_parts(
        irr: IrrOutcome,
        multiples: Multiples,
        total_contributions: Money,
        total_distributions: Money,
        current_nav: Money,
    ) -> Self {
        PerformanceMetrics {
            irr,
            moic: multiples.moic,
            dpi: multiples.dpi,
            tvpi: multiples.tvpi,
            rvpi: multiples.rvpi,
            total_contributions,
            total_distributions,
            current_nav,
        }
    }
}

// ---------------------------------------------------------------------------
// Calculation
// ---------------------------------------------------------------------------

/// Multiples from totals. Fails with `NoCapitalInvested` when nothing was
/// contributed.
pub fn multiples(
    total_contributions: Money,
    total_distributions: Money,
    current_nav: Money,
) -> EngineResult<Multiples> {
    if total_contributions <= Decimal::ZERO {
        return Err(EngineError::NoCapitalInvested);
    }
    let dpi = total_distributions / total_contributions;
    let rvpi = current_nav / total_contributions;
    Ok(Multiples {
        moic: (total_distributions + current_nav) / total_contributions,
        dpi,
        tvpi: dpi + rvpi,
        rvpi,
    })
}

/// Compute IRR and multiples from dated contributions, distributions and NAV.
pub fn calculate_metrics(input: &PerformanceInput) -> EngineResult<PerformanceMetrics> {
    validate_input(input)?;

    let total_contributions: Money = input.contributions.iter().map(|cf| cf.amount).sum();
    let total_distributions: Money = input.distributions.iter().map(|cf| cf.amount).sum();
    let ratios = multiples(total_contributions, total_distributions, input.current_nav)?;

    let irr = IrrOutcome::from_solver(time_value::xirr(&merged_series(input)))?;
    if let IrrOutcome::Unavailable(reason) = &irr {
        tracing::warn!(?reason, "IRR unavailable; multiples still reported");
    }

    Ok(PerformanceMetrics::from_parts(
        irr,
        ratios,
        total_contributions,
        total_distributions,
        input.current_nav,
    ))
}

/// Convenience form taking the three series directly; NAV is dated at the
/// latest flow.
pub fn metrics(
    contributions: &[CashFlow],
    distributions: &[CashFlow],
    current_nav: Money,
) -> EngineResult<PerformanceMetrics> {
    calculate_metrics(&PerformanceInput {
        contributions: contributions.to_vec(),
        distributions: distributions.to_vec(),
        current_nav,
        valuation_date: None,
    })
}

/// Date-sorted signed series: contributions negative, distributions and a
/// terminal NAV positive.
fn merged_series(input: &PerformanceInput) -> Vec<(NaiveDate, Money)> {
    let mut series: Vec<(NaiveDate, Money)> = input
        .contributions
        .iter()
        .map(|cf| (cf.date, -cf.amount))
        .chain(input.distributions.iter().map(|cf| (cf.date, cf.amount)))
        .collect();

    if !input.current_nav.is_zero() {
        let nav_date = input
            .valuation_date
            .or_else(|| series.iter().map(|(d, _)| *d).max());
        if let Some(date) = nav_date {
            series.push((date, input.current_nav));
        }
    }

    series.sort_by_key(|(date, _)| *date);
    series
}

fn validate_input(input: &PerformanceInput) -> EngineResult<()> {
    for (i, cf) in input.contributions.iter().enumerate() {
        if cf.amount < Decimal::ZERO {
            return Err(EngineError::invalid(
                format!("contributions[{i}].amount"),
                "Contributions are given as positive amounts",
            ));
        }
    }
    for (i, cf) in input.distributions.iter().enumerate() {
        if cf.amount < Decimal::ZERO {
            return Err(EngineError::invalid(
                format!("distributions[{i}].amount"),
                "Distributions are given as positive amounts",
            ));
        }
    }
    if input.current_nav < Decimal::ZERO {
        return Err(EngineError::invalid(
            "current_nav",
            "Net asset value cannot be negative",
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
