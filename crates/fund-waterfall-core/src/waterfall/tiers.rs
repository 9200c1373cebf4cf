use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::*;
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// Distribution mechanics a tier represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TierType {
    /// Return of contributed capital
    ReturnOfCapital,
    /// Preferred return (hurdle) owed to LPs
    PreferredReturn,
    /// GP catch-up towards its target share of profits
    GpCatchUp,
    /// Residual carry split of everything above
    ResidualSplit,
}

impl TierType {
    pub fn label(&self) -> &'static str {
        match self {
            TierType::ReturnOfCapital => "Return of Capital",
            TierType::PreferredReturn => "Preferred Return",
            TierType::GpCatchUp => "GP Catch-Up",
            TierType::ResidualSplit => "Residual Split",
        }
    }
}

/// A single ordered step in the distribution waterfall.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierDefinition {
    /// Human-readable tier name
    pub name: String,
    pub tier_type: TierType,
    /// LP share of amounts flowing through this tier (0-100)
    pub lp_share_percent: Percent,
    /// GP share of amounts flowing through this tier (0-100)
    pub gp_share_percent: Percent,
    /// Cumulative proceeds at which the tier opens; defaults to the
    /// previous tier's end (zero for the first tier)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier_start: Option<Money>,
    /// Cumulative proceeds at which the tier is full; `None` = unbounded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier_end: Option<Money>,
    /// Investor class receiving this tier's entire LP side; `None` splits it
    /// across all classes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocation_target: Option<String>,
}

impl TierDefinition {
    pub fn new(tier_type: TierType, lp_share_percent: Percent, gp_share_percent: Percent) -> Self {
        TierDefinition {
            name: tier_type.label().to_string(),
            tier_type,
            lp_share_percent,
            gp_share_percent,
            tier_start: None,
            tier_end: None,
            allocation_target: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Bound the tier to `[start, end)` in cumulative proceeds.
    pub fn bounded(mut self, start: Money, end: Money) -> Self {
        self.tier_start = Some(start);
        self.tier_end = Some(end);
        self
    }

    /// Open-ended tier starting at `start`.
    pub fn starting_at(mut self, start: Money) -> Self {
        self.tier_start = Some(start);
        self.tier_end = None;
        self
    }

    pub fn targeting(mut self, class_id: impl Into<String>) -> Self {
        self.allocation_target = Some(class_id.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Result for a single evaluated tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierBreakdownResult {
    pub tier_name: String,
    pub tier_type: TierType,
    /// Amount allocated within this tier
    pub total_amount: Money,
    /// Running total of allocations through this tier
    pub cumulative_amount: Money,
    pub lp_amount: Money,
    pub gp_amount: Money,
    /// Proceeds still unallocated after this tier
    pub remaining: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocation_target: Option<String>,
}

/// LP/GP totals across a breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierTotals {
    pub total: Money,
    pub to_lp: Money,
    pub to_gp: Money,
}

/// A validated tier's absolute bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierBounds {
    pub start: Money,
    pub end: Option<Money>,
}

impl TierBounds {
    pub fn capacity(&self) -> Option<Money> {
        self.end.map(|end| end - self.start)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Check share percentages, ordering and contiguity, returning each tier's
/// resolved bounds.
pub fn validate_tiers(tiers: &[TierDefinition]) -> EngineResult<Vec<TierBounds>> {
    if tiers.is_empty() {
        return Err(EngineError::invalid(
            "tiers",
            "At least one waterfall tier is required",
        ));
    }

    let mut bounds = Vec::with_capacity(tiers.len());
    let mut previous_end = Some(Decimal::ZERO);
    let last = tiers.len() - 1;

    for (i, tier) in tiers.iter().enumerate() {
        let field = |name: &str| format!("tiers[{i}].{name}");

        for (pct, name) in [
            (tier.lp_share_percent, "lp_share_percent"),
            (tier.gp_share_percent, "gp_share_percent"),
        ] {
            if pct < Decimal::ZERO || pct > dec!(100) {
                return Err(EngineError::invalid(
                    field(name),
                    format!("Share must be between 0 and 100 (got {pct})"),
                ));
            }
        }
        let share_sum = tier.lp_share_percent + tier.gp_share_percent;
        if (share_sum - dec!(100)).abs() > PERCENT_TOLERANCE {
            return Err(EngineError::invalid(
                field("gp_share_percent"),
                format!("LP and GP shares must sum to 100 (got {share_sum})"),
            ));
        }

        // Only the final tier may be unbounded, so previous_end is Some here.
        let Some(expected_start) = previous_end else {
            return Err(EngineError::invalid(
                format!("tiers[{}].tier_end", i - 1),
                "Only the final tier may be unbounded",
            ));
        };
        let start = tier.tier_start.unwrap_or(expected_start);
        if start != expected_start {
            let reason = if i == 0 {
                format!("First tier must start at 0 (got {start})")
            } else {
                format!("Tier must start where the previous tier ends ({expected_start}), got {start}")
            };
            return Err(EngineError::invalid(field("tier_start"), reason));
        }

        if let Some(end) = tier.tier_end {
            if end < start {
                return Err(EngineError::invalid(
                    field("tier_end"),
                    format!("Tier end {end} precedes tier start {start}"),
                ));
            }
        } else if i != last {
            return Err(EngineError::invalid(
                field("tier_end"),
                "Only the final tier may be unbounded",
            ));
        }

        bounds.push(TierBounds {
            start,
            end: tier.tier_end,
        });
        previous_end = tier.tier_end;
    }

    Ok(bounds)
}

// ---------------------------------------------------------------------------
// Calculation
// ---------------------------------------------------------------------------

/// Walk `tiers` in order, allocating `proceeds`.
///
/// Each tier takes `min(remaining, tier_end - tier_start)` (everything left
/// when unbounded) and splits it by the tier's shares. The GP side is
/// rounded toward zero to currency minor units and the LP side takes the
/// remainder, so the split never shorts investors and never leaks.
pub fn evaluate_tiers(
    tiers: &[TierDefinition],
    proceeds: Money,
) -> EngineResult<Vec<TierBreakdownResult>> {
    if proceeds < Decimal::ZERO {
        return Err(EngineError::invalid(
            "proceeds",
            "Proceeds to distribute cannot be negative",
        ));
    }
    let bounds = validate_tiers(tiers)?;

    if let Some(Some(capacity_end)) = bounds.last().map(|b| b.end) {
        if proceeds > capacity_end {
            return Err(EngineError::invalid(
                "proceeds",
                format!(
                    "Proceeds {proceeds} exceed the waterfall's capacity {capacity_end}; \
                     the final tier must be unbounded or large enough"
                ),
            ));
        }
    }

    let mut remaining = proceeds;
    let mut cumulative = Decimal::ZERO;
    let mut results = Vec::with_capacity(tiers.len());

    for (tier, bound) in tiers.iter().zip(&bounds) {
        let amount = if bound.start >= proceeds {
            Decimal::ZERO
        } else {
            match bound.capacity() {
                Some(capacity) => remaining.min(capacity),
                None => remaining,
            }
        };
        let (lp_amount, gp_amount) = split_amount(amount, tier.gp_share_percent);
        remaining -= amount;
        cumulative += amount;

        results.push(TierBreakdownResult {
            tier_name: tier.name.clone(),
            tier_type: tier.tier_type,
            total_amount: amount,
            cumulative_amount: cumulative,
            lp_amount,
            gp_amount,
            remaining,
            allocation_target: tier.allocation_target.clone(),
        });
    }

    debug_assert_eq!(cumulative, proceeds, "tier walk leaked proceeds");
    debug_assert!(remaining.is_zero());

    Ok(results)
}

/// Split `amount` into `(lp, gp)`; the GP side is rounded toward zero to
/// minor units.
pub fn split_amount(amount: Money, gp_share_percent: Percent) -> (Money, Money) {
    let gp = (amount * gp_share_percent / dec!(100))
        .round_dp_with_strategy(MINOR_UNIT_DP, RoundingStrategy::ToZero)
        .min(amount);
    (amount - gp, gp)
}

/// Aggregate LP/GP totals across a breakdown.
pub fn summarize(breakdown: &[TierBreakdownResult]) -> TierTotals {
    breakdown.iter().fold(
        TierTotals {
            total: Decimal::ZERO,
            to_lp: Decimal::ZERO,
            to_gp: Decimal::ZERO,
        },
        |acc, t| TierTotals {
            total: acc.total + t.total_amount,
            to_lp: acc.to_lp + t.lp_amount,
            to_gp: acc.to_gp + t.gp_amount,
        },
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
