use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::returns::performance::IrrOutcome;
use crate::types::*;
use crate::waterfall::tiers::TierBreakdownResult;
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// A class of limited partners sharing the same economic terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestorClass {
    pub id: String,
    pub name: String,
    pub commitment: Money,
    /// Capital contributed to date
    pub contributed: Money,
    /// Optional LP holdings for drill-down during scenario evaluation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub limited_partners: Vec<LpHolding>,
}

/// One LP's position inside an investor class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LpHolding {
    pub lp_id: String,
    pub name: String,
    /// Share of the class (not the fund), on a 0-100 scale
    pub ownership_percentage: Percent,
    pub commitment: Money,
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Class-level outcome of a distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestorClassResult {
    pub class_id: String,
    pub class_name: String,
    pub invested: Money,
    pub returned: Money,
    pub net_return: Money,
    pub multiple: Multiple,
    pub irr: IrrOutcome,
}

/// One LP's pro-rata slice of its class result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LpAllocation {
    pub lp_id: String,
    pub name: String,
    pub ownership_percentage: Percent,
    /// Normalized fraction of the class actually applied
    pub share: Rate,
    pub commitment: Money,
    pub invested: Money,
    pub returned: Money,
    pub net_return: Money,
    pub multiple: Multiple,
}

// ---------------------------------------------------------------------------
// LP drill-down
// ---------------------------------------------------------------------------

/// Pro-rate a class result down to its LPs.
///
/// Each LP's share is its ownership divided by the observed ownership total,
/// so holdings that do not add up to exactly 100 are normalized rather than
/// rejected. A zero total fails with `NoOwnershipData`.
pub fn allocate_to_lps(
    class_result: &InvestorClassResult,
    lps: &[LpHolding],
) -> EngineResult<Vec<LpAllocation>> {
    for (i, lp) in lps.iter().enumerate() {
        if lp.ownership_percentage < Decimal::ZERO {
            return Err(EngineError::invalid(
                format!("limited_partners[{i}].ownership_percentage"),
                "Ownership percentage cannot be negative",
            ));
        }
    }

    let share_denominator = ownership_total(lps);
    if share_denominator.is_zero() {
        return Err(EngineError::NoOwnershipData {
            class_id: class_result.class_id.clone(),
        });
    }
    if ownership_is_normalized(lps) {
        tracing::warn!(
            class_id = %class_result.class_id,
            total = %share_denominator,
            "LP ownership does not sum to 100; normalizing by observed total"
        );
    }

    Ok(lps
        .iter()
        .map(|lp| {
            let share = lp.ownership_percentage / share_denominator;
            let invested = class_result.invested * share;
            let returned = class_result.returned * share;
            let multiple = if invested > Decimal::ZERO {
                returned / invested
            } else {
                Decimal::ZERO
            };
            LpAllocation {
                lp_id: lp.lp_id.clone(),
                name: lp.name.clone(),
                ownership_percentage: lp.ownership_percentage,
                share,
                commitment: lp.commitment,
                invested,
                returned,
                net_return: class_result.net_return * share,
                multiple,
            }
        })
        .collect())
}

pub fn ownership_total(lps: &[LpHolding]) -> Percent {
    lps.iter().map(|lp| lp.ownership_percentage).sum()
}

/// True when ownership must be rescaled because it does not total 100.
pub fn ownership_is_normalized(lps: &[LpHolding]) -> bool {
    let total = ownership_total(lps);
    !total.is_zero() && total != dec!(100)
}

// ---------------------------------------------------------------------------
// Class split
// ---------------------------------------------------------------------------

/// Split each tier's LP side across investor classes.
///
/// Targeted tiers pay their whole LP side to the target class. Untargeted
/// tiers are split pro rata to capital contributed (commitment when nothing
/// has been called yet). Each slice is rounded toward zero to minor units
/// and the rounding remainder goes to the class with the largest weight, so
/// the class totals add back to the LP total exactly.
///
/// Returns the amount returned to each class, in `classes` order.
pub fn distribute_to_classes(
    breakdown: &[TierBreakdownResult],
    classes: &[InvestorClass],
) -> EngineResult<Vec<Money>> {
    if classes.is_empty() {
        return Err(EngineError::invalid(
            "investor_classes",
            "At least one investor class is required",
        ));
    }

    let weights = class_weights(classes);
    let anchor = weights
        .iter()
        .enumerate()
        .fold(0, |best, (i, w)| if *w > weights[best] { i } else { best });

    let mut returned = vec![Decimal::ZERO; classes.len()];

    for tier in breakdown {
        if tier.lp_amount.is_zero() {
            continue;
        }
        if let Some(target) = &tier.allocation_target {
            let idx = classes.iter().position(|c| &c.id == target).ok_or_else(|| {
                EngineError::invalid(
                    "allocation_target",
                    format!("Tier '{}' targets unknown investor class '{target}'", tier.tier_name),
                )
            })?;
            returned[idx] += tier.lp_amount;
            continue;
        }

        let mut allocated = Decimal::ZERO;
        for (i, weight) in weights.iter().enumerate() {
            let slice = (tier.lp_amount * weight)
                .round_dp_with_strategy(MINOR_UNIT_DP, RoundingStrategy::ToZero);
            returned[i] += slice;
            allocated += slice;
        }
        returned[anchor] += tier.lp_amount - allocated;
    }

    Ok(returned)
}

/// Pro-rata weights by contributed capital, falling back to commitment and
/// then to equal weights.
fn class_weights(classes: &[InvestorClass]) -> Vec<Rate> {
    let contributed: Money = classes.iter().map(|c| c.contributed).sum();
    if contributed > Decimal::ZERO {
        return classes.iter().map(|c| c.contributed / contributed).collect();
    }
    let committed: Money = classes.iter().map(|c| c.commitment).sum();
    if committed > Decimal::ZERO {
        return classes.iter().map(|c| c.commitment / committed).collect();
    }
    let equal = Decimal::ONE / Decimal::from(classes.len() as u64);
    vec![equal; classes.len()]
}

/// Build a class result from its invested and returned amounts.
pub fn class_result(class: &InvestorClass, returned: Money, irr: IrrOutcome) -> InvestorClassResult {
    let invested = class.contributed;
    let multiple = if invested > Decimal::ZERO {
        returned / invested
    } else {
        Decimal::ZERO
    };
    InvestorClassResult {
        class_id: class.id.clone(),
        class_name: class.name.clone(),
        invested,
        returned,
        net_return: returned - invested,
        multiple,
        irr,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::returns::performance::IrrUnavailable;
    use crate::waterfall::tiers::TierType;
    use rust_decimal_macros::dec;

    fn class_result_fixture() -> InvestorClassResult {
        InvestorClassResult {
            class_id: "A".into(),
            class_name: "Class A".into(),
            invested: dec!(1000000),
            returned: dec!(2500000),
            net_return: dec!(1500000),
            multiple: dec!(2.5),
            irr: IrrOutcome::Unavailable(IrrUnavailable::NotDated),
        }
    }

    fn lp(id: &str, pct: Decimal) -> LpHolding {
        LpHolding {
            lp_id: id.into(),
            name: format!("LP {id}"),
            ownership_percentage: pct,
            commitment: dec!(1000),
        }
    }

    fn investor_class(id: &str, contributed: Money) -> InvestorClass {
        InvestorClass {
            id: id.into(),
            name: format!("Class {id}"),
            commitment: contributed,
            contributed,
            limited_partners: vec![],
        }
    }

    fn lp_tier(lp_amount: Money, target: Option<&str>) -> TierBreakdownResult {
        TierBreakdownResult {
            tier_name: "Residual Split".into(),
            tier_type: TierType::ResidualSplit,
            total_amount: lp_amount,
            cumulative_amount: lp_amount,
            lp_amount,
            gp_amount: Decimal::ZERO,
            remaining: Decimal::ZERO,
            allocation_target: target.map(String::from),
        }
    }

    #[test]
    fn test_allocate_exact_hundred() {
        let lps = vec![lp("1", dec!(60)), lp("2", dec!(40))];
        let out = allocate_to_lps(&class_result_fixture(), &lps).unwrap();
        assert_eq!(out[0].returned, dec!(1500000));
        assert_eq!(out[1].returned, dec!(1000000));
        assert_eq!(out[0].invested, dec!(600000));
        assert_eq!(out[0].net_return, dec!(900000));
        assert_eq!(out[0].multiple, dec!(2.5));
        assert!(!ownership_is_normalized(&lps));
    }

    #[test]
    fn test_allocate_normalizes_by_observed_sum() {
        // Ownership totals 80: each LP is scaled by 1/80
        let lps = vec![lp("1", dec!(60)), lp("2", dec!(20))];
        let out = allocate_to_lps(&class_result_fixture(), &lps).unwrap();
        assert_eq!(out[0].share, dec!(0.75));
        assert_eq!(out[1].share, dec!(0.25));
        let total: Money = out.iter().map(|a| a.returned).sum();
        assert_eq!(total, dec!(2500000));
        assert!(ownership_is_normalized(&lps));
    }

    #[test]
    fn test_allocate_no_ownership() {
        let err = allocate_to_lps(&class_result_fixture(), &[lp("1", Decimal::ZERO)]).unwrap_err();
        match err {
            EngineError::NoOwnershipData { class_id } => assert_eq!(class_id, "A"),
            other => panic!("Expected NoOwnershipData, got: {other:?}"),
        }
        assert!(allocate_to_lps(&class_result_fixture(), &[]).is_err());
    }

    #[test]
    fn test_allocate_zero_invested_multiple_is_zero() {
        let mut result = class_result_fixture();
        result.invested = Decimal::ZERO;
        let out = allocate_to_lps(&result, &[lp("1", dec!(100))]).unwrap();
        assert_eq!(out[0].multiple, Decimal::ZERO);
    }

    #[test]
    fn test_allocate_thirds_reconstructs_within_tolerance() {
        let lps = vec![lp("1", dec!(1)), lp("2", dec!(1)), lp("3", dec!(1))];
        let out = allocate_to_lps(&class_result_fixture(), &lps).unwrap();
        let total: Money = out.iter().map(|a| a.returned).sum();
        let rel = ((total - dec!(2500000)) / dec!(2500000)).abs();
        assert!(rel < dec!(0.000001));
    }

    #[test]
    fn test_distribute_pro_rata_with_remainder() {
        let classes = vec![investor_class("A", dec!(2)), investor_class("B", dec!(1))];
        let out = distribute_to_classes(&[lp_tier(dec!(100), None)], &classes).unwrap();
        // 66.666.. -> 66.66, 33.333.. -> 33.33, remainder 0.01 to A
        assert_eq!(out, vec![dec!(66.67), dec!(33.33)]);
        assert_eq!(out.iter().copied().sum::<Decimal>(), dec!(100));
    }

    #[test]
    fn test_distribute_targeted_tier() {
        let classes = vec![investor_class("A", dec!(50)), investor_class("B", dec!(50))];
        let out = distribute_to_classes(
            &[lp_tier(dec!(30), Some("B")), lp_tier(dec!(10), None)],
            &classes,
        )
        .unwrap();
        assert_eq!(out, vec![dec!(5), dec!(35)]);
    }

    #[test]
    fn test_distribute_unknown_target() {
        let classes = vec![investor_class("A", dec!(50))];
        assert!(distribute_to_classes(&[lp_tier(dec!(1), Some("Z"))], &classes).is_err());
    }

    #[test]
    fn test_weights_fall_back_to_commitment_then_equal() {
        let mut a = investor_class("A", Decimal::ZERO);
        a.commitment = dec!(30);
        let mut b = investor_class("B", Decimal::ZERO);
        b.commitment = dec!(10);
        assert_eq!(class_weights(&[a, b]), vec![dec!(0.75), dec!(0.25)]);

        let c = investor_class("C", Decimal::ZERO);
        let d = investor_class("D", Decimal::ZERO);
        assert_eq!(class_weights(&[c, d]), vec![dec!(0.5), dec!(0.5)]);
    }

    #[test]
    fn test_class_result_net_return() {
        let r = class_result(
            &investor_class("A", dec!(40)),
            dec!(88),
            IrrOutcome::Unavailable(IrrUnavailable::NotDated),
        );
        assert_eq!(r.net_return, dec!(48));
        assert_eq!(r.multiple, dec!(2.2));
    }
}
