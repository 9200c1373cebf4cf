use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.08 = 8%).
pub type Rate = Decimal;

/// Percentages expressed on a 0-100 scale (20 = 20%). Used for tier
/// shares, carry and ownership, matching how term sheets quote them.
pub type Percent = Decimal;

/// Multiples (e.g., 1.5x MOIC)
pub type Multiple = Decimal;

/// Year fractions or counts
pub type Years = Decimal;

/// Decimal places of the currency minor unit used when splitting tiers.
pub const MINOR_UNIT_DP: u32 = 2;

/// Day-count basis for converting date differences into year fractions.
pub const DAYS_PER_YEAR: Decimal = dec!(365.25);

/// Tolerance applied when checking that percentages sum to 100.
pub const PERCENT_TOLERANCE: Decimal = dec!(0.000001);

/// A single cash flow at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlow {
    pub date: NaiveDate,
    pub amount: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl CashFlow {
    pub fn new(date: NaiveDate, amount: Money) -> Self {
        CashFlow {
            date,
            amount,
            label: None,
        }
    }
}

/// What a fund-level cash flow represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CashFlowKind {
    /// Capital called from LPs
    Contribution,
    /// Gross distribution out of the fund (LP and GP sides together)
    Distribution,
    /// Portion of distributions already paid to the GP as carry
    CarryPaid,
    /// Valuation of unrealized holdings; the latest mark wins
    NavMark,
}

/// A dated fund-level cash flow used by the carry tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundCashFlow {
    pub date: NaiveDate,
    /// Non-negative amount; direction comes from `kind`
    pub amount: Money,
    pub kind: CashFlowKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl FundCashFlow {
    pub fn new(date: NaiveDate, amount: Money, kind: CashFlowKind) -> Self {
        FundCashFlow {
            date,
            amount,
            kind,
            label: None,
        }
    }
}

/// Year fraction between two dates on the engine's day-count basis.
pub fn year_fraction(from: NaiveDate, to: NaiveDate) -> Years {
    Decimal::from((to - from).num_days()) / DAYS_PER_YEAR
}

/// Whole calendar months elapsed from `from` to `to` (zero if `to` precedes `from`).
pub fn months_between(from: NaiveDate, to: NaiveDate) -> u32 {
    use chrono::Datelike;

    if to <= from {
        return 0;
    }
    let mut months = (to.year() - from.year()) * 12 + to.month() as i32 - from.month() as i32;
    if to.day() < from.day() {
        months -= 1;
    }
    months.max(0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_months_between_partial_month() {
        assert_eq!(months_between(d(2020, 1, 15), d(2020, 3, 14)), 1);
        assert_eq!(months_between(d(2020, 1, 15), d(2020, 3, 15)), 2);
        assert_eq!(months_between(d(2020, 1, 31), d(2021, 1, 31)), 12);
    }

    #[test]
    fn test_months_between_reversed_is_zero() {
        assert_eq!(months_between(d(2022, 1, 1), d(2021, 1, 1)), 0);
    }

    #[test]
    fn test_year_fraction() {
        assert_eq!(year_fraction(d(2020, 1, 1), d(2020, 1, 1)), Decimal::ZERO);
        let y = year_fraction(d(2020, 1, 1), d(2021, 1, 1));
        assert_eq!(y, dec!(366) / DAYS_PER_YEAR);
    }
}
