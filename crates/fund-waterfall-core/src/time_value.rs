use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::{year_fraction, Money, Rate, Years};
use crate::EngineResult;

/// Candidate rates scanned (in order) when looking for a sign change.
const BRACKET_GRID: [Decimal; 17] = [
    dec!(-0.99),
    dec!(-0.95),
    dec!(-0.9),
    dec!(-0.75),
    dec!(-0.5),
    dec!(-0.25),
    dec!(0),
    dec!(0.1),
    dec!(0.25),
    dec!(0.5),
    dec!(1),
    dec!(2),
    dec!(5),
    dec!(10),
    dec!(25),
    dec!(50),
    dec!(100),
];

/// Bracket width below which the root is pinned to Decimal precision.
const MIN_BRACKET_WIDTH: Decimal = dec!(0.000000000000000001);

/// Iteration and tolerance settings for [`find_root`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverSettings {
    /// Hard cap on Newton/bisection iterations
    pub max_iterations: u32,
    /// Convergence threshold on |objective|
    pub tolerance: Decimal,
    /// Lowest rate considered when bracketing
    pub lower_bound: Decimal,
    /// Highest rate considered when bracketing
    pub upper_bound: Decimal,
}

pub const DEFAULT_SOLVER: SolverSettings = SolverSettings {
    max_iterations: 200,
    tolerance: dec!(0.000000001),
    lower_bound: dec!(-0.99),
    upper_bound: dec!(100),
};

impl Default for SolverSettings {
    fn default() -> Self {
        DEFAULT_SOLVER
    }
}

/// Find `x` with `f(x) = 0` using a bracketed Newton iteration that falls
/// back to bisection.
///
/// `f` returns the objective and its derivative, or `None` where the
/// objective cannot be evaluated (overflow, outside the domain). A bracket is
/// established by scanning a fixed grid of candidates inside the settings'
/// bounds; the first sign change wins, so the result is deterministic.
pub fn find_root<F>(f: F, guess: Decimal, settings: &SolverSettings) -> EngineResult<Decimal>
where
    F: Fn(Decimal) -> Option<(Decimal, Decimal)>,
{
    let (mut lo, mut hi, mut f_lo) = match bracket(&f, settings)? {
        Bracket::Exact(root) => return Ok(root),
        Bracket::Between { lo, hi, f_lo } => (lo, hi, f_lo),
    };

    let mut x = if guess > lo && guess < hi {
        guess
    } else {
        midpoint(lo, hi)
    };
    let mut last_step = hi - lo;
    let mut last_delta = f_lo.abs();

    for _ in 0..settings.max_iterations {
        let (fx, dfx) = match f(x) {
            Some(v) => v,
            None => {
                let mid = midpoint(lo, hi);
                if mid == x {
                    break;
                }
                x = mid;
                continue;
            }
        };
        last_delta = fx.abs();

        if last_delta <= settings.tolerance {
            return Ok(x);
        }

        if same_sign(fx, f_lo) {
            lo = x;
            f_lo = fx;
        } else {
            hi = x;
        }

        if hi - lo <= MIN_BRACKET_WIDTH {
            return Ok(midpoint(lo, hi));
        }

        // Newton step if it stays strictly inside the bracket and shrinks
        // at least as fast as bisection would.
        let newton = if dfx.is_zero() {
            None
        } else {
            fx.checked_div(dfx).map(|step| x - step)
        };
        let next = match newton {
            Some(n) if n > lo && n < hi && (n - x).abs() * dec!(2) <= last_step => n,
            _ => midpoint(lo, hi),
        };
        last_step = (next - x).abs();
        x = next;
    }

    Err(EngineError::DidNotConverge {
        iterations: settings.max_iterations,
        last_delta,
    })
}

enum Bracket {
    Exact(Decimal),
    Between {
        lo: Decimal,
        hi: Decimal,
        f_lo: Decimal,
    },
}

fn bracket<F>(f: &F, settings: &SolverSettings) -> EngineResult<Bracket>
where
    F: Fn(Decimal) -> Option<(Decimal, Decimal)>,
{
    let mut previous: Option<(Decimal, Decimal)> = None;

    let candidates = BRACKET_GRID
        .iter()
        .copied()
        .filter(|r| *r >= settings.lower_bound && *r <= settings.upper_bound);

    for rate in candidates {
        let Some((value, _)) = f(rate) else {
            continue;
        };
        if value.is_zero() {
            return Ok(Bracket::Exact(rate));
        }
        if let Some((prev_rate, prev_value)) = previous {
            if !same_sign(prev_value, value) {
                return Ok(Bracket::Between {
                    lo: prev_rate,
                    hi: rate,
                    f_lo: prev_value,
                });
            }
        }
        previous = Some((rate, value));
    }

    Err(EngineError::NoSignChange)
}

fn same_sign(a: Decimal, b: Decimal) -> bool {
    a.is_sign_negative() == b.is_sign_negative()
}

fn midpoint(lo: Decimal, hi: Decimal) -> Decimal {
    (lo + hi) / dec!(2)
}

/// Net present value of `(years, amount)` flows at `rate`.
pub fn xnpv(rate: Rate, flows: &[(Years, Money)]) -> EngineResult<Money> {
    if rate <= dec!(-1) {
        return Err(EngineError::invalid(
            "rate",
            "Discount rate must be greater than -100%",
        ));
    }
    npv_with_derivative(rate, flows)
        .map(|(npv, _)| npv)
        .ok_or_else(|| EngineError::invalid("rate", "Discount factors overflow at this rate"))
}

fn npv_with_derivative(rate: Rate, flows: &[(Years, Money)]) -> Option<(Decimal, Decimal)> {
    let one_plus_r = Decimal::ONE + rate;
    if one_plus_r <= Decimal::ZERO {
        return None;
    }

    let mut npv = Decimal::ZERO;
    let mut dnpv = Decimal::ZERO;
    for (t, cf) in flows {
        let discount = one_plus_r.checked_powd(*t)?;
        if discount.is_zero() {
            return None;
        }
        let pv = cf.checked_div(discount)?;
        npv = npv.checked_add(pv)?;
        dnpv = dnpv.checked_sub(t.checked_mul(pv)?.checked_div(one_plus_r)?)?;
    }
    Some((npv, dnpv))
}

/// Internal rate of return for flows positioned in fractional years from a
/// reference date.
///
/// The objective is NPV scaled by the gross magnitude of the flows, so the
/// tolerance reads the same for a $10 fund and a $10bn fund.
pub fn irr_years(flows: &[(Years, Money)], settings: &SolverSettings) -> EngineResult<Rate> {
    if flows.len() < 2 {
        return Err(EngineError::NoSignChange);
    }
    let has_outflow = flows.iter().any(|(_, c)| c.is_sign_negative() && !c.is_zero());
    let has_inflow = flows.iter().any(|(_, c)| c.is_sign_positive() && !c.is_zero());
    if !has_outflow || !has_inflow {
        return Err(EngineError::NoSignChange);
    }

    let scale: Decimal = flows.iter().map(|(_, c)| c.abs()).sum();
    let objective = |rate: Decimal| {
        npv_with_derivative(rate, flows).map(|(npv, dnpv)| (npv / scale, dnpv / scale))
    };

    find_root(objective, dec!(0.10), settings)
}

/// Periodic IRR: flow `i` sits at `i` years.
pub fn irr(cash_flows: &[Money]) -> EngineResult<Rate> {
    let flows: Vec<(Years, Money)> = cash_flows
        .iter()
        .enumerate()
        .map(|(t, cf)| (Decimal::from(t as i64), *cf))
        .collect();
    irr_years(&flows, &DEFAULT_SOLVER)
}

/// Extended IRR for irregular cash flow dates, measured from the earliest date.
pub fn xirr(dated_flows: &[(NaiveDate, Money)]) -> EngineResult<Rate> {
    let Some(base_date) = dated_flows.iter().map(|(d, _)| *d).min() else {
        return Err(EngineError::NoSignChange);
    };
    let flows: Vec<(Years, Money)> = dated_flows
        .iter()
        .map(|(date, amount)| (year_fraction(base_date, *date), *amount))
        .collect();
    irr_years(&flows, &DEFAULT_SOLVER)
}
