use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::EngineResult;

/// How accrued carry becomes vested over time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VestingSchedule {
    /// Fully vested as soon as it accrues
    #[default]
    Immediate,
    /// Nothing vests before `cliff_months`, everything after
    Cliff { cliff_months: u32 },
    /// Linear ramp over `vesting_period_months`, optionally behind a cliff
    Graded {
        vesting_period_months: u32,
        #[serde(default)]
        cliff_months: u32,
    },
}

impl VestingSchedule {
    /// Fraction of accrued carry vested after `months_elapsed`, in [0, 1].
    pub fn vested_fraction(&self, months_elapsed: u32) -> Decimal {
        match *self {
            VestingSchedule::Immediate => immediate_fraction(),
            VestingSchedule::Cliff { cliff_months } => cliff_fraction(cliff_months, months_elapsed),
            VestingSchedule::Graded {
                vesting_period_months,
                cliff_months,
            } => graded_fraction(vesting_period_months, cliff_months, months_elapsed),
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        if let VestingSchedule::Graded {
            vesting_period_months,
            cliff_months,
        } = *self
        {
            if cliff_months > vesting_period_months {
                return Err(EngineError::invalid(
                    "vesting_schedule.cliff_months",
                    format!(
                        "Cliff ({cliff_months} months) cannot exceed the vesting period \
                         ({vesting_period_months} months)"
                    ),
                ));
            }
        }
        Ok(())
    }
}

fn immediate_fraction() -> Decimal {
    Decimal::ONE
}

fn cliff_fraction(cliff_months: u32, months_elapsed: u32) -> Decimal {
    if months_elapsed >= cliff_months {
        Decimal::ONE
    } else {
        Decimal::ZERO
    }
}

fn graded_fraction(vesting_period_months: u32, cliff_months: u32, months_elapsed: u32) -> Decimal {
    if months_elapsed < cliff_months {
        return Decimal::ZERO;
    }
    if vesting_period_months == 0 || months_elapsed >= vesting_period_months {
        return Decimal::ONE;
    }
    Decimal::from(months_elapsed) / Decimal::from(vesting_period_months)
}
