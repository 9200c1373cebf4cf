//! Tiered distribution of proceeds and carried-interest accrual.
//!
//! - [`tiers`]: ordered tier definitions and the sequential tier walk
//! - [`vesting`]: carry vesting schedules
//! - [`carry`]: term sheets, synthesized waterfalls, point-in-time accrual
//! - [`deal_by_deal`]: American (per-deal) waterfall with clawback exposure

pub mod carry;
pub mod tiers;
pub mod vesting;

#[cfg(feature = "american")]
pub mod deal_by_deal;
