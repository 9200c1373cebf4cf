pub mod error;
pub mod returns;
pub mod scenario;
pub mod time_value;
pub mod types;
pub mod waterfall;

pub use error::{EngineError, EvaluationStage};
pub use returns::allocation::allocate_to_lps;
pub use returns::performance::{calculate_metrics, metrics};
pub use scenario::compare::compare_scenarios;
pub use scenario::evaluate::evaluate_scenario;
pub use types::*;
pub use waterfall::carry::{accrue_carry, accrue_carry_series, synthesize_tiers};
pub use waterfall::tiers::evaluate_tiers;

#[cfg(feature = "american")]
pub use waterfall::deal_by_deal::evaluate_deal_by_deal;

/// Standard result type for all engine operations
pub type EngineResult<T> = Result<T, EngineError>;
