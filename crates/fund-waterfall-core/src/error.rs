use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::types::Money;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("IRR undefined: cash flows do not change sign across the search bracket")]
    NoSignChange,

    #[error("IRR did not converge after {iterations} iterations (residual: {last_delta})")]
    DidNotConverge { iterations: u32, last_delta: Decimal },

    #[error("No capital invested: contributions sum to zero")]
    NoCapitalInvested,

    #[error("No ownership data for investor class '{class_id}'")]
    NoOwnershipData { class_id: String },

    #[error("Carry overdistributed: {distributed} paid against {accrued} accrued")]
    CarryOverdistributed { accrued: Money, distributed: Money },

    #[error("Evaluation failed at stage {stage}: {source}")]
    StageFailed {
        stage: EvaluationStage,
        #[source]
        source: Box<EngineError>,
    },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl EngineError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True for the IRR-only failures the metrics layer reports instead of
    /// propagating.
    pub fn is_irr_failure(&self) -> bool {
        matches!(
            self,
            EngineError::NoSignChange | EngineError::DidNotConverge { .. }
        )
    }

    /// Stage at which an orchestrated evaluation aborted, if any.
    pub fn stage(&self) -> Option<EvaluationStage> {
        match self {
            EngineError::StageFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The underlying error with any stage wrapper removed.
    pub fn root_cause(&self) -> &EngineError {
        match self {
            EngineError::StageFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::SerializationError(e.to_string())
    }
}

/// Stages of a single scenario evaluation, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EvaluationStage {
    Validated,
    TiersEvaluated,
    CarryAccrued,
    MetricsComputed,
    LpsAllocated,
    Done,
}

impl fmt::Display for EvaluationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EvaluationStage::Validated => "validation",
            EvaluationStage::TiersEvaluated => "tier evaluation",
            EvaluationStage::CarryAccrued => "carry accrual",
            EvaluationStage::MetricsComputed => "metrics",
            EvaluationStage::LpsAllocated => "LP allocation",
            EvaluationStage::Done => "done",
        };
        f.write_str(name)
    }
}
