use std::collections::{BTreeMap, HashSet};

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EvaluationStage};
use crate::scenario::evaluate::{evaluate_scenario, WaterfallResult, WaterfallScenario};
use crate::types::*;
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Outcome of one scenario in a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ComparisonEntry {
    Evaluated(Box<WaterfallResult>),
    Failed {
        stage: Option<EvaluationStage>,
        error: String,
    },
}

/// Headline figures for one successfully evaluated scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub scenario_id: String,
    pub exit_value: Money,
    pub total_to_lp: Money,
    pub total_to_gp: Money,
    pub gp_pct_of_total: Percent,
    pub moic: Multiple,
    /// `None` when the IRR could not be computed
    pub irr: Option<Rate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioComparison {
    pub results: BTreeMap<String, ComparisonEntry>,
    /// Evaluated scenarios ordered by exit value, then id
    pub summary: Vec<ComparisonRow>,
    pub failed: usize,
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

/// Evaluate independent scenarios side by side.
///
/// A failing scenario is recorded against its id and does not affect the
/// others. Only a malformed batch (empty, or ids that collide) is an error.
pub fn compare_scenarios(scenarios: &[WaterfallScenario]) -> EngineResult<ScenarioComparison> {
    if scenarios.is_empty() {
        return Err(EngineError::invalid(
            "scenarios",
            "At least one scenario is required",
        ));
    }
    let mut seen = HashSet::new();
    for (i, scenario) in scenarios.iter().enumerate() {
        if !seen.insert(scenario.id.as_str()) {
            return Err(EngineError::invalid(
                format!("scenarios[{i}].id"),
                format!("Duplicate scenario id '{}'", scenario.id),
            ));
        }
    }

    #[cfg(feature = "parallel")]
    let outcomes: Vec<(String, ComparisonEntry)> = scenarios
        .par_iter()
        .map(|s| (s.id.clone(), run_one(s)))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let outcomes: Vec<(String, ComparisonEntry)> = scenarios
        .iter()
        .map(|s| (s.id.clone(), run_one(s)))
        .collect();

    let mut summary: Vec<ComparisonRow> = outcomes
        .iter()
        .filter_map(|(_, entry)| match entry {
            ComparisonEntry::Evaluated(result) => Some(summary_row(result)),
            ComparisonEntry::Failed { .. } => None,
        })
        .collect();
    summary.sort_by(|a, b| {
        a.exit_value
            .cmp(&b.exit_value)
            .then_with(|| a.scenario_id.cmp(&b.scenario_id))
    });

    let results: BTreeMap<String, ComparisonEntry> = outcomes.into_iter().collect();
    let failed = results
        .values()
        .filter(|e| matches!(e, ComparisonEntry::Failed { .. }))
        .count();
    if failed > 0 {
        tracing::warn!(failed, total = scenarios.len(), "some scenarios failed");
    }

    Ok(ScenarioComparison {
        results,
        summary,
        failed,
    })
}

fn run_one(scenario: &WaterfallScenario) -> ComparisonEntry {
    match evaluate_scenario(scenario) {
        Ok(result) => ComparisonEntry::Evaluated(Box::new(result)),
        Err(e) => ComparisonEntry::Failed {
            stage: e.stage(),
            error: e.to_string(),
        },
    }
}

fn summary_row(result: &WaterfallResult) -> ComparisonRow {
    ComparisonRow {
        scenario_id: result.scenario_id.clone(),
        exit_value: result.exit_value,
        total_to_lp: result.total_to_lp,
        total_to_gp: result.total_to_gp,
        gp_pct_of_total: result.gp_pct_of_total,
        moic: result.metrics.moic,
        irr: result.metrics.irr.rate(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
