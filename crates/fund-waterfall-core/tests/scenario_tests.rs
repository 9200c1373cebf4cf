use fund_waterfall_core::scenario::compare::ComparisonEntry;
use fund_waterfall_core::scenario::evaluate::WaterfallScenario;
use fund_waterfall_core::{compare_scenarios, evaluate_scenario, EngineError, EvaluationStage};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const BASE_SCENARIO: &str = r#"{
    "id": "base",
    "name": "Base case",
    "exit_value": "100000000",
    "tiers": [
        {"name": "Return of Capital", "tier_type": "ReturnOfCapital",
         "lp_share_percent": "100", "gp_share_percent": "0",
         "tier_start": "0", "tier_end": "40000000"},
        {"name": "Preferred Return", "tier_type": "PreferredReturn",
         "lp_share_percent": "100", "gp_share_percent": "0",
         "tier_end": "52000000", "allocation_target": "senior"},
        {"name": "GP Catch-Up", "tier_type": "GpCatchUp",
         "lp_share_percent": "0", "gp_share_percent": "100",
         "tier_end": "55000000"},
        {"name": "Carry", "tier_type": "ResidualSplit",
         "lp_share_percent": "80", "gp_share_percent": "20"}
    ],
    "investor_classes": [
        {"id": "senior", "name": "Senior", "commitment": "25000000", "contributed": "20000000",
         "limited_partners": [
            {"lp_id": "p1", "name": "Pension", "ownership_percentage": "60", "commitment": "15000000"},
            {"lp_id": "p2", "name": "Insurer", "ownership_percentage": "40", "commitment": "10000000"}
         ]},
        {"id": "junior", "name": "Junior", "commitment": "25000000", "contributed": "20000000"}
    ],
    "timeline": {"investment_date": "2019-01-01", "exit_date": "2024-01-01"}
}"#;

fn base() -> WaterfallScenario {
    serde_json::from_str(BASE_SCENARIO).unwrap()
}

#[test]
fn test_end_to_end_from_json() {
    let out = evaluate_scenario(&base()).unwrap();
    assert_eq!(out.stage, EvaluationStage::Done);
    assert_eq!(out.total_to_gp, dec!(12_000_000));
    assert_eq!(out.total_to_lp, dec!(88_000_000));

    let senior = &out.investor_class_results[0];
    let junior = &out.investor_class_results[1];
    // Senior: half of ROC, all of the pref, half of the 36M residual
    assert_eq!(senior.returned, dec!(50_000_000));
    assert_eq!(junior.returned, dec!(38_000_000));
    assert_eq!(senior.net_return, dec!(30_000_000));
    assert!(senior.irr.rate().unwrap() > junior.irr.rate().unwrap());

    let lps = &out.lp_allocations["senior"];
    assert_eq!(lps[0].returned, dec!(30_000_000));
    assert_eq!(lps[1].returned, dec!(20_000_000));
    assert!(out.warnings.is_empty());
}

#[test]
fn test_class_totals_conserve_lp_side() {
    let mut scenario = base();
    scenario.exit_value = dec!(77_777_777.77);
    let out = evaluate_scenario(&scenario).unwrap();
    let classes: Decimal = out.investor_class_results.iter().map(|c| c.returned).sum();
    assert_eq!(classes, out.total_to_lp);
    assert_eq!(out.total_to_lp + out.total_to_gp, scenario.exit_value);
}

#[test]
fn test_zero_exit() {
    let mut scenario = base();
    scenario.exit_value = Decimal::ZERO;
    let out = evaluate_scenario(&scenario).unwrap();
    assert!(out.tier_breakdown.iter().all(|t| t.total_amount.is_zero()));
    assert_eq!(out.metrics.moic, Decimal::ZERO);
    assert!(!out.metrics.irr.is_available());
    assert_eq!(out.warnings.len(), 1);
}

#[test]
fn test_gap_in_tiers_names_validation_stage() {
    let mut scenario = base();
    scenario.tiers[2].tier_start = Some(dec!(53_000_000));
    let err = evaluate_scenario(&scenario).unwrap_err();
    assert_eq!(err.stage(), Some(EvaluationStage::Validated));
    match err.root_cause() {
        EngineError::InvalidInput { field, .. } => assert_eq!(field, "tiers[2].tier_start"),
        other => panic!("Expected InvalidInput, got: {other:?}"),
    }
}

#[test]
fn test_output_is_byte_identical_across_runs() {
    let scenario = base();
    let a = serde_json::to_vec(&evaluate_scenario(&scenario).unwrap()).unwrap();
    let b = serde_json::to_vec(&evaluate_scenario(&scenario).unwrap()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_comparison_across_exit_values() {
    let exits = [dec!(30_000_000), dec!(60_000_000), dec!(120_000_000)];
    let scenarios: Vec<WaterfallScenario> = exits
        .iter()
        .enumerate()
        .map(|(i, exit)| {
            let mut s = base();
            s.id = format!("exit-{i}");
            s.exit_value = *exit;
            s
        })
        .collect();

    let out = compare_scenarios(&scenarios).unwrap();
    assert_eq!(out.failed, 0);
    let gp: Vec<Decimal> = out.summary.iter().map(|r| r.total_to_gp).collect();
    assert!(gp.windows(2).all(|w| w[0] <= w[1]));
    assert!(matches!(out.results["exit-2"], ComparisonEntry::Evaluated(_)));
}

#[test]
fn test_comparison_isolates_failures() {
    let mut broken = base();
    broken.id = "broken".into();
    broken.investor_classes[0].limited_partners[0].ownership_percentage = Decimal::ZERO;
    broken.investor_classes[0].limited_partners[1].ownership_percentage = Decimal::ZERO;

    let out = compare_scenarios(&[base(), broken]).unwrap();
    assert_eq!(out.failed, 1);
    match &out.results["broken"] {
        ComparisonEntry::Failed { stage, .. } => {
            assert_eq!(*stage, Some(EvaluationStage::LpsAllocated))
        }
        other => panic!("Expected Failed, got: {other:?}"),
    }
}
