use chrono::NaiveDate;
use fund_waterfall_core::returns::allocation::{InvestorClass, LpHolding};
use fund_waterfall_core::returns::performance::{IrrOutcome, IrrUnavailable, PerformanceInput};
use fund_waterfall_core::time_value::{self, SolverSettings};
use fund_waterfall_core::{allocate_to_lps, calculate_metrics, metrics, CashFlow, EngineError};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

// ===========================================================================
// IRR
// ===========================================================================

#[test]
fn test_three_year_hold_irr() {
    // -10M at t=0, +15M at t=3 => 1.5^(1/3) - 1
    let irr = time_value::irr(&[dec!(-10_000_000), dec!(0), dec!(0), dec!(15_000_000)]).unwrap();
    assert!(
        (irr - dec!(0.1447142426)).abs() < dec!(0.000001),
        "Expected IRR ~14.47%, got {irr}"
    );
}

#[test]
fn test_irr_is_deterministic() {
    let flows = [dec!(-1000), dec!(300), dec!(400), dec!(500)];
    assert_eq!(time_value::irr(&flows).unwrap(), time_value::irr(&flows).unwrap());
}

#[test]
fn test_all_positive_flows_have_no_irr() {
    assert!(matches!(
        time_value::irr(&[dec!(10), dec!(20)]).unwrap_err(),
        EngineError::NoSignChange
    ));
}

#[test]
fn test_tight_iteration_cap_reports_non_convergence() {
    let settings = SolverSettings {
        max_iterations: 1,
        ..SolverSettings::default()
    };
    let flows = [
        (dec!(0), dec!(-1000)),
        (dec!(1), dec!(300)),
        (dec!(2), dec!(400)),
        (dec!(3), dec!(500)),
    ];
    let err = time_value::irr_years(&flows, &settings).unwrap_err();
    assert!(err.is_irr_failure(), "got {err:?}");
}

// ===========================================================================
// Multiples
// ===========================================================================

#[test]
fn test_partially_realized_fund() {
    let out = calculate_metrics(&PerformanceInput {
        contributions: vec![
            CashFlow::new(d(2018, 1, 1), dec!(500)),
            CashFlow::new(d(2019, 1, 1), dec!(500)),
        ],
        distributions: vec![CashFlow::new(d(2022, 1, 1), dec!(600))],
        current_nav: dec!(900),
        valuation_date: Some(d(2023, 1, 1)),
    })
    .unwrap();
    assert_eq!(out.dpi, dec!(0.6));
    assert_eq!(out.rvpi, dec!(0.9));
    assert_eq!(out.tvpi, dec!(1.5));
    assert_eq!(out.moic, out.tvpi);
    assert!(out.irr.rate().unwrap() > Decimal::ZERO);
}

#[test]
fn test_irr_unavailable_is_not_zero() {
    let out = metrics(&[CashFlow::new(d(2020, 1, 1), dec!(100))], &[], Decimal::ZERO).unwrap();
    assert_eq!(out.irr, IrrOutcome::Unavailable(IrrUnavailable::NoSignChange));
    assert_eq!(out.irr.rate(), None);
    let json = serde_json::to_value(&out).unwrap();
    assert_eq!(json["irr"]["Unavailable"], "NoSignChange");
}

// ===========================================================================
// LP allocation
// ===========================================================================

#[test]
fn test_lp_allocation_reconstructs_class() {
    use fund_waterfall_core::returns::allocation::class_result;

    let class = InvestorClass {
        id: "a".into(),
        name: "Class A".into(),
        commitment: dec!(30_000_000),
        contributed: dec!(30_000_000),
        limited_partners: vec![],
    };
    let result = class_result(
        &class,
        dec!(66_000_000),
        IrrOutcome::Unavailable(IrrUnavailable::NotDated),
    );
    let lps: Vec<LpHolding> = [dec!(50), dec!(30), dec!(20)]
        .iter()
        .enumerate()
        .map(|(i, pct)| LpHolding {
            lp_id: format!("lp{i}"),
            name: format!("LP {i}"),
            ownership_percentage: *pct,
            commitment: dec!(30_000_000) * pct / dec!(100),
        })
        .collect();

    let allocations = allocate_to_lps(&result, &lps).unwrap();
    let returned: Decimal = allocations.iter().map(|a| a.returned).sum();
    assert_eq!(returned, dec!(66_000_000));
    assert_eq!(allocations[0].multiple, dec!(2.2));
    assert_eq!(allocations[1].net_return, dec!(10_800_000));
}
