mod common;

use finmodel_core::assumptions::AssumptionSet;
use finmodel_core::scenarios::{
    analyze_sensitivity, default_deltas, run_scenarios, ScenarioKind, SensitivityVariable,
};
use finmodel_core::stress::{run_stress_tests, standard_catalog};
use finmodel_core::valuation::projection_npv;
use finmodel_core::projection::project;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use common::manufacturer;

#[test]
fn test_scenarios_order_final_revenue() {
    let bundle = run_scenarios(
        &manufacturer(2024),
        &AssumptionSet::default(),
        5,
        &ScenarioKind::standard(),
        dec!(0.10),
    )
    .unwrap()
    .result;
    let revenue = |name: &str| bundle.summary(name).unwrap().final_revenue;
    assert!(revenue("optimistic") > revenue("base"));
    assert!(revenue("base") > revenue("pessimistic"));
    assert!(revenue("pessimistic") > revenue("stressed"));
}

#[test]
fn test_base_scenario_matches_plain_projection() {
    let base = manufacturer(2024);
    let a = AssumptionSet::default();
    let bundle = run_scenarios(&base, &a, 5, &ScenarioKind::standard(), dec!(0.10))
        .unwrap()
        .result;
    let plain = project(&base, &a, 5).unwrap();
    assert_eq!(bundle.get("base").unwrap(), plain.periods.as_slice());
}

#[test]
fn test_zero_delta_reproduces_base_npv_exactly() {
    let base = manufacturer(2024);
    let a = AssumptionSet::default();
    let report = analyze_sensitivity(
        &base,
        &a,
        5,
        &SensitivityVariable::all(),
        &default_deltas(),
        dec!(0.10),
        dec!(0.20),
    )
    .unwrap()
    .result;
    let expected = projection_npv(&project(&base, &a, 5).unwrap(), dec!(0.10)).unwrap();
    for sweep in &report.sweeps {
        assert_eq!(sweep.base_npv, expected);
        let zero = sweep.points.iter().find(|p| p.delta.is_zero()).unwrap();
        assert_eq!(zero.npv, expected);
        assert_eq!(zero.change_from_base, Decimal::ZERO);
    }
}

#[test]
fn test_every_variable_is_swept() {
    let report = analyze_sensitivity(
        &manufacturer(2024),
        &AssumptionSet::default(),
        5,
        &SensitivityVariable::all(),
        &default_deltas(),
        dec!(0.10),
        dec!(0.20),
    )
    .unwrap()
    .result;
    assert_eq!(report.sweeps.len(), SensitivityVariable::all().len());
    assert!(report.sweeps.iter().all(|s| s.points.len() == 5));
}

#[test]
fn test_stress_catalog_covers_each_shock() {
    let report = run_stress_tests(
        &manufacturer(2024),
        &AssumptionSet::default(),
        5,
        &standard_catalog(),
        dec!(0.10),
    )
    .unwrap()
    .result;
    assert_eq!(report.impacts.len(), 4);
    assert!(report.impact("cost_shock").unwrap().npv.delta < Decimal::ZERO);
    assert_eq!(report.impact("liquidity_crunch").unwrap().npv.delta, Decimal::ZERO);
}
