mod common;

use finmodel_core::assumptions::{build, AssumptionSet, PartialAssumptionSet};
use finmodel_core::projection::project;
use finmodel_core::valuation::{projection_npv, value_projection, DcfInput};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use common::manufacturer;

// ===========================================================================
// Projection
// ===========================================================================

#[test]
fn test_first_year_revenue_from_default_drivers() {
    let p = project(&manufacturer(2024), &AssumptionSet::default(), 5).unwrap();
    assert_eq!(p.periods.len(), 5);
    assert_eq!(p.periods[0].year, 2025);
    assert_eq!(p.periods[0].revenue, dec!(1_050_000));
    assert_eq!(p.periods[4].year, 2029);
}

#[test]
fn test_projection_is_deterministic() {
    let base = manufacturer(2024);
    let a = AssumptionSet::default();
    let first = project(&base, &a, 10).unwrap();
    let second = project(&base, &a, 10).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_horizon_bounds() {
    let base = manufacturer(2024);
    let a = AssumptionSet::default();
    assert!(project(&base, &a, 0).unwrap_err().is_validation());
    assert!(project(&base, &a, 51).unwrap_err().is_validation());
    assert_eq!(project(&base, &a, 50).unwrap().periods.len(), 50);
}

#[test]
fn test_empty_partial_assumptions_resolve_to_defaults() {
    let built = build(&PartialAssumptionSet::default());
    assert_eq!(built.assumptions, AssumptionSet::default());
}

#[test]
fn test_revenue_grows_under_default_drivers() {
    let p = project(&manufacturer(2024), &AssumptionSet::default(), 5).unwrap();
    for pair in p.periods.windows(2) {
        assert!(pair[1].revenue > pair[0].revenue);
    }
}

// ===========================================================================
// DCF valuation
// ===========================================================================

#[test]
fn test_terminal_growth_equal_to_wacc_rejected() {
    let p = project(&manufacturer(2024), &AssumptionSet::default(), 5).unwrap();
    let err = value_projection(
        &p,
        &DcfInput {
            wacc: dec!(0.08),
            terminal_growth: Some(dec!(0.08)),
            initial_investment: None,
        },
    )
    .unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn test_terminal_value_adds_to_enterprise_value() {
    let p = project(&manufacturer(2024), &AssumptionSet::default(), 5).unwrap();
    let without = value_projection(
        &p,
        &DcfInput {
            wacc: dec!(0.10),
            terminal_growth: None,
            initial_investment: None,
        },
    )
    .unwrap()
    .result;
    let with = value_projection(
        &p,
        &DcfInput {
            wacc: dec!(0.10),
            terminal_growth: Some(dec!(0.02)),
            initial_investment: None,
        },
    )
    .unwrap()
    .result;
    assert_eq!(without.pv_of_fcf, with.pv_of_fcf);
    assert!(with.enterprise_value > without.enterprise_value);
    assert!(with.pv_of_terminal.unwrap_or(Decimal::ZERO) > Decimal::ZERO);
}

#[test]
fn test_higher_wacc_lowers_value() {
    let p = project(&manufacturer(2024), &AssumptionSet::default(), 5).unwrap();
    let at = |wacc| {
        value_projection(
            &p,
            &DcfInput {
                wacc,
                terminal_growth: None,
                initial_investment: None,
            },
        )
        .unwrap()
        .result
        .enterprise_value
    };
    assert!(at(dec!(0.12)) < at(dec!(0.08)));
}

#[test]
fn test_near_total_discount_over_long_horizon_is_configuration_error() {
    let p = project(&manufacturer(2024), &AssumptionSet::default(), 30).unwrap();
    assert!(projection_npv(&p, dec!(-0.95)).unwrap_err().is_configuration());
}

#[test]
fn test_very_high_wacc_over_long_horizon_is_configuration_error() {
    let p = project(&manufacturer(2024), &AssumptionSet::default(), 40).unwrap();
    assert!(projection_npv(&p, dec!(10)).unwrap_err().is_configuration());
    let err = value_projection(
        &p,
        &DcfInput {
            wacc: dec!(10),
            terminal_growth: Some(dec!(0.02)),
            initial_investment: Some(dec!(1_000_000)),
        },
    )
    .unwrap_err();
    assert!(err.is_configuration());
}
