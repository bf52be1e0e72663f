mod common;

use finmodel_core::assumptions::AssumptionSet;
use finmodel_core::monte_carlo::{
    simulate, standard_risk_factors, CancellationToken, OutcomeMetric, RiskDistribution,
    RiskFactor, RiskTarget, SimulationConfig,
};
use pretty_assertions::assert_eq;

use common::manufacturer;

fn config(iterations: u64, seed: u64) -> SimulationConfig {
    SimulationConfig {
        iterations,
        seed: Some(seed),
        ..SimulationConfig::default()
    }
}

#[test]
fn test_zero_iterations_is_configuration_error() {
    let err = simulate(
        &manufacturer(2024),
        &AssumptionSet::default(),
        &standard_risk_factors(),
        &config(0, 1),
        None,
    )
    .unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn test_seeded_runs_reproduce_exactly() {
    let run = || {
        simulate(
            &manufacturer(2024),
            &AssumptionSet::default(),
            &standard_risk_factors(),
            &config(2_000, 2024),
            None,
        )
        .unwrap()
        .result
    };
    let first = run();
    let second = run();
    assert_eq!(first.samples, second.samples);
    assert_eq!(first.metrics, second.metrics);
}

#[test]
fn test_deeper_tail_loses_more() {
    let out = simulate(
        &manufacturer(2024),
        &AssumptionSet::default(),
        &standard_risk_factors(),
        &config(2_000, 99),
        None,
    )
    .unwrap()
    .result;
    let metrics = out.metrics.unwrap();
    for metric in OutcomeMetric::all() {
        let s = metrics.summary(metric);
        assert!(s.var(0.99).unwrap() >= s.var(0.95).unwrap(), "{metric}");
        assert!(s.cvar(0.95).unwrap() >= s.var(0.95).unwrap(), "{metric}");
        assert!(s.percentiles.p5 <= s.median && s.median <= s.percentiles.p95);
    }
}

#[test]
fn test_wider_demand_volatility_widens_revenue_spread() {
    let spread = |std_dev: f64| {
        let factors = vec![RiskFactor::new(
            "demand",
            RiskDistribution::Normal { mean: 0.0, std_dev },
            RiskTarget::RevenueLevel,
        )];
        let out = simulate(
            &manufacturer(2024),
            &AssumptionSet::default(),
            &factors,
            &config(1_000, 5),
            None,
        )
        .unwrap()
        .result;
        out.metrics.unwrap().revenue.std_dev
    };
    assert!(spread(0.20) > spread(0.05));
}

#[test]
fn test_cancelled_run_reports_partial() {
    let token = CancellationToken::new();
    token.cancel();
    let out = simulate(
        &manufacturer(2024),
        &AssumptionSet::default(),
        &standard_risk_factors(),
        &config(5_000, 3),
        Some(&token),
    )
    .unwrap()
    .result;
    assert!(out.partial);
    assert!(out.completed_iterations < out.requested_iterations);
}

#[test]
fn test_discount_rate_draws_near_minus_one_are_skipped() {
    let factors = vec![RiskFactor::new(
        "rate",
        RiskDistribution::Uniform {
            min: -1.5,
            max: 0.0,
        },
        RiskTarget::DiscountRate,
    )];
    let cfg = SimulationConfig {
        horizon: 30,
        ..config(200, 8)
    };
    let out = simulate(
        &manufacturer(2024),
        &AssumptionSet::default(),
        &factors,
        &cfg,
        None,
    )
    .unwrap();
    let result = out.result;
    assert!(result.skipped_trials > 0);
    assert!(!result.samples.is_empty());
    assert_eq!(result.samples.len() as u64 + result.skipped_trials, 200);
    assert!(out.warnings.iter().any(|w| w.contains("skipped")));
}

#[test]
fn test_revenue_target_and_extreme_events_reported() {
    let factors = vec![RiskFactor::new(
        "demand",
        RiskDistribution::Normal {
            mean: 0.0,
            std_dev: 0.2,
        },
        RiskTarget::RevenueLevel,
    )];
    let out = simulate(
        &manufacturer(2024),
        &AssumptionSet::default(),
        &factors,
        &config(2_000, 21),
        None,
    )
    .unwrap()
    .result;

    let target = out.target_achievement.unwrap();
    assert_eq!(target.metric, OutcomeMetric::Revenue);
    assert!((target.target - 1_200_000.0).abs() < 1e-6);
    assert!(target.probability > 0.0 && target.probability < 1.0);

    let extremes = out.extreme_events.unwrap();
    assert!(!extremes.downside.is_empty());
    assert!(!extremes.upside.is_empty());
    let npv_of = |trial: u64| {
        out.samples
            .iter()
            .find(|s| s.trial == trial)
            .map(|s| s.npv)
            .unwrap()
    };
    assert!(extremes.downside.iter().all(|t| npv_of(*t) < extremes.lower_threshold));
    assert!(extremes.upside.iter().all(|t| npv_of(*t) > extremes.upper_threshold));
}

#[test]
fn test_factor_correlations_follow_exposure() {
    let factors = vec![
        RiskFactor::new(
            "demand",
            RiskDistribution::Normal {
                mean: 0.0,
                std_dev: 0.1,
            },
            RiskTarget::RevenueLevel,
        ),
        RiskFactor::new(
            "cost",
            RiskDistribution::Uniform {
                min: -0.05,
                max: 0.15,
            },
            RiskTarget::CostLevel,
        ),
    ];
    let out = simulate(
        &manufacturer(2024),
        &AssumptionSet::default(),
        &factors,
        &config(1_000, 4),
        None,
    )
    .unwrap()
    .result;
    let correlations = out.factor_correlations;
    assert_eq!(correlations.len(), 2);
    assert_eq!(correlations[0].factor, "demand");
    assert!(correlations[0].with(OutcomeMetric::Profit).unwrap() > 0.0);
    assert!(correlations[1].with(OutcomeMetric::Profit).unwrap() < 0.0);
}
